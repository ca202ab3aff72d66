//! Blog workflow state machine.
//!
//! ```text
//! Pending → Researching → Outlining → Drafting → Reviewing → Optimizing → Complete
//!                                        ▲            │
//!                                        └────────────┘  needs revision and
//!                                                        revision_count < max_revisions
//! ```
//!
//! Any step error moves the run to `Failed` and returns a
//! [`WorkflowFailure`] holding the last good state. Steps run strictly in
//! sequence through the [`WorkflowSteps`] trait; [`GeneratorSteps`] is the
//! standard implementation on top of [`Researcher`] and [`ContentGenerator`].

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{ContentGenerator, DraftRequest, OutlineRequest, SeoRequest};
use crate::error::Error;
use crate::models::{Depth, Draft, Finding, Outline, ResearchResult, Review, SeoReport, Tone};
use crate::research::{ResearchQuery, Researcher};
use crate::validate;

pub const DEFAULT_MAX_REVISIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Researching,
    Outlining,
    Drafting,
    Reviewing,
    Optimizing,
    Complete,
    Failed,
}

impl WorkflowStatus {
    /// Transition table. `revise` only matters while reviewing.
    /// Terminal states have no successor.
    pub fn next(self, revise: bool) -> Option<WorkflowStatus> {
        use WorkflowStatus::*;
        match (self, revise) {
            (Pending, _) => Some(Researching),
            (Researching, _) => Some(Outlining),
            (Outlining, _) => Some(Drafting),
            (Drafting, _) => Some(Reviewing),
            (Reviewing, true) => Some(Drafting),
            (Reviewing, false) => Some(Optimizing),
            (Optimizing, _) => Some(Complete),
            (Complete, _) | (Failed, _) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Complete | WorkflowStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Researching => "researching",
            WorkflowStatus::Outlining => "outlining",
            WorkflowStatus::Drafting => "drafting",
            WorkflowStatus::Reviewing => "reviewing",
            WorkflowStatus::Optimizing => "optimizing",
            WorkflowStatus::Complete => "complete",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the working steps, in order.
pub const STEPS: [&str; 5] = ["research", "outline", "draft", "review", "optimize"];

fn default_audience() -> String {
    "intermediate".to_string()
}

fn default_word_count() -> u32 {
    2000
}

fn default_true() -> bool {
    true
}

/// Parameters of one blog run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub topic: String,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default = "default_true")]
    pub include_code_examples: bool,
    #[serde(default)]
    pub depth: Depth,
}

impl WorkflowRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            niche: None,
            target_audience: default_audience(),
            word_count: default_word_count(),
            tone: Tone::default(),
            include_code_examples: true,
            depth: Depth::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate::text_len("topic", &self.topic, 3, Some(500))?;
        validate::range("word_count", self.word_count, 500, 10_000)
    }
}

/// Everything one run has accumulated so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub topic: String,
    pub niche: Option<String>,
    pub target_audience: String,
    pub word_count: u32,
    pub tone: Tone,
    pub include_code_examples: bool,
    pub depth: Depth,
    pub research_id: Option<String>,
    pub findings: Vec<Finding>,
    pub sources: Vec<String>,
    pub outline: Option<Outline>,
    pub draft: Option<Draft>,
    pub review_feedback: Option<String>,
    pub review_score: Option<u8>,
    pub needs_revision: bool,
    pub revision_count: u32,
    pub max_revisions: u32,
    pub seo: Option<SeoReport>,
    pub status: WorkflowStatus,
    pub messages: Vec<String>,
}

impl WorkflowState {
    pub fn new(request: WorkflowRequest, max_revisions: u32) -> Self {
        let messages = vec![format!("Starting blog workflow for: {}", request.topic)];
        Self {
            id: Uuid::new_v4().to_string(),
            topic: request.topic,
            niche: request.niche,
            target_audience: request.target_audience,
            word_count: request.word_count,
            tone: request.tone,
            include_code_examples: request.include_code_examples,
            depth: request.depth,
            research_id: None,
            findings: Vec::new(),
            sources: Vec::new(),
            outline: None,
            draft: None,
            review_feedback: None,
            review_score: None,
            needs_revision: false,
            revision_count: 0,
            max_revisions,
            seo: None,
            status: WorkflowStatus::Pending,
            messages,
        }
    }
}

/// A run that stopped in `Failed`.
///
/// `state` is the last good state: outputs of completed steps are kept,
/// the failing step's output is not.
#[derive(Debug, thiserror::Error)]
#[error("workflow failed while {step}: {error:#}")]
pub struct WorkflowFailure {
    pub step: WorkflowStatus,
    pub error: anyhow::Error,
    pub state: Box<WorkflowState>,
}

impl WorkflowFailure {
    fn new(step: WorkflowStatus, error: anyhow::Error, mut state: WorkflowState) -> Self {
        tracing::error!(run = %state.id, %step, error = %error, "workflow step failed");
        state.messages.push(format!("{} failed: {:#}", step, error));
        state.status = WorkflowStatus::Failed;
        Self {
            step,
            error,
            state: Box::new(state),
        }
    }

    /// Typed error of the failing step, if it raised one.
    pub fn kind(&self) -> Option<&Error> {
        crate::error::classify(&self.error)
    }
}

/// The five working steps. Each reads the state and returns its output;
/// the orchestrator merges that output into the state.
#[async_trait]
pub trait WorkflowSteps: Send + Sync {
    async fn research(&self, state: &WorkflowState) -> Result<ResearchResult>;
    async fn outline(&self, state: &WorkflowState) -> Result<Outline>;
    async fn draft(&self, state: &WorkflowState) -> Result<Draft>;
    async fn review(&self, state: &WorkflowState) -> Result<Review>;
    async fn optimize(&self, state: &WorkflowState) -> Result<SeoReport>;
}

/// Drive `state` from `Pending` to `Complete`.
pub async fn run_workflow(
    steps: &dyn WorkflowSteps,
    mut state: WorkflowState,
) -> std::result::Result<WorkflowState, WorkflowFailure> {
    let mut revise = false;

    while let Some(next) = state.status.next(revise) {
        if state.status == WorkflowStatus::Reviewing && next == WorkflowStatus::Drafting {
            state.revision_count += 1;
        }
        state.status = next;
        revise = false;
        tracing::debug!(run = %state.id, status = %next, "workflow transition");

        match next {
            WorkflowStatus::Researching => match steps.research(&state).await {
                Ok(research) => {
                    state.messages.push(format!(
                        "Research complete: {} findings from {} sources",
                        research.findings.len(),
                        research.sources.len()
                    ));
                    state.research_id = Some(research.id);
                    state.findings = research.findings;
                    state.sources = research.sources;
                }
                Err(e) => return Err(WorkflowFailure::new(next, e, state)),
            },
            WorkflowStatus::Outlining => match steps.outline(&state).await {
                Ok(outline) => {
                    state.messages.push(format!(
                        "Outline created: {} ({} sections)",
                        outline.title,
                        outline.sections.len()
                    ));
                    state.outline = Some(outline);
                }
                Err(e) => return Err(WorkflowFailure::new(next, e, state)),
            },
            WorkflowStatus::Drafting => match steps.draft(&state).await {
                Ok(draft) => {
                    state
                        .messages
                        .push(format!("Draft written: {} words", draft.word_count));
                    state.draft = Some(draft);
                }
                Err(e) => return Err(WorkflowFailure::new(next, e, state)),
            },
            WorkflowStatus::Reviewing => match steps.review(&state).await {
                Ok(review) => {
                    revise = review.needs_revision && state.revision_count < state.max_revisions;
                    state.messages.push(format!(
                        "Review complete: score {}/10, needs revision: {}",
                        review.quality_score, review.needs_revision
                    ));
                    if review.needs_revision && !revise {
                        state
                            .messages
                            .push("Revision limit reached, moving on".to_string());
                    }
                    state.review_score = Some(review.quality_score);
                    state.needs_revision = review.needs_revision;
                    state.review_feedback = Some(review.feedback);
                }
                Err(e) => return Err(WorkflowFailure::new(next, e, state)),
            },
            WorkflowStatus::Optimizing => match steps.optimize(&state).await {
                Ok(seo) => {
                    state.messages.push("SEO optimization complete".to_string());
                    state.seo = Some(seo);
                }
                Err(e) => return Err(WorkflowFailure::new(next, e, state)),
            },
            WorkflowStatus::Complete => {
                tracing::info!(run = %state.id, revisions = state.revision_count, "workflow complete");
                state.messages.push("Workflow complete".to_string());
            }
            WorkflowStatus::Pending | WorkflowStatus::Failed => {}
        }
    }

    Ok(state)
}

/// Standard steps backed by the research and generation services.
pub struct GeneratorSteps {
    researcher: Arc<Researcher>,
    generator: Arc<ContentGenerator>,
}

impl GeneratorSteps {
    pub fn new(researcher: Arc<Researcher>, generator: Arc<ContentGenerator>) -> Self {
        Self {
            researcher,
            generator,
        }
    }
}

fn missing(what: &str) -> anyhow::Error {
    anyhow::anyhow!("workflow reached this step without a {}", what)
}

#[async_trait]
impl WorkflowSteps for GeneratorSteps {
    async fn research(&self, state: &WorkflowState) -> Result<ResearchResult> {
        self.researcher
            .research(&ResearchQuery {
                topic: state.topic.clone(),
                niche: state.niche.clone(),
                depth: state.depth,
            })
            .await
    }

    async fn outline(&self, state: &WorkflowState) -> Result<Outline> {
        let request = OutlineRequest {
            topic: state.topic.clone(),
            niche: state.niche.clone(),
            target_audience: state.target_audience.clone(),
            word_count: state.word_count,
            include_code_examples: state.include_code_examples,
        };
        self.generator.generate_outline(&request, &state.findings).await
    }

    async fn draft(&self, state: &WorkflowState) -> Result<Draft> {
        let feedback = if state.revision_count > 0 {
            state.review_feedback.clone()
        } else {
            None
        };
        let request = DraftRequest {
            topic: state.topic.clone(),
            outline: state.outline.clone(),
            tone: state.tone,
            word_count: state.word_count,
            include_code_examples: state.include_code_examples,
            feedback,
        };
        self.generator.generate_draft(&request, &state.findings).await
    }

    async fn review(&self, state: &WorkflowState) -> Result<Review> {
        let draft = state.draft.as_ref().ok_or_else(|| missing("draft"))?;
        self.generator
            .review_draft(draft, &state.topic, &state.target_audience)
            .await
    }

    async fn optimize(&self, state: &WorkflowState) -> Result<SeoReport> {
        let draft = state.draft.as_ref().ok_or_else(|| missing("draft"))?;
        let keywords = state
            .outline
            .as_ref()
            .map(|o| o.seo_keywords.clone())
            .unwrap_or_default();
        self.generator
            .optimize_seo(&SeoRequest {
                content: draft.content.clone(),
                keywords,
                target_audience: Some(state.target_audience.clone()),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::ResearchSettings;
    use crate::store::memory::InMemoryVectorStore;
    use crate::testing::ScriptedClient;

    const OUTLINE: &str = r#"{"title": "Apex REST", "sections": [{"title": "Intro"}, {"title": "Endpoints"}, {"title": "Testing"}], "seo_keywords": ["apex"]}"#;

    fn draft_reply(n: usize) -> String {
        let body = format!("# Apex REST\n\n{}", "apex rest endpoint words ".repeat(30 + n));
        serde_json::json!({"title": "Apex REST", "content": body}).to_string()
    }

    fn review_reply(needs_revision: bool, score: u8) -> String {
        serde_json::json!({
            "quality_score": score,
            "needs_revision": needs_revision,
            "feedback": format!("feedback at score {}", score)
        })
        .to_string()
    }

    const SEO: &str = r#"{"meta_description": "Apex REST in practice.", "title_suggestions": ["Apex REST"], "suggestions": []}"#;

    fn steps(client: Arc<ScriptedClient>) -> GeneratorSteps {
        let researcher = Researcher::new(
            client.clone(),
            Arc::new(InMemoryVectorStore::new()),
            ResearchSettings::default(),
        );
        GeneratorSteps::new(Arc::new(researcher), Arc::new(ContentGenerator::new(client)))
    }

    #[test]
    fn test_transition_table() {
        use WorkflowStatus::*;
        assert_eq!(Pending.next(false), Some(Researching));
        assert_eq!(Reviewing.next(true), Some(Drafting));
        assert_eq!(Reviewing.next(false), Some(Optimizing));
        assert_eq!(Drafting.next(true), Some(Reviewing));
        assert_eq!(Complete.next(true), None);
        assert_eq!(Failed.next(false), None);
        assert!(Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_two_revisions_then_approve() {
        let client = Arc::new(ScriptedClient::new(32).with_replies([
            OUTLINE.to_string(),
            draft_reply(0),
            review_reply(true, 4),
            draft_reply(1),
            review_reply(true, 6),
            draft_reply(2),
            review_reply(false, 9),
            SEO.to_string(),
        ]));
        let state = WorkflowState::new(WorkflowRequest::new("Building REST APIs with Apex"), 2);

        let done = run_workflow(&steps(client.clone()), state).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Complete);
        assert_eq!(done.revision_count, 2);
        assert_eq!(done.review_score, Some(9));
        assert!(done.seo.is_some());
        assert!(done.messages.iter().any(|m| m == "SEO optimization complete"));
        assert_eq!(client.remaining_replies(), 0);

        let prompts: Vec<_> = client.requests().into_iter().map(|r| r.prompt).collect();
        assert!(prompts[3].contains("feedback at score 4"));
        assert!(prompts[5].contains("feedback at score 6"));
    }

    #[tokio::test]
    async fn test_high_score_skips_revision() {
        let client = Arc::new(ScriptedClient::new(32).with_replies([
            OUTLINE.to_string(),
            draft_reply(0),
            review_reply(true, 8),
            SEO.to_string(),
        ]));

        let done = run_workflow(
            &steps(client.clone()),
            WorkflowState::new(WorkflowRequest::new("Building REST APIs with Apex"), 2),
        )
        .await
        .unwrap();

        assert_eq!(done.status, WorkflowStatus::Complete);
        assert_eq!(done.revision_count, 0);
        assert!(!done.needs_revision);
        assert_eq!(done.review_score, Some(8));
        assert_eq!(client.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_revision_loop_is_bounded() {
        let mut replies = vec![OUTLINE.to_string()];
        for i in 0..3 {
            replies.push(draft_reply(i));
            replies.push(review_reply(true, 3));
        }
        replies.push(SEO.to_string());
        let client = Arc::new(ScriptedClient::new(32).with_replies(replies));

        let done = run_workflow(
            &steps(client.clone()),
            WorkflowState::new(WorkflowRequest::new("Queueable Apex"), DEFAULT_MAX_REVISIONS),
        )
        .await
        .unwrap();

        assert_eq!(done.status, WorkflowStatus::Complete);
        assert_eq!(done.revision_count, DEFAULT_MAX_REVISIONS);
        assert!(done.needs_revision);
        assert!(done.messages.iter().any(|m| m.contains("Revision limit")));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_state() {
        let client = Arc::new(ScriptedClient::new(32).with_replies([
            OUTLINE.to_string(),
            draft_reply(0),
            review_reply(false, 8),
            "not json".to_string(),
            "still not json".to_string(),
        ]));

        let failure = run_workflow(
            &steps(client),
            WorkflowState::new(WorkflowRequest::new("Apex platform events"), 2),
        )
        .await
        .unwrap_err();

        assert_eq!(failure.step, WorkflowStatus::Optimizing);
        assert_eq!(failure.state.status, WorkflowStatus::Failed);
        assert!(failure.state.outline.is_some());
        assert!(failure.state.draft.is_some());
        assert!(failure.state.seo.is_none());
        assert_eq!(failure.kind().map(|e| e.kind()), Some("schema_validation_error"));
        assert!(failure.to_string().contains("optimizing"));
    }

    #[tokio::test]
    async fn test_outline_failure_stops_run() {
        let client = Arc::new(ScriptedClient::new(32));
        let failure = run_workflow(
            &steps(client),
            WorkflowState::new(WorkflowRequest::new("Apex platform events"), 2),
        )
        .await
        .unwrap_err();
        assert_eq!(failure.step, WorkflowStatus::Outlining);
        assert!(failure.state.outline.is_none());
        assert!(failure.state.research_id.is_some());
    }
}
