//! Content generation: outlines, drafts, explanations, SEO and reviews.
//!
//! Every operation renders a prompt from [`prompts`](crate::prompts),
//! injects the research context, asks the model for a typed reply through
//! [`complete_structured`] and post-processes the result (ids, defaults,
//! locally computed counts).

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::{
    complete_structured, complete_structured_with, CompletionClient, CompletionOptions,
    CompletionRequest, Structured,
};
use crate::models::{
    word_count, Draft, ExplainMode, Explanation, Finding, Outline, Review, Section, SeoReport,
    SeoSuggestion, Tone,
};
use crate::prompts::{self, DraftPrompt, OutlinePrompt};
use crate::research::format_context;
use crate::seo::keyword_density;
use crate::validate;

fn default_audience() -> String {
    "intermediate".to_string()
}

fn default_word_count() -> u32 {
    2000
}

fn default_true() -> bool {
    true
}

/// Fewest sections an outline may have.
pub const MIN_OUTLINE_SECTIONS: usize = 3;

/// Allowed relative gap between an outline's estimate and the target length.
pub const WORD_ESTIMATE_TOLERANCE: f64 = 0.2;

/// Reviews scoring at or above this never send a draft back for revision.
pub const APPROVAL_SCORE: u8 = 7;

/// Sampling temperature for SEO and review replies.
const ANALYSIS_TEMPERATURE: f32 = 0.3;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "for", "from", "how", "in", "into", "of", "on", "or", "the", "to",
    "using", "what", "why", "with", "your",
];

/// Lowercase content words of `text`.
fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Request-specific outline checks: the word estimate stays within
/// [`WORD_ESTIMATE_TOLERANCE`] of the target and a given title shares a
/// content word with the topic.
fn check_outline(reply: &OutlineReply, request: &OutlineRequest) -> std::result::Result<(), String> {
    if let Some(estimate) = reply.estimated_words.filter(|w| *w > 0) {
        let target = f64::from(request.word_count);
        let low = (target * (1.0 - WORD_ESTIMATE_TOLERANCE)).floor() as u32;
        let high = (target * (1.0 + WORD_ESTIMATE_TOLERANCE)).ceil() as u32;
        if !(low..=high).contains(&estimate) {
            return Err(format!(
                "estimated_words {} must be between {} and {} for a {}-word post",
                estimate, low, high, request.word_count
            ));
        }
    }

    if !reply.title.trim().is_empty() {
        let topic = content_words(&request.topic);
        let relevant = content_words(&reply.title).iter().any(|w| topic.contains(w));
        if !topic.is_empty() && !relevant {
            return Err(format!(
                "title \"{}\" does not mention the topic \"{}\"",
                reply.title.trim(),
                request.topic.trim()
            ));
        }
    }
    Ok(())
}

/// Short prefixed id, e.g. `outline_1a2b3c4d5e6f`.
fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..12])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub topic: String,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
    #[serde(default = "default_true")]
    pub include_code_examples: bool,
}

impl OutlineRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            niche: None,
            target_audience: default_audience(),
            word_count: default_word_count(),
            include_code_examples: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate::text_len("topic", &self.topic, 3, Some(500))?;
        validate::range("word_count", self.word_count, 500, 10_000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    pub topic: String,
    #[serde(default)]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
    #[serde(default = "default_true")]
    pub include_code_examples: bool,
    /// Reviewer feedback when this is a revision.
    #[serde(default)]
    pub feedback: Option<String>,
}

impl DraftRequest {
    pub fn validate(&self) -> Result<()> {
        validate::text_len("topic", &self.topic, 3, Some(500))?;
        validate::range("word_count", self.word_count, 500, 10_000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub concept: String,
    #[serde(default)]
    pub mode: ExplainMode,
    #[serde(default = "default_true")]
    pub include_examples: bool,
    #[serde(default = "default_true")]
    pub include_analogies: bool,
}

impl ExplainRequest {
    pub fn validate(&self) -> Result<()> {
        validate::text_len("concept", &self.concept, 2, Some(300))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoRequest {
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
}

impl SeoRequest {
    pub fn validate(&self) -> Result<()> {
        validate::text_len("content", &self.content, 100, None)
    }
}

// ---------------------------------------------------------------------------
// Model reply shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SeoHints {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    meta_description: String,
}

#[derive(Debug, Deserialize)]
struct OutlineReply {
    #[serde(default)]
    title: String,
    #[serde(default)]
    hook: String,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    estimated_words: Option<u32>,
    #[serde(default, alias = "keywords")]
    seo_keywords: Vec<String>,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    seo_suggestions: Option<SeoHints>,
}

impl Structured for OutlineReply {
    const NAME: &'static str = "outline";

    fn schema_hint() -> &'static str {
        r#"{
  "title": "SEO-optimized post title",
  "hook": "Opening paragraph that hooks the reader",
  "sections": [
    {"title": "Section heading", "points": ["Key point"], "has_code_example": true}
  ],
  "estimated_words": 2000,
  "seo_keywords": ["primary keyword", "secondary keyword"],
  "meta_description": "Meta description under 160 characters"
}"#
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.sections.len() < MIN_OUTLINE_SECTIONS {
            return Err(format!(
                "outline needs at least {} sections (got {})",
                MIN_OUTLINE_SECTIONS,
                self.sections.len()
            ));
        }
        if self.sections.iter().any(|s| s.title.trim().is_empty()) {
            return Err("every section needs a title".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DraftReply {
    #[serde(default)]
    title: String,
    content: String,
}

impl Structured for DraftReply {
    const NAME: &'static str = "draft";

    fn schema_hint() -> &'static str {
        r##"{"title": "Post title", "content": "# Post title\n\nFull markdown body"}"##
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("draft content is empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ExplanationReply {
    explanation: String,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    analogies: Vec<String>,
}

impl Structured for ExplanationReply {
    const NAME: &'static str = "explanation";

    fn schema_hint() -> &'static str {
        r#"{"explanation": "Main explanation", "examples": ["Example"], "analogies": ["Analogy"]}"#
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.explanation.trim().is_empty() {
            return Err("explanation is empty".into());
        }
        Ok(())
    }
}

/// Keywords arrive either as a flat list or grouped by kind.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeywordSet {
    List(Vec<String>),
    Grouped {
        #[serde(default)]
        primary: Option<String>,
        #[serde(default)]
        secondary: Vec<String>,
        #[serde(default)]
        long_tail: Vec<String>,
    },
}

impl Default for KeywordSet {
    fn default() -> Self {
        KeywordSet::List(Vec::new())
    }
}

impl KeywordSet {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeywordSet::List(list) => list,
            KeywordSet::Grouped {
                primary,
                secondary,
                long_tail,
            } => primary.into_iter().chain(secondary).chain(long_tail).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeoReply {
    #[serde(default)]
    keywords: KeywordSet,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    title_suggestions: Vec<String>,
    #[serde(default)]
    suggestions: Vec<SeoSuggestion>,
}

impl Structured for SeoReply {
    const NAME: &'static str = "seo";

    fn schema_hint() -> &'static str {
        r#"{
  "keywords": ["primary keyword", "supporting keyword"],
  "meta_description": "Meta description under 160 characters",
  "title_suggestions": ["Title option"],
  "suggestions": [
    {"type": "keyword|structure|readability|linking", "message": "Specific change", "priority": "high|medium|low"}
  ]
}"#
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.meta_description.trim().is_empty() {
            return Err("meta_description is empty".into());
        }
        Ok(())
    }
}

impl Structured for Review {
    const NAME: &'static str = "review";

    fn schema_hint() -> &'static str {
        r#"{"quality_score": 1-10, "needs_revision": true, "feedback": "Detailed feedback", "suggested_improvements": ["Improvement"]}"#
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(1..=10).contains(&self.quality_score) {
            return Err(format!("quality_score {} is outside 1-10", self.quality_score));
        }
        Ok(())
    }
}

/// Title from a leading `# ` heading, if the content has one.
fn heading_title(content: &str) -> Option<String> {
    content
        .lines()
        .find(|l| !l.trim().is_empty())
        .and_then(|l| l.trim().strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Turns requests plus research findings into typed content.
pub struct ContentGenerator {
    client: Arc<dyn CompletionClient>,
    min_context_score: f64,
    options: CompletionOptions,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            min_context_score: 0.5,
            options: CompletionOptions::default(),
        }
    }

    /// Sampling options for every call. SEO and review replies cap the
    /// temperature at 0.3.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    fn request(&self, system: &str, prompt: String) -> CompletionRequest {
        CompletionRequest::new(prompt)
            .with_system(system)
            .with_options(self.options)
    }

    fn analysis_request(&self, system: &str, prompt: String) -> CompletionRequest {
        let temperature = self.options.temperature.min(ANALYSIS_TEMPERATURE);
        self.request(system, prompt).with_temperature(temperature)
    }

    /// Findings at or below this confidence stay out of prompts.
    pub fn with_min_context_score(mut self, score: f64) -> Self {
        self.min_context_score = score;
        self
    }

    fn context(&self, findings: &[Finding]) -> String {
        format_context(findings, self.min_context_score)
    }

    pub async fn generate_outline(
        &self,
        request: &OutlineRequest,
        findings: &[Finding],
    ) -> Result<Outline> {
        request.validate()?;
        let context = self.context(findings);
        let prompt = prompts::outline_prompt(&OutlinePrompt {
            topic: &request.topic,
            niche: request.niche.as_deref(),
            target_audience: &request.target_audience,
            word_count: request.word_count,
            include_code_examples: request.include_code_examples,
            context: &context,
        });
        let completion = self.request(prompts::OUTLINE_SYSTEM, prompt);
        let reply: OutlineReply = complete_structured_with(self.client.as_ref(), &completion, |r: &OutlineReply| {
            check_outline(r, request)
        })
        .await?;

        let hints = reply.seo_suggestions.unwrap_or_default();
        let seo_keywords = if reply.seo_keywords.is_empty() {
            hints.keywords
        } else {
            reply.seo_keywords
        };
        let meta_description = if reply.meta_description.trim().is_empty() {
            hints.meta_description
        } else {
            reply.meta_description
        };
        let title = if reply.title.trim().is_empty() {
            format!("Guide to {}", request.topic.trim())
        } else {
            reply.title
        };

        let outline = Outline {
            id: short_id("outline"),
            title,
            hook: reply.hook,
            sections: reply.sections,
            estimated_words: reply
                .estimated_words
                .filter(|w| *w > 0)
                .unwrap_or(request.word_count),
            seo_keywords,
            meta_description,
        };
        tracing::info!(id = %outline.id, sections = outline.sections.len(), "outline generated");
        Ok(outline)
    }

    pub async fn generate_draft(&self, request: &DraftRequest, findings: &[Finding]) -> Result<Draft> {
        request.validate()?;
        let outline_json = request
            .outline
            .as_ref()
            .map(serde_json::to_string_pretty)
            .transpose()?;
        let context = self.context(findings);
        let prompt = prompts::draft_prompt(&DraftPrompt {
            topic: &request.topic,
            outline: outline_json.as_deref(),
            tone: request.tone,
            word_count: request.word_count,
            include_code_examples: request.include_code_examples,
            feedback: request.feedback.as_deref(),
            context: &context,
        });
        let completion = self.request(prompts::DRAFT_SYSTEM, prompt);
        let reply: DraftReply = complete_structured(self.client.as_ref(), &completion).await?;

        let title = Some(reply.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| heading_title(&reply.content))
            .or_else(|| request.outline.as_ref().map(|o| o.title.clone()))
            .unwrap_or_else(|| request.topic.trim().to_string());

        let draft = Draft {
            id: short_id("draft"),
            title,
            word_count: word_count(&reply.content),
            content: reply.content,
            tone: request.tone,
            target_word_count: request.word_count,
        };
        tracing::info!(id = %draft.id, words = draft.word_count, "draft generated");
        Ok(draft)
    }

    pub async fn explain_concept(&self, request: &ExplainRequest) -> Result<Explanation> {
        request.validate()?;
        let prompt = prompts::explain_prompt(
            &request.concept,
            request.mode,
            request.include_examples,
            request.include_analogies,
            "",
        );
        let completion = self.request(prompts::EXPLAIN_SYSTEM, prompt);
        let reply: ExplanationReply = complete_structured(self.client.as_ref(), &completion).await?;

        Ok(Explanation {
            concept: request.concept.trim().to_string(),
            mode: request.mode,
            explanation: reply.explanation,
            examples: if request.include_examples {
                reply.examples
            } else {
                Vec::new()
            },
            analogies: if request.include_analogies {
                reply.analogies
            } else {
                Vec::new()
            },
        })
    }

    /// Keyword metrics are computed locally; the model supplies copy and
    /// suggestions, and keywords when the caller gave none.
    pub async fn optimize_seo(&self, request: &SeoRequest) -> Result<SeoReport> {
        request.validate()?;
        let audience = request.target_audience.as_deref().unwrap_or("developers");
        let prompt = prompts::seo_prompt(&request.content, &request.keywords, audience);
        let completion = self.analysis_request(prompts::SEO_SYSTEM, prompt);
        let reply: SeoReply = complete_structured(self.client.as_ref(), &completion).await?;

        let keywords: Vec<String> = if request.keywords.iter().any(|k| !k.trim().is_empty()) {
            request.keywords.clone()
        } else {
            reply.keywords.into_vec()
        };

        Ok(SeoReport {
            keyword_density: keyword_density(&request.content, &keywords),
            keywords,
            word_count: word_count(&request.content),
            meta_description: reply.meta_description,
            title_suggestions: reply.title_suggestions,
            suggestions: reply.suggestions,
        })
    }

    /// Editorial review of a draft. A revision is only requested when the
    /// model asks for one and the score is below [`APPROVAL_SCORE`].
    pub async fn review_draft(
        &self,
        draft: &Draft,
        topic: &str,
        target_audience: &str,
    ) -> Result<Review> {
        let prompt = prompts::review_prompt(&draft.title, topic, target_audience, &draft.content);
        let completion = self.analysis_request(prompts::REVIEW_SYSTEM, prompt);
        let mut review: Review = complete_structured(self.client.as_ref(), &completion).await?;
        review.needs_revision = review.needs_revision && review.quality_score < APPROVAL_SCORE;
        tracing::info!(
            score = review.quality_score,
            needs_revision = review.needs_revision,
            "draft reviewed"
        );
        Ok(review)
    }
}
