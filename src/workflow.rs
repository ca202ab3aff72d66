//! Blog workflow runner.
//!
//! Drives [`run_workflow`] and, once a run reaches `Complete`, stores its
//! research session and the final state as a `workflow` content record.
//! Failed runs are not stored; the caller gets the [`WorkflowFailure`]
//! with the last good state instead.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

use blogforge_core::models::{format_ts_iso, ContentKind, ContentRecord, ResearchResult};
use blogforge_core::workflow::{
    run_workflow, WorkflowFailure, WorkflowRequest, WorkflowState, WorkflowSteps, STEPS,
};

use crate::knowledge::default_owner;
use crate::repository;

#[derive(Debug, Clone, Deserialize)]
pub struct BlogParams {
    #[serde(flatten)]
    pub request: WorkflowRequest,
    #[serde(default = "default_owner")]
    pub owner: String,
}

/// Static description served by `GET /workflow/status`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInfo {
    pub service: &'static str,
    pub status: &'static str,
    pub steps: Vec<&'static str>,
    pub max_revisions: u32,
    pub description: &'static str,
}

pub struct WorkflowRunner {
    pool: SqlitePool,
    steps: Arc<dyn WorkflowSteps>,
    max_revisions: u32,
}

impl WorkflowRunner {
    pub fn new(pool: SqlitePool, steps: Arc<dyn WorkflowSteps>, max_revisions: u32) -> Self {
        Self {
            pool,
            steps,
            max_revisions,
        }
    }

    pub fn info(&self) -> WorkflowInfo {
        WorkflowInfo {
            service: "blog_workflow",
            status: "available",
            steps: STEPS.to_vec(),
            max_revisions: self.max_revisions,
            description: "Research, outline, draft, review (with bounded revisions) and SEO-optimize a blog post",
        }
    }

    /// Run one blog workflow to completion.
    ///
    /// A step failure comes back as an `anyhow::Error` wrapping a
    /// [`WorkflowFailure`]; downcast it to reach the failed state.
    pub async fn run(&self, params: BlogParams) -> Result<WorkflowState> {
        params.request.validate()?;
        let state = WorkflowState::new(params.request, self.max_revisions);
        tracing::info!(run = %state.id, topic = %state.topic, "workflow started");

        let state = run_workflow(self.steps.as_ref(), state)
            .await
            .map_err(anyhow::Error::new)?;

        self.persist(&params.owner, &state).await?;
        Ok(state)
    }

    async fn persist(&self, owner: &str, state: &WorkflowState) -> Result<()> {
        let now = format_ts_iso(chrono::Utc::now().timestamp());

        if let Some(research_id) = &state.research_id {
            let research = ResearchResult {
                id: research_id.clone(),
                topic: state.topic.clone(),
                niche: state.niche.clone(),
                depth: state.depth,
                findings: state.findings.clone(),
                sources: state.sources.clone(),
                created_at: now.clone(),
            };
            repository::save_research(&self.pool, owner, &research).await?;
        }

        let title = state
            .draft
            .as_ref()
            .map(|d| d.title.clone())
            .or_else(|| state.outline.as_ref().map(|o| o.title.clone()))
            .unwrap_or_else(|| state.topic.clone());

        repository::save_content(
            &self.pool,
            &ContentRecord {
                id: state.id.clone(),
                owner: owner.to_string(),
                kind: ContentKind::Workflow,
                topic: state.topic.clone(),
                title,
                body: serde_json::to_value(state)?,
                status: state.status.as_str().to_string(),
                created_at: now,
            },
        )
        .await?;

        tracing::debug!(run = %state.id, owner, "workflow run stored");
        Ok(())
    }
}

/// The failed run behind an error returned by [`WorkflowRunner::run`].
pub fn as_failure(err: &anyhow::Error) -> Option<&WorkflowFailure> {
    err.downcast_ref::<WorkflowFailure>()
}
