//! Research and single-shot generation endpoints with persistence.
//!
//! Wraps the core [`Researcher`] and [`ContentGenerator`]: research sessions
//! land in `research_sessions`, every generated artifact in
//! `content_records` under the caller's owner.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

use blogforge_core::content::{
    ContentGenerator, DraftRequest, ExplainRequest, OutlineRequest, SeoRequest,
};
use blogforge_core::error::Error;
use blogforge_core::models::{
    format_ts_iso, ContentKind, ContentRecord, Depth, Draft, Explanation, Finding, Outline,
    ResearchResult, SeoReport, Tone,
};
use blogforge_core::research::{ResearchQuery, Researcher};
use blogforge_core::validate;

use crate::knowledge::default_owner;
use crate::repository;

fn default_true() -> bool {
    true
}

fn default_word_count() -> u32 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchParams {
    pub topic: String,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default = "default_owner")]
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlineParams {
    #[serde(flatten)]
    pub request: OutlineRequest,
    /// Run knowledge-base/web research first and inject it as context.
    #[serde(default = "default_true")]
    pub use_research: bool,
    #[serde(default = "default_owner")]
    pub owner: String,
}

/// A draft is written either from a stored outline or from a bare topic.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftParams {
    #[serde(default)]
    pub outline_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
    #[serde(default = "default_true")]
    pub include_code_examples: bool,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default = "default_true")]
    pub use_research: bool,
    #[serde(default = "default_owner")]
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainParams {
    #[serde(flatten)]
    pub request: ExplainRequest,
    #[serde(default = "default_owner")]
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeoParams {
    #[serde(flatten)]
    pub request: SeoRequest,
    #[serde(default = "default_owner")]
    pub owner: String,
}

/// A generated artifact together with the id it was stored under.
#[derive(Debug, Clone, Serialize)]
pub struct Saved<T> {
    pub record_id: String,
    #[serde(flatten)]
    pub item: T,
}

pub struct ContentService {
    pool: SqlitePool,
    researcher: Arc<Researcher>,
    generator: Arc<ContentGenerator>,
}

impl ContentService {
    pub fn new(
        pool: SqlitePool,
        researcher: Arc<Researcher>,
        generator: Arc<ContentGenerator>,
    ) -> Self {
        Self {
            pool,
            researcher,
            generator,
        }
    }

    pub async fn research(&self, params: ResearchParams) -> Result<ResearchResult> {
        validate::text_len("topic", &params.topic, 3, Some(500))?;
        let query = ResearchQuery {
            topic: params.topic.trim().to_string(),
            niche: params.niche,
            depth: params.depth,
        };
        let result = self.researcher.research(&query).await?;
        repository::save_research(&self.pool, &params.owner, &result).await?;
        Ok(result)
    }

    pub async fn get_research(&self, id: &str) -> Result<ResearchResult> {
        repository::get_research(&self.pool, id)
            .await?
            .ok_or_else(|| Error::not_found("research session", id).into())
    }

    async fn context_for(&self, topic: &str, niche: Option<&str>, enabled: bool) -> Result<Vec<Finding>> {
        if !enabled {
            return Ok(Vec::new());
        }
        self.researcher
            .gather(&ResearchQuery {
                topic: topic.to_string(),
                niche: niche.map(str::to_string),
                depth: Depth::Medium,
            })
            .await
    }

    pub async fn outline(&self, params: OutlineParams) -> Result<Outline> {
        let request = params.request;
        request.validate()?;
        let findings = self
            .context_for(&request.topic, request.niche.as_deref(), params.use_research)
            .await?;
        let outline = self.generator.generate_outline(&request, &findings).await?;

        self.save(
            &outline.id,
            &params.owner,
            ContentKind::Outline,
            &request.topic,
            &outline.title,
            &outline,
        )
        .await?;
        Ok(outline)
    }

    pub async fn draft(&self, params: DraftParams) -> Result<Draft> {
        let (topic, outline) = match (&params.outline_id, &params.topic) {
            (Some(outline_id), _) => {
                let record = self.get_content(outline_id).await?;
                if record.kind != ContentKind::Outline {
                    return Err(Error::invalid(format!(
                        "content {} is a {}, not an outline",
                        outline_id,
                        record.kind.as_str()
                    ))
                    .into());
                }
                let outline: Outline = serde_json::from_value(record.body)?;
                let topic = params.topic.clone().unwrap_or(record.topic);
                (topic, Some(outline))
            }
            (None, Some(topic)) => (topic.clone(), None),
            (None, None) => {
                return Err(Error::invalid("either outline_id or topic is required").into());
            }
        };

        let request = DraftRequest {
            topic,
            outline,
            tone: params.tone,
            word_count: params.word_count,
            include_code_examples: params.include_code_examples,
            feedback: params.feedback,
        };
        request.validate()?;

        let findings = self
            .context_for(&request.topic, params.niche.as_deref(), params.use_research)
            .await?;
        let draft = self.generator.generate_draft(&request, &findings).await?;

        self.save(
            &draft.id,
            &params.owner,
            ContentKind::Draft,
            &request.topic,
            &draft.title,
            &draft,
        )
        .await?;
        Ok(draft)
    }

    pub async fn explain(&self, params: ExplainParams) -> Result<Saved<Explanation>> {
        let explanation = self.generator.explain_concept(&params.request).await?;
        let record_id = uuid::Uuid::new_v4().to_string();
        self.save(
            &record_id,
            &params.owner,
            ContentKind::Explanation,
            &explanation.concept,
            &explanation.concept,
            &explanation,
        )
        .await?;
        Ok(Saved {
            record_id,
            item: explanation,
        })
    }

    pub async fn optimize_seo(&self, params: SeoParams) -> Result<Saved<SeoReport>> {
        let report = self.generator.optimize_seo(&params.request).await?;
        let record_id = uuid::Uuid::new_v4().to_string();
        let topic = report
            .keywords
            .first()
            .cloned()
            .unwrap_or_else(|| "seo".to_string());
        let title = report
            .title_suggestions
            .first()
            .cloned()
            .unwrap_or_else(|| topic.clone());
        self.save(&record_id, &params.owner, ContentKind::Seo, &topic, &title, &report)
            .await?;
        Ok(Saved {
            record_id,
            item: report,
        })
    }

    pub async fn get_content(&self, id: &str) -> Result<ContentRecord> {
        repository::get_content(&self.pool, id)
            .await?
            .ok_or_else(|| Error::not_found("content", id).into())
    }

    pub async fn list_content(&self, owner: &str) -> Result<Vec<ContentRecord>> {
        repository::list_content(&self.pool, owner).await
    }

    async fn save<T: Serialize>(
        &self,
        id: &str,
        owner: &str,
        kind: ContentKind,
        topic: &str,
        title: &str,
        body: &T,
    ) -> Result<()> {
        let record = ContentRecord {
            id: id.to_string(),
            owner: owner.to_string(),
            kind,
            topic: topic.trim().to_string(),
            title: title.to_string(),
            body: serde_json::to_value(body)?,
            status: "complete".to_string(),
            created_at: format_ts_iso(chrono::Utc::now().timestamp()),
        };
        repository::save_content(&self.pool, &record).await?;
        tracing::debug!(id, kind = kind.as_str(), owner, "content saved");
        Ok(())
    }
}
