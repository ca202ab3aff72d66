//! Core data models used throughout Blogforge.
//!
//! These types are the research findings, outlines, drafts, SEO reports and
//! knowledge-base documents that flow between the retrieval pipeline, the
//! content generator and the workflow orchestrator. All of them serialize
//! to the JSON shapes returned by the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where a [`Finding`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Web,
    KnowledgeBase,
}

/// A single research snippet with a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub text: String,
    /// Source URL, or `kb:<collection>/<chunk_id>` for knowledge-base hits.
    pub source: String,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl Finding {
    /// Build a finding, clamping `confidence` into `[0, 1]` (NaN becomes 0).
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        confidence: f64,
        provenance: Provenance,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            title: title.into(),
            text: text.into(),
            source: source.into(),
            confidence,
            provenance,
        }
    }
}

/// How much material research gathers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Shallow,
    #[default]
    Medium,
    Deep,
}

impl Depth {
    /// Scale a base `top_k` for this depth (never below 1).
    pub fn scale(&self, top_k: usize) -> usize {
        let scaled = match self {
            Depth::Shallow => top_k.div_ceil(2),
            Depth::Medium => top_k,
            Depth::Deep => top_k * 2,
        };
        scaled.max(1)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Depth::Shallow => "shallow",
            Depth::Medium => "medium",
            Depth::Deep => "deep",
        };
        f.write_str(s)
    }
}

impl FromStr for Depth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shallow" => Ok(Depth::Shallow),
            "medium" => Ok(Depth::Medium),
            "deep" => Ok(Depth::Deep),
            other => Err(Error::invalid(format!(
                "unknown research depth '{}': use shallow, medium or deep",
                other
            ))),
        }
    }
}

/// A persisted research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub id: String,
    pub topic: String,
    pub niche: Option<String>,
    pub depth: Depth,
    pub findings: Vec<Finding>,
    /// Distinct sources, in finding order.
    pub sources: Vec<String>,
    pub created_at: String,
}

/// One section of a blog outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default, alias = "key_points")]
    pub points: Vec<String>,
    #[serde(default)]
    pub has_code_example: bool,
}

/// Blog post structure produced by the outline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub hook: String,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub estimated_words: u32,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
    #[serde(default)]
    pub meta_description: String,
}

/// Writing style directive for drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Conversational,
    Formal,
    Tutorial,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tone::Conversational => "conversational",
            Tone::Formal => "formal",
            Tone::Tutorial => "tutorial",
        };
        f.write_str(s)
    }
}

impl FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversational" => Ok(Tone::Conversational),
            "formal" => Ok(Tone::Formal),
            "tutorial" => Ok(Tone::Tutorial),
            other => Err(Error::invalid(format!(
                "unknown tone '{}': use conversational, formal or tutorial",
                other
            ))),
        }
    }
}

/// A full blog post draft in markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Counted locally over whitespace-separated words.
    pub word_count: usize,
    pub tone: Tone,
    pub target_word_count: u32,
}

/// Explanation register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplainMode {
    Eli5,
    #[default]
    Technical,
    DeepDive,
}

impl fmt::Display for ExplainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExplainMode::Eli5 => "eli5",
            ExplainMode::Technical => "technical",
            ExplainMode::DeepDive => "deep-dive",
        };
        f.write_str(s)
    }
}

impl FromStr for ExplainMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eli5" => Ok(ExplainMode::Eli5),
            "technical" => Ok(ExplainMode::Technical),
            "deep-dive" | "deep_dive" => Ok(ExplainMode::DeepDive),
            other => Err(Error::invalid(format!(
                "unknown explanation mode '{}': use eli5, technical or deep-dive",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub concept: String,
    pub mode: ExplainMode,
    pub explanation: String,
    pub examples: Vec<String>,
    pub analogies: Vec<String>,
}

/// Editorial verdict on a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub quality_score: u8,
    pub needs_revision: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggested_improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoSuggestion {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub message: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// Locally computed keyword frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordDensity {
    pub keyword: String,
    pub occurrences: usize,
    /// `occurrences / total_words × 100`.
    pub density_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoReport {
    pub keywords: Vec<String>,
    pub keyword_density: Vec<KeywordDensity>,
    pub word_count: usize,
    pub meta_description: String,
    pub title_suggestions: Vec<String>,
    pub suggestions: Vec<SeoSuggestion>,
}

/// A chunk of a knowledge document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Start offset in characters, inclusive.
    pub start: usize,
    /// End offset in characters, exclusive.
    pub end: usize,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A chunk together with the vector stored for it.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub collection: String,
    pub embedding: Vec<f32>,
}

/// An uploaded knowledge-base document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub document_type: String,
    pub collection: String,
    pub metadata: serde_json::Value,
    pub chunks: Vec<Chunk>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Outline,
    Draft,
    Explanation,
    Seo,
    Workflow,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Outline => "outline",
            ContentKind::Draft => "draft",
            ContentKind::Explanation => "explanation",
            ContentKind::Seo => "seo",
            ContentKind::Workflow => "workflow",
        }
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outline" => Ok(ContentKind::Outline),
            "draft" => Ok(ContentKind::Draft),
            "explanation" => Ok(ContentKind::Explanation),
            "seo" => Ok(ContentKind::Seo),
            "workflow" => Ok(ContentKind::Workflow),
            other => Err(Error::invalid(format!("unknown content kind '{}'", other))),
        }
    }
}

/// Generated content persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub owner: String,
    pub kind: ContentKind,
    pub topic: String,
    pub title: String,
    pub body: serde_json::Value,
    pub status: String,
    pub created_at: String,
}

/// Format a unix timestamp as ISO 8601 (UTC, second precision).
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
