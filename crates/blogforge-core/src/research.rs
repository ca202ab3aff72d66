//! Research: gather findings from the knowledge base and the web.
//!
//! # Pipeline
//!
//! ```text
//! topic ──► embed ──► query each collection for the niche (top_k × depth)
//!                            │
//!   "topic niche" ──► web search (optional, failure tolerated)
//!                            │
//!                            ▼
//!            dedup by normalized text (keep best confidence)
//!                            │
//!                            ▼
//!          sort by confidence (stable) ──► cap at max_findings
//! ```
//!
//! Knowledge-base confidence is the cosine similarity clamped to `[0, 1]`.
//! Web results have no score of their own and get the configured
//! `web_prior`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::error::Error;
use crate::models::{format_ts_iso, Depth, Finding, Provenance, ResearchResult};
use crate::store::VectorStore;

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// External web search collaborator.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>>;
}

/// Tunables for [`Researcher`].
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Collections searched when the niche has no mapping of its own.
    pub collections: Vec<String>,
    /// Lowercased niche → collections.
    pub niche_collections: HashMap<String, Vec<String>>,
    /// Base chunks per collection before depth scaling.
    pub top_k: usize,
    pub max_findings: usize,
    /// Confidence assigned to web results.
    pub web_prior: f64,
    /// Base web results before depth scaling.
    pub web_results: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            collections: vec!["user_content".into(), "tech_blog_knowledge".into()],
            niche_collections: HashMap::new(),
            top_k: 5,
            max_findings: 20,
            web_prior: 0.5,
            web_results: 5,
        }
    }
}

impl ResearchSettings {
    /// Collections to query for `niche`.
    pub fn collections_for(&self, niche: Option<&str>) -> &[String] {
        niche
            .and_then(|n| self.niche_collections.get(&n.trim().to_lowercase()))
            .unwrap_or(&self.collections)
    }
}

/// What to research.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub topic: String,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default)]
    pub depth: Depth,
}

pub struct Researcher {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn VectorStore>,
    web: Option<Arc<dyn WebSearch>>,
    settings: ResearchSettings,
}

impl Researcher {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn VectorStore>,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            client,
            store,
            web: None,
            settings,
        }
    }

    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Run the full pipeline and package the result as a new session.
    pub async fn research(&self, query: &ResearchQuery) -> Result<ResearchResult> {
        let findings = self.gather(query).await?;
        let sources = distinct_sources(&findings);
        Ok(ResearchResult {
            id: Uuid::new_v4().to_string(),
            topic: query.topic.clone(),
            niche: query.niche.clone(),
            depth: query.depth,
            findings,
            sources,
            created_at: format_ts_iso(chrono::Utc::now().timestamp()),
        })
    }

    /// Collect, merge and cap findings for `query`.
    pub async fn gather(&self, query: &ResearchQuery) -> Result<Vec<Finding>> {
        let topic = query.topic.trim();
        if topic.is_empty() {
            return Err(Error::invalid("research topic must not be empty").into());
        }

        let mut findings = self.knowledge_findings(topic, query).await?;
        findings.extend(self.web_findings(topic, query).await);

        let merged = merge_findings(findings, self.settings.max_findings);
        tracing::info!(
            topic,
            depth = %query.depth,
            findings = merged.len(),
            "research complete"
        );
        Ok(merged)
    }

    async fn knowledge_findings(&self, topic: &str, query: &ResearchQuery) -> Result<Vec<Finding>> {
        let top_k = query.depth.scale(self.settings.top_k);
        let embedding = self.client.embed_one(topic).await?;

        let mut findings = Vec::new();
        for collection in self.settings.collections_for(query.niche.as_deref()) {
            let hits = self.store.query(collection, &embedding, top_k, None).await?;
            tracing::debug!(collection = %collection, hits = hits.len(), "knowledge query");
            for hit in hits {
                let title = hit
                    .metadata
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Knowledge Base")
                    .to_string();
                findings.push(Finding::new(
                    title,
                    hit.text,
                    format!("kb:{}/{}", collection, hit.chunk_id),
                    hit.score,
                    Provenance::KnowledgeBase,
                ));
            }
        }
        Ok(findings)
    }

    async fn web_findings(&self, topic: &str, query: &ResearchQuery) -> Vec<Finding> {
        let Some(web) = &self.web else {
            return Vec::new();
        };

        let search = match query.niche.as_deref().map(str::trim) {
            Some(niche) if !niche.is_empty() => format!("{} {}", topic, niche),
            _ => topic.to_string(),
        };
        let limit = query.depth.scale(self.settings.web_results);

        match web.search(&search, limit).await {
            Ok(results) => results
                .into_iter()
                .filter(|r| !r.text.trim().is_empty())
                .map(|r| {
                    Finding::new(
                        r.title,
                        r.text,
                        r.url,
                        self.settings.web_prior,
                        Provenance::Web,
                    )
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "web search failed, continuing with knowledge base only");
                Vec::new()
            }
        }
    }
}

/// Lowercase, keep alphanumerics, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deduplicate by normalized text, sort by confidence and cap.
///
/// Of two findings with the same normalized text the more confident one
/// survives, in the position of the first occurrence. The sort is stable.
pub fn merge_findings(findings: Vec<Finding>, max_findings: usize) -> Vec<Finding> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Finding> = Vec::new();

    for finding in findings {
        let key = normalize_text(&finding.text);
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&i) => {
                if finding.confidence > merged[i].confidence {
                    merged[i] = finding;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(finding);
            }
        }
    }

    merged.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(max_findings);
    merged
}

/// Distinct sources in finding order.
pub fn distinct_sources(findings: &[Finding]) -> Vec<String> {
    let mut seen = HashSet::new();
    findings
        .iter()
        .filter(|f| seen.insert(f.source.as_str()))
        .map(|f| f.source.clone())
        .collect()
}

/// Render findings for prompt injection.
///
/// Only findings with `confidence > min_confidence` are kept. Each becomes
/// `[Source: <title>]\n<text>`; blocks are separated by `\n\n---\n\n`.
pub fn format_context(findings: &[Finding], min_confidence: f64) -> String {
    findings
        .iter()
        .filter(|f| f.confidence > min_confidence)
        .map(|f| {
            let label = if f.title.trim().is_empty() {
                f.source.as_str()
            } else {
                f.title.as_str()
            };
            format!("[Source: {}]\n{}", label, f.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryVectorStore;
    use crate::store::VectorRecord;
    use crate::testing::ScriptedClient;
    use anyhow::anyhow;
    use serde_json::json;

    struct FixedWeb(Vec<WebResult>);

    #[async_trait]
    impl WebSearch for FixedWeb {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<WebResult>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct BrokenWeb;

    #[async_trait]
    impl WebSearch for BrokenWeb {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<WebResult>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn web(text: &str) -> WebResult {
        WebResult {
            title: "Web".into(),
            url: format!("https://example.com/{}", text.len()),
            text: text.into(),
        }
    }

    async fn seeded_store(client: &ScriptedClient) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let texts = [
            "Apex REST services expose classes over HTTP",
            "Governor limits cap SOQL queries per transaction",
            "Lightning web components render in the browser",
        ];
        for (i, text) in texts.iter().enumerate() {
            let embedding = client.embed_one(text).await.unwrap();
            store
                .upsert(
                    "user_content",
                    VectorRecord {
                        chunk_id: format!("c{}", i),
                        document_id: "d1".into(),
                        embedding,
                        text: text.to_string(),
                        metadata: json!({"title": "Apex notes"}),
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,   WORLD!\n"), "hello world");
        assert_eq!(normalize_text("a-b"), "a b");
    }

    #[test]
    fn test_merge_keeps_highest_confidence() {
        let findings = vec![
            Finding::new("a", "Apex REST!", "s1", 0.4, Provenance::Web),
            Finding::new("b", "other text", "s2", 0.6, Provenance::KnowledgeBase),
            Finding::new("c", "apex   rest", "s3", 0.9, Provenance::KnowledgeBase),
        ];
        let merged = merge_findings(findings, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "s3");
        assert_eq!(merged[0].confidence, 0.9);
        assert_eq!(merged[1].source, "s2");
    }

    #[test]
    fn test_merge_caps_and_is_stable() {
        let findings: Vec<_> = (0..5)
            .map(|i| Finding::new("t", format!("text {}", i), format!("s{}", i), 0.5, Provenance::Web))
            .collect();
        let merged = merge_findings(findings, 3);
        let sources: Vec<_> = merged.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(sources, vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn test_format_context_threshold() {
        let findings = vec![
            Finding::new("Intro", "kept", "s1", 0.8, Provenance::KnowledgeBase),
            Finding::new("Weak", "dropped", "s2", 0.5, Provenance::Web),
            Finding::new("", "also kept", "s3", 0.7, Provenance::Web),
        ];
        let ctx = format_context(&findings, 0.5);
        assert_eq!(ctx, "[Source: Intro]\nkept\n\n---\n\n[Source: s3]\nalso kept");
        assert_eq!(format_context(&[], 0.5), "");
    }

    #[test]
    fn test_distinct_sources_in_order() {
        let findings = vec![
            Finding::new("a", "x", "s2", 0.9, Provenance::Web),
            Finding::new("b", "y", "s1", 0.8, Provenance::Web),
            Finding::new("c", "z", "s2", 0.7, Provenance::Web),
        ];
        assert_eq!(distinct_sources(&findings), vec!["s2", "s1"]);
    }

    #[test]
    fn test_niche_mapping() {
        let mut settings = ResearchSettings::default();
        settings
            .niche_collections
            .insert("salesforce".into(), vec!["salesforce_docs".into()]);
        assert_eq!(settings.collections_for(Some("Salesforce")), ["salesforce_docs"]);
        assert_eq!(settings.collections_for(None), settings.collections.as_slice());
    }

    #[tokio::test]
    async fn test_research_merges_kb_and_web() {
        let client = Arc::new(ScriptedClient::new(256));
        let store = seeded_store(&client).await;
        let researcher = Researcher::new(client.clone(), store, ResearchSettings::default())
            .with_web_search(Arc::new(FixedWeb(vec![
                web("Apex REST services expose classes over HTTP"),
                web("Named credentials simplify callouts"),
            ])));

        let result = researcher
            .research(&ResearchQuery {
                topic: "Apex REST services".into(),
                niche: Some("salesforce".into()),
                depth: Depth::Medium,
            })
            .await
            .unwrap();

        assert!(!result.findings.is_empty());
        assert!(result.findings.iter().all(|f| (0.0..=1.0).contains(&f.confidence)));
        for pair in result.findings.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }

        let rest: Vec<_> = result
            .findings
            .iter()
            .filter(|f| normalize_text(&f.text) == "apex rest services expose classes over http")
            .collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].provenance, Provenance::KnowledgeBase);

        let web_hit = result
            .findings
            .iter()
            .find(|f| f.text.starts_with("Named credentials"))
            .unwrap();
        assert_eq!(web_hit.confidence, 0.5);
        assert_eq!(result.sources.len(), result.findings.len());
    }

    #[tokio::test]
    async fn test_web_failure_degrades_to_kb() {
        let client = Arc::new(ScriptedClient::new(256));
        let store = seeded_store(&client).await;
        let researcher = Researcher::new(client.clone(), store, ResearchSettings::default())
            .with_web_search(Arc::new(BrokenWeb));

        let findings = researcher
            .gather(&ResearchQuery {
                topic: "governor limits".into(),
                niche: None,
                depth: Depth::Shallow,
            })
            .await
            .unwrap();
        assert!(!findings.is_empty());
        assert!(findings.len() <= 3);
        assert!(findings.iter().all(|f| f.provenance == Provenance::KnowledgeBase));
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let client = Arc::new(ScriptedClient::new(8));
        let researcher = Researcher::new(
            client,
            Arc::new(InMemoryVectorStore::new()),
            ResearchSettings::default(),
        );
        let err = researcher.gather(&ResearchQuery::default()).await.unwrap_err();
        assert_eq!(crate::error::classify(&err).map(|e| e.kind()), Some("invalid_request"));
    }
}
