//! TOML configuration.
//!
//! Every section except `[db]` has defaults, so a minimal file is:
//!
//! ```toml
//! [db]
//! path = "./data/blogforge.sqlite"
//! ```
//!
//! Secrets never live in the file: `llm.api_key_env` and
//! `web_search.api_key_env` name the environment variables that hold them
//! (a `.env` file is loaded at startup).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blogforge_core::research::ResearchSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai` (any OpenAI-compatible API) or `ollama`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt up to 2^5 times this.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
    /// Niche (lowercase) → collections searched for it.
    #[serde(default = "default_niche_collections")]
    pub niche_collections: HashMap<String, Vec<String>>,
    /// Collection that uploads land in when the request names none.
    #[serde(default = "default_upload_collection")]
    pub default_collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
    #[serde(default = "default_web_prior")]
    pub web_prior: f64,
    #[serde(default = "default_min_context_score")]
    pub min_context_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collections: default_collections(),
            niche_collections: default_niche_collections(),
            default_collection: default_upload_collection(),
            top_k: default_top_k(),
            max_findings: default_max_findings(),
            web_prior: default_web_prior(),
            min_context_score: default_min_context_score(),
        }
    }
}

fn default_collections() -> Vec<String> {
    vec!["user_content".to_string(), "tech_blog_knowledge".to_string()]
}
fn default_niche_collections() -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "salesforce".to_string(),
        vec![
            "salesforce_docs".to_string(),
            "user_content".to_string(),
            "tech_blog_knowledge".to_string(),
        ],
    )])
}
fn default_upload_collection() -> String {
    "user_content".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_max_findings() -> usize {
    20
}
fn default_web_prior() -> f64 {
    0.5
}
fn default_min_context_score() -> f64 {
    0.5
}

impl RetrievalConfig {
    pub fn research_settings(&self, web_results: usize) -> ResearchSettings {
        ResearchSettings {
            collections: self.collections.clone(),
            niche_collections: self
                .niche_collections
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            top_k: self.top_k,
            max_findings: self.max_findings,
            web_prior: self.web_prior,
            web_results,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_web_url")]
    pub url: String,
    #[serde(default = "default_web_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_num_results")]
    pub num_results: usize,
    #[serde(default = "default_web_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_web_url(),
            api_key_env: default_web_key_env(),
            num_results: default_num_results(),
            timeout_secs: default_web_timeout_secs(),
        }
    }
}

fn default_web_url() -> String {
    "https://api.exa.ai/search".to_string()
}
fn default_web_key_env() -> String {
    "EXA_API_KEY".to_string()
}
fn default_num_results() -> usize {
    5
}
fn default_web_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
        }
    }
}

fn default_max_revisions() -> u32 {
    blogforge_core::workflow::DEFAULT_MAX_REVISIONS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.cache.enabled && config.cache.capacity == 0 {
        bail!("cache.capacity must be > 0 when the cache is enabled");
    }

    if config.chunking.max_chunk_size == 0 {
        bail!("chunking.max_chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.max_chunk_size ({})",
            config.chunking.overlap,
            config.chunking.max_chunk_size
        );
    }

    let retrieval = &config.retrieval;
    if retrieval.collections.is_empty() {
        bail!("retrieval.collections must name at least one collection");
    }
    if retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if retrieval.max_findings == 0 {
        bail!("retrieval.max_findings must be >= 1");
    }
    if !(0.0..=1.0).contains(&retrieval.web_prior) {
        bail!("retrieval.web_prior must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&retrieval.min_context_score) {
        bail!("retrieval.min_context_score must be in [0.0, 1.0]");
    }

    if config.web_search.enabled && config.web_search.url.trim().is_empty() {
        bail!("web_search.url must be set when web search is enabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse_config("[db]\npath = \"./data/test.sqlite\"\n").unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.chunking.max_chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.collections, vec!["user_content", "tech_blog_knowledge"]);
        assert_eq!(config.retrieval.web_prior, 0.5);
        assert_eq!(config.workflow.max_revisions, 2);
        assert!(!config.web_search.enabled);
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/blogforge.example.toml")).unwrap();
        assert_eq!(config.embedding.dims, 1536);
        assert_eq!(
            config.retrieval.niche_collections["salesforce"][0],
            "salesforce_docs"
        );
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let err = parse_config(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nmax_chunk_size = 100\noverlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse_config("[db]\npath = \"x.sqlite\"\n[llm]\nprovider = \"bard\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn test_niche_mapping_lowercased() {
        let config = parse_config(
            "[db]\npath = \"x.sqlite\"\n[retrieval.niche_collections]\nAI = [\"ai_papers\"]\n",
        )
        .unwrap();
        let settings = config.retrieval.research_settings(5);
        assert_eq!(settings.collections_for(Some("ai")), ["ai_papers"]);
        assert_eq!(settings.collections_for(Some("fullstack")), settings.collections.as_slice());
    }
}
