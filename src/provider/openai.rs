use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use blogforge_core::completion::{CompletionClient, CompletionRequest};
use blogforge_core::embedding::ensure_dims;
use blogforge_core::error::Error;

use super::{http_client, parse_vector, post_json, RetryPolicy};
use crate::config::Config;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI API or anything that speaks its protocol.
///
/// Requires the environment variable named by `llm.api_key_env`.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    dims: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = std::env::var(&config.llm.api_key_env).map_err(|_| {
            Error::FatalProvider(format!(
                "{} environment variable not set",
                config.llm.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(config.llm.timeout_secs)?,
            base_url: config
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model: config.llm.model.clone(),
            embedding_model: config.embedding.model.clone(),
            dims: config.embedding.dims,
            batch_size: config.embedding.batch_size,
            retry: RetryPolicy::from_config(&config.llm),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        post_json(self.retry, "OpenAI", || {
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
        })
        .await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });
        let json = self.post("/embeddings", &body).await?;
        let embeddings = parse_embeddings(&json)?;
        if embeddings.len() != texts.len() {
            return Err(Error::TransientProvider(format!(
                "OpenAI returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            ))
            .into());
        }
        for embedding in &embeddings {
            ensure_dims(&self.embedding_model, self.dims, embedding)?;
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.options.temperature,
            "max_tokens": request.options.max_tokens,
        });

        tracing::debug!(model = %self.model, prompt_chars = request.prompt.len(), "chat completion");
        let json = self.post("/chat/completions", &body).await?;
        parse_completion(&json)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embedding_dims(&self) -> usize {
        self.dims
    }
}

fn parse_completion(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::TransientProvider("Invalid OpenAI response: missing message content".into())
                .into()
        })
}

/// `data[].embedding`, reordered by `data[].index`.
fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .context("Invalid OpenAI response: missing data array")?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .and_then(parse_vector)
            .context("Invalid OpenAI response: missing embedding")?;
        indexed.push((index, embedding));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, e)| e).collect())
}
