use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use blogforge_core::completion::{CompletionClient, CompletionRequest};
use blogforge_core::embedding::ensure_dims;
use blogforge_core::error::Error;

use super::{http_client, parse_vector, post_json, RetryPolicy};
use crate::config::Config;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a local Ollama instance.
///
/// Needs a chat model and an embedding model pulled
/// (e.g. `ollama pull llama3.1 && ollama pull nomic-embed-text`).
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    dims: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: http_client(config.llm.timeout_secs)?,
            base_url: config
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.llm.model.clone(),
            embedding_model: config.embedding.model.clone(),
            dims: config.embedding.dims,
            batch_size: config.embedding.batch_size,
            retry: RetryPolicy::from_config(&config.llm),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        post_json(self.retry, "Ollama", || self.http.post(&url).json(body)).await
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.options.temperature,
                "num_predict": request.options.max_tokens,
            },
        });

        let json = self.post("/api/chat", &body).await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::TransientProvider("Invalid Ollama response: missing message content".into())
                    .into()
            })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let body = json!({
                "model": self.embedding_model,
                "input": batch,
            });
            let json = self.post("/api/embed", &body).await?;
            let embeddings = parse_embeddings(&json)?;
            if embeddings.len() != batch.len() {
                return Err(Error::TransientProvider(format!(
                    "Ollama returned {} embeddings for {} inputs",
                    embeddings.len(),
                    batch.len()
                ))
                .into());
            }
            for embedding in &embeddings {
                ensure_dims(&self.embedding_model, self.dims, embedding)?;
            }
            out.extend(embeddings);
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

fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .context("Invalid Ollama response: missing embeddings array")?
        .iter()
        .map(|e| parse_vector(e).context("Invalid Ollama response: embedding is not an array"))
        .collect()
}
