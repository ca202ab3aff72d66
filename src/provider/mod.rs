//! Model provider clients.
//!
//! - **[`OpenAiClient`]** calls any OpenAI-compatible API
//!   (`/chat/completions`, `/embeddings`).
//! - **[`OllamaClient`]** calls a local Ollama instance (`/api/chat`,
//!   `/api/embed`).
//!
//! Use [`create_client`] to build the configured one, wrapped in
//! [`CachedClient`](crate::cache::CachedClient) when `[cache]` is enabled.
//!
//! # Retry Strategy
//!
//! Both clients share [`post_json`]:
//! - HTTP 429 and 5xx, network errors, timeouts and unreadable success
//!   bodies are [`Error::TransientProvider`] and are retried
//! - any other 4xx, and a request that cannot be built (bad URL), is
//!   [`Error::FatalProvider`] and returned immediately
//! - backoff is `retry_base_delay_ms × 2^(attempt-1)`, capped at 2^5

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use anyhow::Result;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use blogforge_core::completion::CompletionClient;
use blogforge_core::error::Error;

use crate::cache::CachedClient;
use crate::config::{Config, LlmConfig};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            max_retries: llm.max_retries,
            base_delay: Duration::from_millis(llm.retry_base_delay_ms),
        }
    }

    /// Delay before `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }
}

/// Send a JSON request built by `build`, retrying transient failures.
///
/// `build` is called once per attempt because a `RequestBuilder` is
/// consumed by `send`.
pub async fn post_json<F>(policy: RetryPolicy, label: &str, build: F) -> Result<Value>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            tracing::warn!(
                provider = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying provider call"
            );
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    match response.json::<Value>().await {
                        Ok(json) => return Ok(json),
                        Err(e) => {
                            last_err = Some(Error::TransientProvider(format!(
                                "{} returned an unreadable body: {}",
                                label, e
                            )));
                            continue;
                        }
                    }
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(Error::TransientProvider(format!(
                        "{} API error {}: {}",
                        label, status, body_text
                    )));
                    continue;
                }

                return Err(Error::FatalProvider(format!(
                    "{} API error {}: {}",
                    label, status, body_text
                ))
                .into());
            }
            Err(e) if e.is_builder() => {
                return Err(Error::FatalProvider(format!(
                    "{} request could not be built: {}",
                    label, e
                ))
                .into());
            }
            Err(e) => {
                last_err = Some(Error::TransientProvider(format!(
                    "{} connection error: {}",
                    label, e
                )));
                continue;
            }
        }
    }

    let err = last_err.unwrap_or_else(|| {
        Error::TransientProvider(format!("{} call failed after retries", label))
    });
    tracing::error!(provider = label, error = %err, "provider retries exhausted");
    Err(err.into())
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Parse an array of JSON numbers into an embedding vector.
pub(crate) fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Build the provider named by `llm.provider`.
pub fn create_client(config: &Config) -> Result<Arc<dyn CompletionClient>> {
    let client: Arc<dyn CompletionClient> = match config.llm.provider.as_str() {
        "openai" => Arc::new(OpenAiClient::new(config)?),
        "ollama" => Arc::new(OllamaClient::new(config)?),
        other => {
            return Err(Error::invalid(format!("Unknown llm provider: {}", other)).into());
        }
    };

    tracing::info!(
        provider = %config.llm.provider,
        model = client.model_name(),
        dims = client.embedding_dims(),
        cache = config.cache.enabled,
        "model client ready"
    );

    if config.cache.enabled {
        Ok(Arc::new(CachedClient::new(client, config.cache.capacity)))
    } else {
        Ok(client)
    }
}
