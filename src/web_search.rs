//! Exa-style web search.
//!
//! `POST {url}` with an `x-api-key` header; results come back as
//! `results[{title, url, text?}]`. Failures surface as provider errors and
//! the researcher treats them as "no web findings".

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use blogforge_core::error::Error;
use blogforge_core::research::{WebResult, WebSearch};

use crate::config::WebSearchConfig;

const MAX_SNIPPET_CHARS: u32 = 2000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    #[serde(rename = "type")]
    search_type: &'static str,
    contents: SearchContents,
}

#[derive(Serialize)]
struct SearchContents {
    text: TextOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextOptions {
    max_characters: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct ExaSearch {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl ExaSearch {
    /// Build from config. Returns `Ok(None)` when web search is disabled.
    pub fn from_config(config: &WebSearchConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::FatalProvider(format!("{} environment variable not set", config.api_key_env))
        })?;
        Ok(Some(Self::new(config, api_key)?))
    }

    pub fn new(config: &WebSearchConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            url: config.url.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl WebSearch for ExaSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        let body = SearchRequest {
            query,
            num_results: limit,
            search_type: "auto",
            contents: SearchContents {
                text: TextOptions {
                    max_characters: MAX_SNIPPET_CHARS,
                },
            },
        };

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::TransientProvider(format!("web search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("web search error {}: {}", status, text);
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                Error::TransientProvider(message).into()
            } else {
                Error::FatalProvider(message).into()
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::TransientProvider(format!("web search returned bad JSON: {}", e)))?;

        let results: Vec<WebResult> = parsed
            .results
            .into_iter()
            .filter_map(|hit| {
                let text = hit.text.filter(|t| !t.trim().is_empty())?;
                Some(WebResult {
                    title: hit.title.unwrap_or_else(|| hit.url.clone()),
                    url: hit.url,
                    text,
                })
            })
            .take(limit)
            .collect();

        tracing::debug!(query, hits = results.len(), "web search");
        Ok(results)
    }
}
