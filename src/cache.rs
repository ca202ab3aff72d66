//! In-process response cache in front of a [`CompletionClient`].
//!
//! Completions are keyed by SHA-256 over the model, system prompt, prompt
//! and sampling options; embeddings by SHA-256 over the embedding dims and
//! the text. Each cache is an LRU holding at most `capacity` entries.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use blogforge_core::completion::{CompletionClient, CompletionRequest};

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn build_cache<V>(size: usize) -> Mutex<LruCache<String, V>> {
    let capacity = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
}

pub struct CachedClient {
    inner: Arc<dyn CompletionClient>,
    completions: Mutex<LruCache<String, String>>,
    embeddings: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedClient {
    pub fn new(inner: Arc<dyn CompletionClient>, capacity: usize) -> Self {
        Self {
            inner,
            completions: build_cache(capacity),
            embeddings: build_cache(capacity),
        }
    }

    fn completion_key(&self, request: &CompletionRequest) -> String {
        let options = format!(
            "{}:{}",
            request.options.temperature, request.options.max_tokens
        );
        digest(&[
            "complete",
            self.inner.model_name(),
            request.system.as_deref().unwrap_or(""),
            request.prompt.as_str(),
            options.as_str(),
        ])
    }

    fn embedding_key(&self, text: &str) -> String {
        let dims = self.inner.embedding_dims().to_string();
        digest(&["embed", dims.as_str(), text])
    }

    /// Cached completion count.
    pub async fn cached_completions(&self) -> usize {
        self.completions.lock().await.len()
    }
}

#[async_trait]
impl CompletionClient for CachedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let key = self.completion_key(request);
        let hit = self.completions.lock().await.get(&key).cloned();
        if let Some(reply) = hit {
            tracing::debug!(key = %&key[..12], "completion cache hit");
            return Ok(reply);
        }

        let reply = self.inner.complete(request).await?;
        self.completions.lock().await.put(key, reply.clone());
        Ok(reply)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.embedding_key(t)).collect();

        let mut out: Vec<Option<Vec<f32>>> = {
            let mut cache = self.embeddings.lock().await;
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(&batch).await?;
            if fresh.len() != batch.len() {
                return Err(anyhow!(
                    "embedding provider returned {} vectors for {} texts",
                    fresh.len(),
                    batch.len()
                ));
            }

            let mut cache = self.embeddings.lock().await;
            for (&i, embedding) in missing.iter().zip(fresh) {
                cache.put(keys[i].clone(), embedding.clone());
                out[i] = Some(embedding);
            }
        }

        out.into_iter()
            .map(|e| e.ok_or_else(|| anyhow!("embedding missing from cache fill")))
            .collect()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn embedding_dims(&self) -> usize {
        self.inner.embedding_dims()
    }
}
