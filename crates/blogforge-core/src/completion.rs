//! Completion and embedding client abstraction.
//!
//! [`CompletionClient`] is implemented by the HTTP provider clients in the
//! `blogforge` app crate (OpenAI-compatible and Ollama). Structured output
//! is layered on top by [`complete_structured`], which parses the model's
//! JSON reply into a typed value and re-prompts once when the reply does
//! not fit.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sampling knobs forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// A single chat-style completion call: optional system prompt plus one
/// user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }
}

/// Text completion plus embedding, served by one model provider.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the model's reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Embed every text; output order matches input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("provider returned no embedding"))
    }

    /// Completion model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Length of every vector `embed` returns.
    fn embedding_dims(&self) -> usize;
}

/// A type the model can be asked to produce as JSON.
pub trait Structured: DeserializeOwned + Send {
    /// Short name used in errors and logs.
    const NAME: &'static str;

    /// JSON skeleton appended to the prompt.
    fn schema_hint() -> &'static str;

    /// Semantic checks beyond what deserialization enforces.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Locate the JSON object in a model reply.
///
/// Tolerates markdown code fences and prose before or after the object by
/// taking everything from the first `{` to the last `}`.
pub fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn parse_reply<T, F>(reply: &str, check: &F) -> std::result::Result<T, String>
where
    T: Structured,
    F: Fn(&T) -> std::result::Result<(), String>,
{
    let json = extract_json(reply).ok_or_else(|| "reply contains no JSON object".to_string())?;
    let value: T = serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;
    value.validate()?;
    check(&value)?;
    Ok(value)
}

/// Ask for a `T`, parse and validate it.
///
/// A reply that does not parse or validate gets exactly one corrective
/// re-prompt that quotes the problem. A second bad reply is
/// [`Error::SchemaValidation`]. Provider errors propagate unchanged.
pub async fn complete_structured<T: Structured>(
    client: &dyn CompletionClient,
    request: &CompletionRequest,
) -> Result<T> {
    complete_structured_with(client, request, |_: &T| Ok(())).await
}

/// [`complete_structured`] with an extra, request-specific check that
/// takes part in the corrective re-prompt like [`Structured::validate`].
pub async fn complete_structured_with<T, F>(
    client: &dyn CompletionClient,
    request: &CompletionRequest,
    check: F,
) -> Result<T>
where
    T: Structured,
    F: Fn(&T) -> std::result::Result<(), String> + Send + Sync,
{
    let mut first = request.clone();
    first.prompt = format!(
        "{}\n\nRespond with only a JSON object of this shape:\n{}",
        request.prompt,
        T::schema_hint()
    );

    let reply = client.complete(&first).await?;
    let problem = match parse_reply::<T, F>(&reply, &check) {
        Ok(value) => return Ok(value),
        Err(problem) => problem,
    };

    tracing::warn!(schema = T::NAME, %problem, "model reply rejected, re-prompting once");

    let mut retry = first.clone();
    retry.prompt = format!(
        "{}\n\nYour previous reply was rejected ({}). Reply again with only the corrected JSON object, no prose and no code fences.",
        first.prompt, problem
    );

    let reply = client.complete(&retry).await?;
    parse_reply::<T, F>(&reply, &check).map_err(|message| {
        Error::SchemaValidation {
            schema: T::NAME.to_string(),
            message,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::testing::ScriptedClient;

    #[derive(Debug, Deserialize)]
    struct Score {
        value: u8,
    }

    impl Structured for Score {
        const NAME: &'static str = "score";

        fn schema_hint() -> &'static str {
            r#"{"value": 1-10}"#
        }

        fn validate(&self) -> std::result::Result<(), String> {
            if (1..=10).contains(&self.value) {
                Ok(())
            } else {
                Err(format!("value {} outside 1-10", self.value))
            }
        }
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(
            extract_json("Sure!\n```json\n{\"a\": {\"b\": 2}}\n```\nDone."),
            Some("{\"a\": {\"b\": 2}}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_structured_first_try() {
        let client = ScriptedClient::new(4).with_replies(["```json\n{\"value\": 7}\n```"]);
        let score: Score = complete_structured(&client, &CompletionRequest::new("rate"))
            .await
            .unwrap();
        assert_eq!(score.value, 7);
        assert_eq!(client.requests().len(), 1);
        assert!(client.requests()[0].prompt.contains(r#"{"value": 1-10}"#));
    }

    #[tokio::test]
    async fn test_structured_corrective_retry() {
        let client = ScriptedClient::new(4).with_replies(["{\"value\": 42}", "{\"value\": 3}"]);
        let score: Score = complete_structured(&client, &CompletionRequest::new("rate"))
            .await
            .unwrap();
        assert_eq!(score.value, 3);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("value 42 outside 1-10"));
    }

    #[tokio::test]
    async fn test_structured_gives_up_after_one_retry() {
        let client = ScriptedClient::new(4).with_replies(["nope", "still nope", "{\"value\": 5}"]);
        let err = complete_structured::<Score>(&client, &CompletionRequest::new("rate"))
            .await
            .unwrap_err();
        assert_eq!(classify(&err).map(|e| e.kind()), Some("schema_validation_error"));
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_structured_extra_check_reprompts() {
        let client = ScriptedClient::new(4).with_replies(["{\"value\": 2}", "{\"value\": 8}"]);
        let score: Score = complete_structured_with(&client, &CompletionRequest::new("rate"), |s: &Score| {
            if s.value >= 5 {
                Ok(())
            } else {
                Err(format!("value {} below 5", s.value))
            }
        })
        .await
        .unwrap();
        assert_eq!(score.value, 8);
        assert!(client.requests()[1].prompt.contains("value 2 below 5"));
    }

    #[tokio::test]
    async fn test_embed_one_uses_configured_dims() {
        let client = ScriptedClient::new(8);
        let v = client.embed_one("apex triggers").await.unwrap();
        assert_eq!(v.len(), 8);
    }
}
