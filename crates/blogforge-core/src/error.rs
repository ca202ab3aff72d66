//! Error taxonomy shared by every Blogforge service.
//!
//! Services propagate failures as [`anyhow::Error`] and raise these typed
//! variants where the caller must react differently (retry, 404, 502, ...).
//! Frontends recover the kind with `err.downcast_ref::<Error>()`; see
//! [`classify`].

/// Typed failure kinds surfaced by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure, timeout, HTTP 429 or 5xx from the model provider.
    /// Retried with backoff; surfaced once retries are exhausted.
    #[error("transient provider error: {0}")]
    TransientProvider(String),

    /// Bad credentials or a request the provider rejected. Never retried.
    #[error("provider rejected request: {0}")]
    FatalProvider(String),

    /// The model reply could not be parsed into the expected structure,
    /// even after one corrective re-prompt.
    #[error("model output failed schema validation for {schema}: {message}")]
    SchemaValidation { schema: String, message: String },

    /// An embedding's length does not match its collection.
    #[error("dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Lookup by identifier found nothing.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Caller-supplied parameters are out of bounds.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Machine-readable kind used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TransientProvider(_) => "transient_provider_error",
            Error::FatalProvider(_) => "fatal_provider_error",
            Error::SchemaValidation { .. } => "schema_validation_error",
            Error::DimensionMismatch { .. } => "dimension_mismatch_error",
            Error::NotFound { .. } => "not_found",
            Error::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Whether a retry loop may try the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientProvider(_))
    }
}

/// Find the typed [`Error`] anywhere in an `anyhow` chain.
pub fn classify(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|e| e.downcast_ref::<Error>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_through_context() {
        let err: anyhow::Result<()> = Err(Error::not_found("document", "doc-1").into());
        let err = err.context("loading document").unwrap_err();
        let typed = classify(&err).expect("typed error");
        assert_eq!(typed.kind(), "not_found");
    }

    #[test]
    fn test_untyped_error_is_unclassified() {
        let err = anyhow::anyhow!("boom");
        assert!(classify(&err).is_none());
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(Error::TransientProvider("503".into()).is_retryable());
        assert!(!Error::FatalProvider("401".into()).is_retryable());
        assert!(!Error::invalid("x").is_retryable());
    }
}
