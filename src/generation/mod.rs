//! Narrative text generation.
//!
//! The report composer only sees the [`TextGenerator`] trait: text in, text
//! out, fallible. [`GeminiClient`] is the shipped implementation.

pub mod gemini;
pub mod pacing;

pub use gemini::*;
pub use pacing::*;

use async_trait::async_trait;
use thiserror::Error;

/// Failures of one generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("cannot reach the generation service: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("generation service error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    #[error("no API key configured (use --api-key, GEMINI_API_KEY or model.api_key)")]
    MissingCredential,
}

impl GenerationError {
    /// Credential problems make every later call fail the same way.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            GenerationError::Auth(_) | GenerationError::MissingCredential
        )
    }
}

/// An external text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model name shown in the report metadata.
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_flagged() {
        assert!(GenerationError::Auth("bad key".into()).is_auth());
        assert!(GenerationError::MissingCredential.is_auth());
        assert!(!GenerationError::Timeout(30).is_auth());
        assert!(!GenerationError::Http {
            status: 500,
            body: String::new()
        }
        .is_auth());
    }
}
