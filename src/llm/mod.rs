//! Language Model Provider - Unified Interface for Sim and Production
//!
//! `TigerStyle`: Simulation-first LLM abstraction.
//!
//! # Architecture
//!
//! ```text
//! LanguageModelProvider (trait)
//! └── SimLanguageModel    (always available, deterministic)
//! ```
//!
//! The recommendation engine treats the model as a black box: prompt in,
//! text out. Provider internals (API keys, endpoints, token accounting)
//! never leak past this module.

mod sim;

pub use sim::SimLanguageModel;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::constants::{LLM_PROMPT_BYTES_MAX, LLM_RESPONSE_BYTES_MAX};

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all language model providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Rate limit exceeded
    #[error("rate limit exceeded, retry after {retry_after_secs:?}s")]
    RateLimit {
        /// Seconds until the limit resets, if known
        retry_after_secs: Option<u64>,
    },

    /// Invalid response from the provider
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was invalid
        message: String,
    },

    /// Service unavailable
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("json error: {message}")]
    Json {
        /// Parse failure detail
        message: String,
    },

    /// Invalid request parameters
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was invalid
        message: String,
    },
}

impl ProviderError {
    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a service unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create a JSON error.
    #[must_use]
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether retrying could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimit { .. } | Self::ServiceUnavailable { .. }
        )
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Request for a model completion.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// The prompt text (required)
    pub prompt: String,
    /// Optional system message
    pub system: Option<String>,
    /// Whether to request JSON output
    pub json_mode: bool,
}

impl PromptRequest {
    /// Create a request with just a prompt.
    ///
    /// # Panics
    /// Panics if the prompt is empty or exceeds `LLM_PROMPT_BYTES_MAX`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();

        assert!(!prompt.is_empty(), "prompt must not be empty");
        assert!(
            prompt.len() <= LLM_PROMPT_BYTES_MAX,
            "prompt exceeds {LLM_PROMPT_BYTES_MAX} bytes"
        );

        Self {
            prompt,
            system: None,
            json_mode: false,
        }
    }

    /// Set the system message.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request structured JSON output.
    #[must_use]
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Trait for language model providers.
///
/// Higher-level components work against this trait without knowing the
/// concrete provider.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    /// Complete a prompt with a text response.
    ///
    /// # Errors
    /// Returns `ProviderError` on failure.
    async fn complete(&self, request: &PromptRequest) -> Result<String, ProviderError>;

    /// Complete a prompt expecting a JSON response.
    ///
    /// # Errors
    /// Returns `ProviderError` on failure or JSON parse error.
    async fn complete_json<T: DeserializeOwned + Send>(
        &self,
        request: &PromptRequest,
    ) -> Result<T, ProviderError> {
        let response = self.complete(request).await?;

        debug_assert!(
            response.len() <= LLM_RESPONSE_BYTES_MAX,
            "response exceeds limit"
        );

        serde_json::from_str(&response).map_err(|e| ProviderError::json(e.to_string()))
    }

    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Whether this is a simulation provider.
    fn is_simulation(&self) -> bool;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request_new() {
        let request = PromptRequest::new("Suggest some tracks");
        assert_eq!(request.prompt, "Suggest some tracks");
        assert!(request.system.is_none());
        assert!(!request.json_mode);
    }

    #[test]
    fn test_prompt_request_builder() {
        let request = PromptRequest::new("Suggest tracks")
            .with_system("You are a music curator")
            .with_json_mode();

        assert_eq!(request.system, Some("You are a music curator".into()));
        assert!(request.json_mode);
    }

    #[test]
    #[should_panic(expected = "prompt must not be empty")]
    fn test_empty_prompt_rejected() {
        let _ = PromptRequest::new("");
    }

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::service_unavailable("down").is_retryable());
        assert!(!ProviderError::json("parse failed").is_retryable());
        assert!(!ProviderError::invalid_request("bad").is_retryable());
    }
}
