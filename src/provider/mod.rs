//! The remote text-generation boundary.
//!
//! Everything the rest of the crate knows about the provider is the
//! [`TextGenerator`] trait: one request in, text plus token counts out.
//! The concrete HTTP client lives in [`http`] and is feature-gated, so the
//! core engine can be driven entirely by an in-process mock in tests.

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single request to the remote generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Fixed system instruction (the capability's template).
    pub system: String,
    /// Serialized user payload plus the structured-output directive.
    pub user: String,
    /// Model identifier, fixed per registry.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token ceiling.
    pub max_output_tokens: u32,
}

/// What comes back from a successful generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The raw textual payload. May be fenced, prefixed with prose, or
    /// otherwise loosely formatted; extraction happens upstream.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub input_tokens: u32,
    /// Tokens consumed by the completion.
    pub output_tokens: u32,
}

impl GenerationResponse {
    /// Total tokens metered for this call.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A provider API key, resolved per tenant and held only for the duration of
/// one invocation.
///
/// The inner value is deliberately unreachable from `Debug`/`Display` so a
/// stray log line can never leak a tenant's key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Credential(key.into())
    }

    /// The raw key, for building the outgoing request only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The distinguishable ways a provider call can fail.
///
/// Configuration problems (unknown capability, missing credential) are not
/// represented here; they are caught before any request is built.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The black-box RPC every capability invocation goes through.
///
/// Implementations must not retry internally; retry policy belongs to the
/// orchestrator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, ProviderError>;
}
