//! Gemini-backed [`TextGenerator`] over HTTP.
//!
//! This is the one place the crate speaks a concrete wire protocol. The
//! request/response shapes follow the `generateContent` API; token counts come
//! from the usage metadata block.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::{
    Credential, GenerationRequest, GenerationResponse, ProviderError, TextGenerator,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP client for the Gemini generate-content endpoint.
///
/// The API key is *not* part of the client; it arrives per call as a
/// [`Credential`], so one client instance can serve every tenant.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiGenerator {
    /// Create a client against the public Gemini endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        GeminiGenerator {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for GeminiGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl GeminiContent {
    fn user(text: impl Into<String>) -> Self {
        GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart { text: Some(text.into()) }],
        }
    }

    fn system(text: impl Into<String>) -> Self {
        // System instructions carry no role
        GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: Some(text.into()) }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Map an HTTP status to the error taxonomy the orchestrator understands.
fn classify_status(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(body),
        429 => ProviderError::RateLimited(body),
        503 | 529 => ProviderError::Overloaded(body),
        _ => ProviderError::Provider(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            request.model,
            credential.expose()
        );

        let payload = GeminiRequest {
            contents: vec![GeminiContent::user(request.user)],
            system_instruction: GeminiContent::system(request.system),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("no text in response".to_string()))?;

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(GenerationResponse { text, input_tokens, output_tokens })
    }
}
