//! Gemini REST backend.
//!
//! Gemini accepts a PDF natively as an inline document part, so the whole
//! file goes up in one `generateContent` call next to the instructions. The
//! credential is sent in the `x-goog-api-key` header, never in the URL.

use crate::error::BackendError;
use crate::pipeline::generate::{Credential, GenerationBackend, GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default Gemini API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Failures specific to the Gemini transport.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("prompt blocked by Gemini: {0}")]
    Blocked(String),

    #[error("answer cut off at the output token limit; raise max_tokens")]
    Truncated,
}

/// Calls `models/{model}:generateContent` with the PDF inline.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
}

impl Default for GeminiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the backend at another API root (proxy, regional endpoint).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        let body = GenerateContentRequest::from_request(request);

        debug!(
            provider = "gemini",
            model = %request.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Invoking Gemini generateContent"
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(GeminiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeminiError::Http {
                status: status.as_u16(),
                message: error_message(&text),
            }
            .into());
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(GeminiError::from)?;
        Ok(parsed.into_generation_response()?)
    }
}

/// Pull `error.message` out of a Gemini error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.payload.mime_type.to_string(),
                            data: request.payload.data.clone(),
                        },
                    },
                    Part::Text {
                        text: request.instructions.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: InlineData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    fn into_generation_response(self) -> Result<GenerationResponse, GeminiError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GeminiError::Blocked(reason));
        }
        // Only the first candidate is requested.
        let candidate = self.candidates.into_iter().next();
        match candidate.as_ref().and_then(|c| c.finish_reason.as_deref()) {
            None | Some("STOP") => {}
            Some("MAX_TOKENS") => return Err(GeminiError::Truncated),
            Some(reason) => warn!(finish_reason = reason, "Gemini stopped early"),
        }
        let text = candidate
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(GenerationResponse {
            text,
            input_tokens: self.usage_metadata.as_ref().and_then(|u| u.prompt_token_count),
            output_tokens: self.usage_metadata.as_ref().and_then(|u| u.candidates_token_count),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::EncodedPayload;

    fn request() -> GenerationRequest {
        GenerationRequest {
            payload: EncodedPayload {
                data: "JVBERi0=".into(),
                mime_type: "application/pdf",
                byte_len: 5,
            },
            instructions: "Convert to LaTeX".into(),
            model: "gemini-3-pro-preview".into(),
            temperature: 0.1,
            max_tokens: 1024,
        }
    }

    #[test]
    fn endpoint_joins_model() {
        let b = GeminiBackend::with_base_url("https://proxy.test/v1beta/");
        assert_eq!(
            b.endpoint("gemini-2.5-pro"),
            "https://proxy.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn request_body_has_pdf_part_then_text() {
        let body = serde_json::to_value(GenerateContentRequest::from_request(&request())).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0=");
        assert_eq!(parts[1]["text"], "Convert to LaTeX");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn response_text_and_usage() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "\\documentclass"}, {"text": "{article}"}]}}],
            "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 800}
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let r = parsed.into_generation_response().unwrap();
        assert_eq!(r.text, "\\documentclass{article}");
        assert_eq!(r.input_tokens, Some(1200));
        assert_eq!(r.output_tokens, Some(800));
    }

    #[test]
    fn token_limit_cut_off_is_an_error() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "\\documentclass{article}\n\\begin{doc"}]}, "finishReason": "MAX_TOKENS"}]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = parsed.into_generation_response().unwrap_err();
        assert!(matches!(err, GeminiError::Truncated));
    }

    #[test]
    fn normal_stop_keeps_text() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "STOP"}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_generation_response().unwrap().text, "ok");
    }

    #[test]
    fn response_without_candidates_is_empty_text() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.into_generation_response().unwrap().text, "");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = parsed.into_generation_response().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn error_message_prefers_json_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "API key not valid");
        assert_eq!(error_message("  upstream down "), "upstream down");
    }
}
