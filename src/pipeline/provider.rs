//! Backend over any `edgequake_llm` provider, and backend selection.
//!
//! The PDF travels as a base64 attachment on the user message with MIME
//! type `application/pdf`; the instructions go in the system message.
//! Whether a given provider accepts PDF attachments is up to that provider.

use crate::config::ConversionConfig;
use crate::error::{BackendError, Pdf2LatexError};
use crate::pipeline::gemini::GeminiBackend;
use crate::pipeline::generate::{Credential, GenerationBackend, GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Wraps a configured [`LLMProvider`].
///
/// The provider was built with its own key and model, so `request.model`
/// and the credential are not forwarded; the client's credential gate still
/// runs before every call.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Instantiate a named provider through [`ProviderFactory`].
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, Pdf2LatexError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            Pdf2LatexError::InvalidConfig(format!(
                "LLM provider '{provider_name}' is not configured: {e}"
            ))
        })?;
        Ok(Self::new(provider, provider_name))
    }
}

#[async_trait]
impl GenerationBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        _credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        let messages = vec![
            ChatMessage::system(request.instructions.as_str()),
            ChatMessage::user_with_images(
                "",
                vec![ImageData::new(
                    request.payload.data.clone(),
                    request.payload.mime_type,
                )],
            ),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(BackendError::from)?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(GenerationResponse {
            text: response.content,
            input_tokens: Some(response.prompt_tokens as u64),
            output_tokens: Some(response.completion_tokens as u64),
        })
    }
}

/// Default model for a named provider when none is configured.
pub fn default_model_for(provider_name: &str) -> &'static str {
    match provider_name {
        "openai" | "azure" => "gpt-4.1",
        "anthropic" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        _ => crate::config::DEFAULT_MODEL,
    }
}

/// Stand-in credential for a pre-built provider, which holds its own key.
const PROVIDER_HELD_KEY: &str = "provider-held";

/// The credential the generation client checks before every call.
///
/// An explicit `config.api_key` wins. Otherwise a pre-built
/// `config.provider` counts as configured, since it was constructed with its
/// own key. Anything else has no credential.
pub fn resolve_credential(config: &ConversionConfig) -> Option<Credential> {
    config
        .api_key
        .clone()
        .and_then(Credential::new)
        .or_else(|| config.provider.as_ref().and_then(|_| Credential::new(PROVIDER_HELD_KEY)))
}

/// Pick the backend for a configuration, from most- to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) through [`ProviderFactory`],
///    with `config.model` or [`default_model_for`] the name.
/// 3. **Gemini REST** otherwise, which accepts the PDF natively.
pub fn resolve_backend(config: &ConversionConfig) -> Result<Arc<dyn GenerationBackend>, Pdf2LatexError> {
    if let Some(ref provider) = config.provider {
        let label = config.provider_name.as_deref().unwrap_or("custom");
        return Ok(Arc::new(ProviderBackend::new(Arc::clone(provider), label)));
    }

    if let Some(ref name) = config.provider_name {
        if name != "gemini" {
            let model = config
                .model
                .as_deref()
                .unwrap_or_else(|| default_model_for(name));
            return Ok(Arc::new(ProviderBackend::from_name(name, model)?));
        }
    }

    Ok(Arc::new(GeminiBackend::new()))
}
