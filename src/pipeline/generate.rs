//! The generation client: one request to the model, one LaTeX answer back.
//!
//! The client owns everything around the network call: instruction
//! assembly ([`crate::prompts`]), the credential gate, the deadline, error
//! mapping and response normalisation ([`super::postprocess`]). The call
//! itself goes through a [`GenerationBackend`], so the transport can be
//! Gemini's REST API, any `edgequake_llm` provider, or a test fake.
//!
//! No retries: a failed generation ends the request and the user resubmits.

use crate::config::{CloudConfig, ConversionConfig};
use crate::error::{BackendError, Pdf2LatexError};
use crate::pipeline::encode::EncodedPayload;
use crate::pipeline::postprocess::clean_latex;
use crate::prompts::build_instructions;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Access credential for the generation service. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key; blank keys count as no key.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key.trim().to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub payload: EncodedPayload,
    pub instructions: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw backend answer, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Transport to a document-understanding model.
///
/// Implementations perform exactly one network call per `generate` and do
/// not retry.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError>;
}

/// Normalised LaTeX plus call statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub latex: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: u64,
}

/// Builds the request, gates on the credential and normalises the answer.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    credential: Option<Credential>,
    model: String,
    temperature: f32,
    max_tokens: usize,
    system_prompt: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationClient")
            .field("backend", &self.backend.name())
            .field("credential", &self.credential)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenerationClient {
    /// Client with default model, sampling and deadline.
    pub fn new(backend: Arc<dyn GenerationBackend>, credential: Option<Credential>) -> Self {
        Self::from_config(backend, credential, &ConversionConfig::default())
    }

    /// Client taking model, sampling, prompt override and deadline from `config`.
    pub fn from_config(
        backend: Arc<dyn GenerationBackend>,
        credential: Option<Credential>,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            backend,
            credential,
            model: config.model_or_default().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            timeout: config.api_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The instruction text that would be sent for `cloud`.
    pub fn instructions_for(&self, cloud: &CloudConfig) -> String {
        build_instructions(cloud, self.system_prompt.as_deref())
    }

    /// Send the PDF with instructions and return normalised LaTeX.
    ///
    /// # Errors
    /// - [`Pdf2LatexError::MissingCredential`] before any network attempt
    /// - [`Pdf2LatexError::Timeout`] when the deadline passes
    /// - [`Pdf2LatexError::Upstream`] for any backend failure
    /// - [`Pdf2LatexError::EmptyResponse`] when no LaTeX remains after cleanup
    pub async fn generate(
        &self,
        payload: EncodedPayload,
        cloud: &CloudConfig,
    ) -> Result<Generated, Pdf2LatexError> {
        let backend = self.backend.name().to_string();
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| Pdf2LatexError::MissingCredential {
                backend: backend.clone(),
            })?;

        let request = GenerationRequest {
            payload,
            instructions: self.instructions_for(cloud),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            backend = %backend,
            model = %request.model,
            pdf_bytes = request.payload.byte_len,
            "Sending PDF to generation service"
        );

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.backend.generate(credential, &request))
            .await
            .map_err(|_| {
                warn!("Generation timed out after {:?}", self.timeout);
                Pdf2LatexError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            })?
            .map_err(|source| {
                warn!("Generation service '{}' failed: {}", backend, source);
                Pdf2LatexError::Upstream {
                    backend: backend.clone(),
                    source,
                }
            })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if response.text.trim().is_empty() {
            return Err(Pdf2LatexError::EmptyResponse { backend });
        }
        let latex = clean_latex(&response.text);
        if latex.is_empty() {
            return Err(Pdf2LatexError::EmptyResponse { backend });
        }

        debug!(
            "Generated {} chars of LaTeX in {}ms ({:?} in / {:?} out tokens)",
            latex.len(),
            duration_ms,
            response.input_tokens,
            response.output_tokens
        );

        Ok(Generated {
            latex,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            duration_ms,
        })
    }
}
