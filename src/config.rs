//! Configuration types for PDF-to-LaTeX conversion.
//!
//! Two structs, two owners:
//!
//! * [`CloudConfig`] is what the user picks in the settings panel: which
//!   cloud host the figures live on and the public URL prefix they are served
//!   from. It travels with every [`crate::request::ConversionRequest`].
//! * [`ConversionConfig`] holds the knobs of the conversion itself (model,
//!   sampling, timeouts, placeholder durations). It is built via
//!   [`ConversionConfigBuilder`] and shared by every request an
//!   [`crate::orchestrator::Orchestrator`] runs.

use crate::error::Pdf2LatexError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default Gemini model used when no model is configured.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Duration of each placeholder asset step.
pub const DEFAULT_PLACEHOLDER_DELAY_MS: u64 = 1500;

/// Where extracted figures are hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    /// No cloud upload: diagrams become TikZ or placeholder comments.
    #[default]
    None,
    /// Google Drive.
    #[serde(rename = "gdrive")]
    GoogleDrive,
    /// Microsoft OneDrive.
    #[serde(rename = "onedrive")]
    OneDrive,
}

impl CloudProvider {
    /// Human-readable name for progress messages.
    pub fn display_name(self) -> &'static str {
        match self {
            CloudProvider::None => "no cloud",
            CloudProvider::GoogleDrive => "Google Drive",
            CloudProvider::OneDrive => "OneDrive",
        }
    }
}

/// User-chosen cloud hosting for extracted figures.
///
/// The orchestrator reads only `provider` and `public_url_prefix`;
/// `auto_upload` is carried for the settings collaborator. Serialises with
/// snake_case names and also reads the camelCase names browser settings use
/// (`publicUrlPrefix`, `autoUpload`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub provider: CloudProvider,
    #[serde(default, alias = "publicUrlPrefix")]
    pub public_url_prefix: String,
    #[serde(default, alias = "autoUpload")]
    pub auto_upload: bool,
}

impl CloudConfig {
    pub fn new(provider: CloudProvider, public_url_prefix: impl Into<String>) -> Self {
        Self {
            provider,
            public_url_prefix: public_url_prefix.into(),
            auto_upload: false,
        }
    }

    /// `true` when the asset placeholder steps should run.
    pub fn uses_cloud(&self) -> bool {
        self.provider != CloudProvider::None
    }

    /// The URL prefix images are rooted at, when one applies.
    ///
    /// Returns `None` for [`CloudProvider::None`] or a blank prefix, and strips
    /// any trailing `/` so callers can always join with a single slash.
    pub fn image_url_prefix(&self) -> Option<&str> {
        if !self.uses_cloud() {
            return None;
        }
        let prefix = self.public_url_prefix.trim().trim_end_matches('/');
        (!prefix.is_empty()).then_some(prefix)
    }
}

/// Configuration for a PDF-to-LaTeX conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2latex::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .model("gemini-2.5-pro")
///     .api_key("AIza...")
///     .api_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    ///
    /// When `None` (and `provider` is `None`) the Gemini REST backend is used,
    /// which accepts the PDF as a native document part.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    ///
    /// The provider carries its own key, so `api_key` may be left unset.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Access credential for the generation service.
    ///
    /// Never read from the environment by the library; the CLI resolves it
    /// from its flags and passes it here.
    pub api_key: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription should be faithful, not creative.
    pub temperature: f32,

    /// Maximum output tokens for the whole document. Default: 32768.
    pub max_tokens: usize,

    /// Custom directives replacing the built-in ones. The image strategy is
    /// always appended.
    pub system_prompt: Option<String>,

    /// Duration of each asset placeholder step in milliseconds. Default: 1500.
    pub placeholder_delay_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Deadline for the generation call in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            api_key: None,
            temperature: 0.1,
            max_tokens: 32768,
            system_prompt: None,
            placeholder_delay_ms: DEFAULT_PLACEHOLDER_DELAY_MS,
            download_timeout_secs: 120,
            api_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("placeholder_delay_ms", &self.placeholder_delay_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn placeholder_delay(&self) -> Duration {
        Duration::from_millis(self.placeholder_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn placeholder_delay_ms(mut self, ms: u64) -> Self {
        self.config.placeholder_delay_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2LatexError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Pdf2LatexError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2LatexError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref key) = c.api_key {
            if key.trim().is_empty() {
                return Err(Pdf2LatexError::InvalidConfig(
                    "API key must not be blank".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.placeholder_delay(), Duration::from_millis(1500));
        assert_eq!(c.api_timeout(), Duration::from_secs(300));
        assert!(c.api_key.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ConversionConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_blank_key() {
        let err = ConversionConfig::builder().api_key("   ").build().unwrap_err();
        assert!(matches!(err, Pdf2LatexError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ConversionConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ConversionConfig::builder().api_key("secret-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-123"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn image_prefix_requires_provider() {
        let cloud = CloudConfig::new(CloudProvider::None, "https://example.com/imgs");
        assert_eq!(cloud.image_url_prefix(), None);
        assert!(!cloud.uses_cloud());
    }

    #[test]
    fn image_prefix_trims_trailing_slash() {
        let cloud = CloudConfig::new(CloudProvider::GoogleDrive, "https://example.com/imgs/");
        assert_eq!(cloud.image_url_prefix(), Some("https://example.com/imgs"));
    }

    #[test]
    fn blank_prefix_is_absent() {
        let cloud = CloudConfig::new(CloudProvider::OneDrive, "  ");
        assert!(cloud.uses_cloud());
        assert_eq!(cloud.image_url_prefix(), None);
    }

    #[test]
    fn cloud_config_wire_names() {
        let cloud: CloudConfig =
            serde_json::from_str(r#"{"provider":"gdrive","public_url_prefix":"https://x"}"#)
                .unwrap();
        assert_eq!(cloud.provider, CloudProvider::GoogleDrive);
        assert!(!cloud.auto_upload);
        let json = serde_json::to_string(&CloudProvider::OneDrive).unwrap();
        assert_eq!(json, "\"onedrive\"");
    }

    #[test]
    fn cloud_config_reads_camel_case_settings() {
        let cloud: CloudConfig = serde_json::from_str(
            r#"{"provider":"onedrive","publicUrlPrefix":"https://cdn.test/figs","autoUpload":true}"#,
        )
        .unwrap();
        assert_eq!(cloud.provider, CloudProvider::OneDrive);
        assert_eq!(cloud.image_url_prefix(), Some("https://cdn.test/figs"));
        assert!(cloud.auto_upload);
    }
}
