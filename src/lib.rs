//! # edgequake-pdf2latex
//!
//! Convert a PDF document to compilable LaTeX with a document-understanding
//! model.
//!
//! The whole PDF goes to the model in one request together with typesetting
//! instructions: a full `article` document, the usual packages, display math,
//! `table` environments, and a strategy for figures. When a cloud image host
//! is configured, figures are referenced as `\includegraphics` from its public
//! URL prefix; otherwise the model redraws them in TikZ or leaves a
//! `% [IMAGE_PLACEHOLDER: ...]` comment.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Intake    accept application/pdf only (upload, path or URL)
//!  ├─ 2. Read      base64-encode the payload
//!  ├─ 3. Assets    extract + upload figures (cloud provider only; placeholders)
//!  ├─ 4. Generate  one call to Gemini or any edgequake-llm provider
//!  └─ 5. Polish    strip Markdown fences, normalise whitespace
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2latex::{convert, CloudConfig, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let output = convert("paper.pdf", CloudConfig::default(), &config).await?;
//!     println!("{}", output.latex);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2latex` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2latex = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod status;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CloudConfig, CloudProvider, ConversionConfig, ConversionConfigBuilder, DEFAULT_MODEL,
};
pub use convert::{convert, convert_bytes, convert_sync, convert_to_file, write_latex};
pub use error::{BackendError, ErrorKind, Pdf2LatexError};
pub use orchestrator::{CancelHandle, Orchestrator};
pub use output::{
    ConversionOutput, ConversionResult, ConversionSnapshot, ConversionStats, FailureDescriptor,
};
pub use pipeline::assets::{AssetExtractor, AssetUploader, ExtractedAsset, UploadedAsset};
pub use pipeline::generate::{
    Credential, GenerationBackend, GenerationClient, GenerationRequest, GenerationResponse,
};
pub use pipeline::input::{accept_upload, resolve_input};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{ConversionRequest, PdfPayload};
pub use status::ProcessingStatus;
pub use stream::{convert_stream, ConversionEvent, EventStream};
