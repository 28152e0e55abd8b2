//! Error types for the edgequake-pdf2latex library.
//!
//! Two types cover two audiences:
//!
//! * [`Pdf2LatexError`]: the rich error returned from every fallible call.
//!   Variants carry paths, URLs and the wrapped upstream error so callers can
//!   print a useful diagnostic.
//!
//! * [`ErrorKind`]: a data-free, serialisable classification of the same
//!   failures. It is what the orchestrator stores in a
//!   [`crate::output::FailureDescriptor`] once a request has failed, so the
//!   presentation layer can branch on the kind without holding the error.

use crate::status::ProcessingStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a generation backend or an asset step.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors returned by the edgequake-pdf2latex library.
#[derive(Debug, Error)]
pub enum Pdf2LatexError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The input is not a PDF; rejected before any request is created.
    #[error("Please upload a valid PDF file: '{name}' has type '{mime_type}'")]
    Validation { name: String, mime_type: String },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The payload could not be prepared for transfer.
    #[error("Could not read the PDF payload: {detail}")]
    Encoding { detail: String },

    /// No access credential was configured for the generation service.
    #[error("No API key configured for '{backend}'.\nSet it with --api-key or PDF2LATEX_API_KEY.")]
    MissingCredential { backend: String },

    /// The generation service or the transport to it failed.
    #[error("Generation service '{backend}' failed: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: BackendError,
    },

    /// The generation service answered with no usable text.
    #[error("Generation service '{backend}' returned no LaTeX")]
    EmptyResponse { backend: String },

    /// The generation call exceeded its deadline.
    #[error("Generation timed out after {timeout_ms}ms\nIncrease --api-timeout.")]
    Timeout { timeout_ms: u64 },

    /// The conversion was cancelled by the caller.
    #[error("Conversion cancelled during {step}")]
    Cancelled { step: ProcessingStatus },

    /// An asset placeholder step failed.
    #[error("{step} failed: {source}")]
    Asset {
        step: ProcessingStatus,
        #[source]
        source: BackendError,
    },

    // ── State machine errors ──────────────────────────────────────────────
    /// A conversion is already running on this orchestrator.
    #[error("A conversion is already in progress ({status})")]
    Busy { status: ProcessingStatus },

    /// A status change that the state machine does not allow.
    #[error("Invalid status transition: {from} → {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output `.tex` file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2LatexError {
    /// Classify this error for a [`crate::output::FailureDescriptor`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2LatexError::Validation { .. } => ErrorKind::Validation,
            Pdf2LatexError::FileNotFound { .. }
            | Pdf2LatexError::PermissionDenied { .. }
            | Pdf2LatexError::DownloadFailed { .. }
            | Pdf2LatexError::DownloadTimeout { .. } => ErrorKind::Input,
            Pdf2LatexError::Encoding { .. } => ErrorKind::Encoding,
            Pdf2LatexError::MissingCredential { .. } => ErrorKind::MissingCredential,
            Pdf2LatexError::Upstream { .. } => ErrorKind::Upstream,
            Pdf2LatexError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
            Pdf2LatexError::Timeout { .. } => ErrorKind::Timeout,
            Pdf2LatexError::Cancelled { .. } => ErrorKind::Cancelled,
            Pdf2LatexError::Asset { .. } => ErrorKind::Asset,
            Pdf2LatexError::Busy { .. } => ErrorKind::Busy,
            Pdf2LatexError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Pdf2LatexError::OutputWriteFailed { .. } => ErrorKind::Output,
            Pdf2LatexError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Pdf2LatexError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Data-free classification of a [`Pdf2LatexError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Input,
    Encoding,
    MissingCredential,
    Upstream,
    EmptyResponse,
    Timeout,
    Cancelled,
    Asset,
    Busy,
    InvalidTransition,
    Output,
    InvalidConfig,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Input => "input",
            ErrorKind::Encoding => "encoding",
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::Upstream => "upstream",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Asset => "asset",
            ErrorKind::Busy => "busy",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Output => "output",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
