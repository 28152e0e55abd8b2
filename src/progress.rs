//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe a
//! conversion as it moves through its steps. Events are advisory: nothing the
//! callback does can change whether a conversion succeeds.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2latex::{ConversionConfig, ConversionProgressCallback, ProcessingStatus};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_progress(&self, message: &str) {
//!         eprintln!("… {message}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Pdf2LatexError;
use crate::status::ProcessingStatus;
use std::sync::Arc;

/// Called by the orchestrator as a conversion advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called after every accepted status transition.
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        let _ = (from, to);
    }

    /// Human-readable message for the step that just started.
    fn on_progress(&self, message: &str) {
        let _ = message;
    }

    /// Called once with the final LaTeX length when the request completes.
    fn on_complete(&self, latex_len: usize) {
        let _ = latex_len;
    }

    /// Called once when the request fails at `step`.
    fn on_failure(&self, step: ProcessingStatus, error: &Pdf2LatexError) {
        let _ = (step, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
