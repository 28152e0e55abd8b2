//! Pipeline stages for PDF-to-LaTeX conversion.
//!
//! Each submodule implements one step; the [`crate::orchestrator`] drives
//! them in order and owns the status machine.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ [assets] ──▶ generate ──▶ postprocess
//! (upload/   (base64)   (cloud      (model)       (fences,
//!  path/URL)             only)                     whitespace)
//! ```
//!
//! 1. [`input`] : intake; the only place a MIME type is checked
//! 2. [`encode`]: read the PDF and base64-wrap it for the request body
//! 3. [`assets`]: figure extraction and upload seams, placeholders by default
//! 4. [`generate`]: the generation client; the only stage with network I/O,
//!    through a [`generate::GenerationBackend`]: [`gemini`] or [`provider`]
//! 5. [`postprocess`]: strip code fences and normalise the LaTeX text

pub mod assets;
pub mod encode;
pub mod gemini;
pub mod generate;
pub mod input;
pub mod postprocess;
pub mod provider;
