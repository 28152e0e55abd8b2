//! Result types handed to the presentation layer.

use crate::error::ErrorKind;
use crate::pipeline::assets::UploadedAsset;
use crate::status::ProcessingStatus;
use serde::{Deserialize, Serialize};

/// Generated LaTeX plus statistics about the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Normalised LaTeX source. Never empty.
    pub latex: String,
    pub stats: ConversionStats,
}

/// Statistics for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Size of the submitted PDF.
    pub pdf_bytes: usize,
    /// Wall-clock time from submit to completion.
    pub total_duration_ms: u64,
    /// Time spent waiting on the generation service.
    pub generation_duration_ms: u64,
    /// Prompt tokens, when the backend reports them.
    pub input_tokens: Option<u64>,
    /// Completion tokens, when the backend reports them.
    pub output_tokens: Option<u64>,
    /// Every status the request passed through, in order.
    pub steps: Vec<ProcessingStatus>,
    /// Figures published by the upload step.
    pub uploaded_assets: Vec<UploadedAsset>,
}

/// What went wrong, where. Stored once a request has failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    /// The step that was running when the failure happened.
    pub step: ProcessingStatus,
    pub kind: ErrorKind,
    /// Human-readable message for the user.
    pub message: String,
}

/// Final outcome of a request. Only exists once the request is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConversionResult {
    Completed(ConversionOutput),
    Failed(FailureDescriptor),
}

/// Point-in-time view of an orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSnapshot {
    pub status: ProcessingStatus,
    /// Name of the PDF of the current (or last) request.
    pub file_name: Option<String>,
    /// `Some` only when `status` is `Completed` or `Failed`.
    pub result: Option<ConversionResult>,
}

impl ConversionSnapshot {
    /// The LaTeX of a completed request, or `""`.
    pub fn latex(&self) -> &str {
        match &self.result {
            Some(ConversionResult::Completed(out)) => &out.latex,
            _ => "",
        }
    }

    pub fn failure(&self) -> Option<&FailureDescriptor> {
        match &self.result {
            Some(ConversionResult::Failed(f)) => Some(f),
            _ => None,
        }
    }
}
