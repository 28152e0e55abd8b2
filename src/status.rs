//! The conversion status state machine.
//!
//! ```text
//! Idle ─▶ ReadingInput ─┬──────────────────────────────────────┬─▶ GeneratingOutput ─┬─▶ Completed
//!                       └─▶ ExtractingAssets ─▶ UploadingAssets ┘                     └─▶ Failed
//! ```
//!
//! Every running step may also move to `Failed`. `Completed` and `Failed` are
//! terminal until the next request resets the machine to `Idle`. Callers never
//! write a status directly; they ask for a transition and get an error back
//! when the move is not allowed.

use crate::error::Pdf2LatexError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a conversion currently is. Exactly one value is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Nothing running; ready to accept a request.
    #[default]
    Idle,
    /// Materialising the PDF bytes into base64.
    ReadingInput,
    /// Placeholder for asset extraction (cloud provider selected only).
    ExtractingAssets,
    /// Placeholder for asset upload (cloud provider selected only).
    UploadingAssets,
    /// Waiting on the generation service.
    GeneratingOutput,
    /// LaTeX is available.
    Completed,
    /// The request failed; a failure descriptor is available.
    Failed,
}

impl ProcessingStatus {
    /// `true` while a request is in flight.
    pub fn is_busy(self) -> bool {
        !matches!(
            self,
            ProcessingStatus::Idle | ProcessingStatus::Completed | ProcessingStatus::Failed
        )
    }

    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (Idle | Completed | Failed, Idle) => true,
            (Idle, ReadingInput) => true,
            (ReadingInput, ExtractingAssets | GeneratingOutput) => true,
            (ExtractingAssets, UploadingAssets) => true,
            (UploadingAssets, GeneratingOutput) => true,
            (GeneratingOutput, Completed) => true,
            (s, Failed) => s.is_busy(),
            _ => false,
        }
    }

    /// Move to `next`, or explain why that is not allowed.
    pub fn transition(self, next: ProcessingStatus) -> Result<ProcessingStatus, Pdf2LatexError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Pdf2LatexError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Default progress message shown when the step starts.
    pub fn progress_message(self) -> &'static str {
        match self {
            ProcessingStatus::Idle => "Waiting for a PDF",
            ProcessingStatus::ReadingInput => "Reading PDF file...",
            ProcessingStatus::ExtractingAssets => "Analyzing PDF for images and diagrams...",
            ProcessingStatus::UploadingAssets => "Uploading images...",
            ProcessingStatus::GeneratingOutput => {
                "Generating LaTeX (this may take a moment)..."
            }
            ProcessingStatus::Completed => "LaTeX generated",
            ProcessingStatus::Failed => "Conversion failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStatus::Idle => "Idle",
            ProcessingStatus::ReadingInput => "Reading input",
            ProcessingStatus::ExtractingAssets => "Extracting assets",
            ProcessingStatus::UploadingAssets => "Uploading assets",
            ProcessingStatus::GeneratingOutput => "Generating output",
            ProcessingStatus::Completed => "Completed",
            ProcessingStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}
