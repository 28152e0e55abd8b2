//! The conversion request: one PDF plus its cloud configuration.

use crate::config::CloudConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The only MIME type intake accepts.
pub const PDF_MIME: &str = "application/pdf";

/// Where the PDF bytes come from.
///
/// Local files are only sniffed at intake; the full read happens in the
/// `ReadingInput` step so a file that disappears in between surfaces as an
/// encoding failure of that step.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// Bytes already in memory (upload, download, caller buffer).
    Memory(Arc<[u8]>),
    /// A local file, read when the request runs.
    File(PathBuf),
}

/// A validated PDF handle. Only [`crate::pipeline::input`] creates these.
#[derive(Debug, Clone)]
pub struct PdfPayload {
    name: String,
    source: PayloadSource,
}

impl PdfPayload {
    pub(crate) fn new(name: impl Into<String>, source: PayloadSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// File name shown to the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &'static str {
        PDF_MIME
    }

    pub fn source(&self) -> &PayloadSource {
        &self.source
    }

    /// Path of the backing file, if the payload is file-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            PayloadSource::File(p) => Some(p),
            PayloadSource::Memory(_) => None,
        }
    }
}

/// One user-submitted PDF plus its cloud configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    payload: PdfPayload,
    cloud: CloudConfig,
}

impl ConversionRequest {
    pub fn new(payload: PdfPayload, cloud: CloudConfig) -> Self {
        Self { payload, cloud }
    }

    pub fn payload(&self) -> &PdfPayload {
        &self.payload
    }

    pub fn cloud(&self) -> &CloudConfig {
        &self.cloud
    }
}
