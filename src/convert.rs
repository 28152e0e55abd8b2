//! One-shot conversion entry points.
//!
//! Each call builds an [`Orchestrator`] from the configuration, runs a single
//! request and returns the output. Hold an [`Orchestrator`] yourself when you
//! need to observe status, cancel, or submit several PDFs in turn.

use crate::config::{CloudConfig, ConversionConfig};
use crate::error::Pdf2LatexError;
use crate::orchestrator::Orchestrator;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::input;
use crate::request::{ConversionRequest, PdfPayload};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Convert a PDF file or URL to LaTeX.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str`: Local file path or HTTP/HTTPS URL to a PDF
/// * `cloud`: Image hosting configuration for the request
/// * `config`: Conversion configuration
///
/// # Errors
/// Intake errors (not found, not a PDF, download failure) before anything
/// runs, then whatever the request failed with.
pub async fn convert(
    input_str: impl AsRef<str>,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2LatexError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let payload = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run(payload, cloud, config).await
}

/// Convert PDF bytes already in memory.
///
/// The MIME type is taken from the leading bytes, so anything that does not
/// start with `%PDF` is rejected as [`Pdf2LatexError::Validation`].
pub async fn convert_bytes(
    name: impl Into<String>,
    bytes: impl Into<Vec<u8>>,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2LatexError> {
    let bytes = bytes.into();
    let mime = input::sniff_mime(&bytes);
    let payload = input::accept_upload(name, mime, bytes)?;
    run(payload, cloud, config).await
}

/// Convert a PDF and write the LaTeX directly to a file.
///
/// The LaTeX goes to a temporary file in the destination directory which is
/// then persisted over `output_path`, so readers never see a partial file.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2LatexError> {
    let output = convert(input_str, cloud, config).await?;
    write_latex(output_path, &output.latex).await?;
    Ok(output.stats)
}

/// Atomically write `latex` to `path`, creating parent directories.
///
/// The text goes to a temporary file in the destination directory which is
/// then persisted over `path`.
pub async fn write_latex(path: impl AsRef<Path>, latex: &str) -> Result<(), Pdf2LatexError> {
    let path = path.as_ref().to_path_buf();
    let write_err = |source: std::io::Error| Pdf2LatexError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await.map_err(write_err)?;

    let latex = latex.to_owned();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(latex.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Pdf2LatexError::Internal(format!("write task failed: {e}")))?
    .map_err(write_err)?;

    debug!("Wrote LaTeX to {}", path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
/// Do not call from within an existing tokio runtime.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2LatexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2LatexError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, cloud, config))
}

async fn run(
    payload: PdfPayload,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2LatexError> {
    let orchestrator = Orchestrator::from_config(config)?;
    orchestrator
        .submit(ConversionRequest::new(payload, cloud))
        .await
}
