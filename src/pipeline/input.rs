//! File intake: turn an upload, a local path or a URL into a [`PdfPayload`].
//!
//! Intake is the only place a MIME type is checked. Anything that is not
//! `application/pdf` is rejected here with [`Pdf2LatexError::Validation`],
//! before a [`crate::request::ConversionRequest`] can exist.
//!
//! Local files are sniffed (first bytes) but not read in full; the
//! orchestrator's `ReadingInput` step does the full read.

use crate::error::Pdf2LatexError;
use crate::request::{PayloadSource, PdfPayload, PDF_MIME};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Best-effort MIME type from the leading bytes of a file.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        PDF_MIME
    } else if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else if bytes.starts_with(b"\xFF\xD8\xFF") {
        "image/jpeg"
    } else if bytes.starts_with(b"PK\x03\x04") {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

/// Accept an uploaded file whose MIME type was declared by the caller.
///
/// The declared type is trusted, as a browser's `File.type` would be; the
/// bytes are not inspected.
pub fn accept_upload(
    name: impl Into<String>,
    declared_mime: &str,
    bytes: impl Into<Arc<[u8]>>,
) -> Result<PdfPayload, Pdf2LatexError> {
    let name = name.into();
    let mime = declared_mime.trim().to_ascii_lowercase();
    if mime != PDF_MIME {
        return Err(Pdf2LatexError::Validation {
            name,
            mime_type: declared_mime.to_string(),
        });
    }
    Ok(PdfPayload::new(name, PayloadSource::Memory(bytes.into())))
}

/// Resolve the input string to a validated PDF payload.
///
/// If the input is a URL, download it into memory.
/// If the input is a local file, validate it exists, is readable and is a PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfPayload, Pdf2LatexError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Validate a local file by its magic bytes, falling back to the extension
/// when the file is too short to sniff.
fn resolve_local(path: &Path) -> Result<PdfPayload, Pdf2LatexError> {
    let path: PathBuf = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2LatexError::FileNotFound { path });
    }

    let mut f = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2LatexError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2LatexError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    let mime = match f.read_exact(&mut magic) {
        Ok(()) => sniff_mime(&magic),
        Err(_) if has_pdf_extension(&path) => PDF_MIME,
        Err(_) => "application/octet-stream",
    };

    let name = file_name(&path);
    if mime != PDF_MIME {
        return Err(Pdf2LatexError::Validation {
            name,
            mime_type: mime.to_string(),
        });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(PdfPayload::new(name, PayloadSource::File(path)))
}

/// Download a URL into memory and validate it.
async fn download_url(url: &str, timeout_secs: u64) -> Result<PdfPayload, Pdf2LatexError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2LatexError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2LatexError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2LatexError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    let mime = if bytes.len() >= 4 {
        sniff_mime(&bytes).to_string()
    } else {
        declared.unwrap_or_else(|| "application/octet-stream".to_string())
    };

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    accept_upload(name, &mime, bytes.to_vec())
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
