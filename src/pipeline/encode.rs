//! Payload encoding: PDF bytes → base64 for the generation request body.
//!
//! Generation APIs accept documents as base64 inline data embedded in the JSON
//! request. This is the `ReadingInput` step: file-backed payloads are read in
//! full here, so every I/O failure on the input surfaces as
//! [`Pdf2LatexError::Encoding`].

use crate::error::Pdf2LatexError;
use crate::request::{PayloadSource, PdfPayload};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// A payload ready to travel inside a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Base64 (standard alphabet, padded).
    pub data: String,
    pub mime_type: &'static str,
    /// Size of the raw PDF in bytes.
    pub byte_len: usize,
}

/// Read and base64-encode the PDF.
pub async fn encode_payload(payload: &PdfPayload) -> Result<EncodedPayload, Pdf2LatexError> {
    let bytes: Vec<u8> = match payload.source() {
        PayloadSource::Memory(b) => b.to_vec(),
        PayloadSource::File(path) => {
            tokio::fs::read(path)
                .await
                .map_err(|e| Pdf2LatexError::Encoding {
                    detail: format!("{}: {}", path.display(), e),
                })?
        }
    };
    encode_bytes(payload.mime_type(), &bytes)
}

fn encode_bytes(mime_type: &'static str, bytes: &[u8]) -> Result<EncodedPayload, Pdf2LatexError> {
    if bytes.is_empty() {
        return Err(Pdf2LatexError::Encoding {
            detail: "the file is empty".into(),
        });
    }
    let data = STANDARD.encode(bytes);
    debug!("Encoded PDF {} bytes → {} bytes base64", bytes.len(), data.len());
    Ok(EncodedPayload {
        data,
        mime_type,
        byte_len: bytes.len(),
    })
}
