//! Document text extraction: file path -> chunked text.
//!
//! PDFs go through `pdf-extract`; anything else is read as UTF-8 text.

use super::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, FailureKind,
    ProviderFailure,
};
use crate::config::DocumentsConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const NAME: &str = "document_text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentText {
    pub path: PathBuf,
    /// Whole extracted text, trimmed.
    pub text: String,
    /// Overlapping windows over `text`.
    pub chunks: Vec<String>,
}

pub struct DocumentTextProvider {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentTextProvider {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn from_config(config: &DocumentsConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Extract and chunk a document. Blocking; call from a blocking context.
    pub fn extract(&self, path: &Path) -> Result<DocumentText, ProviderFailure> {
        if !path.is_file() {
            return Err(ProviderFailure::new(
                NAME,
                FailureKind::NotFound,
                format!("no such file: {}", path.display()),
            ));
        }

        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        let text = if is_pdf {
            pdf_text(path)?
        } else {
            std::fs::read_to_string(path).map_err(|e| {
                ProviderFailure::new(
                    NAME,
                    FailureKind::InvalidRequest,
                    format!("failed to read {}: {}", path.display(), e),
                )
            })?
        };

        let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap);
        debug!(path = %path.display(), chunks = chunks.len(), "Extracted document text");
        Ok(DocumentText {
            path: path.to_path_buf(),
            text: text.trim().to_string(),
            chunks,
        })
    }
}

/// pdf-extract panics on some malformed files; a panic is reported as an
/// unreadable document.
fn pdf_text(path: &Path) -> Result<String, ProviderFailure> {
    let unreadable = |detail: String| {
        ProviderFailure::new(
            NAME,
            FailureKind::InvalidRequest,
            format!("failed to extract PDF text from {}: {}", path.display(), detail),
        )
    };
    match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(unreadable(e.to_string())),
        Err(_) => Err(unreadable("PDF parser aborted".to_string())),
    }
}

/// Split text into windows of at most `size` characters with `overlap`
/// characters repeated between consecutive windows. Windows end on whitespace
/// when one is available past the overlap.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let size = size.max(1);
    let overlap = overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            if let Some(ws) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if ws > overlap {
                    end = start + ws;
                }
            }
        }
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

#[async_trait]
impl CapabilityProvider for DocumentTextProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::DocumentText
    }

    fn description(&self) -> &str {
        "Extracts text from a PDF or text document, split into overlapping chunks."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::DocumentText { path } => {
                let extractor = DocumentTextProvider::new(self.chunk_size, self.chunk_overlap);
                let doc = tokio::task::spawn_blocking(move || extractor.extract(&path))
                    .await
                    .map_err(|e| {
                        ProviderFailure::new(NAME, FailureKind::Unavailable, e.to_string())
                    })??;
                Ok(CapabilityOutput::Document(doc))
            }
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
