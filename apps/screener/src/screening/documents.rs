//! Document readers — the text-extraction collaborator behind the dispatcher.
//!
//! The dispatcher only sees `DocumentSource::read`; any failure, whatever its
//! cause, becomes an `UnreadableDocument` and then a zero-score record.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct UnreadableDocument {
    pub reason: String,
}

impl UnreadableDocument {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Produces the plain text of one uploaded document.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read(&self) -> Result<String, UnreadableDocument>;
}

/// One candidate document: its original file name plus a way to read it.
#[derive(Clone)]
pub struct Document {
    file_name: String,
    source: Arc<dyn DocumentSource>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, source: impl DocumentSource + 'static) -> Self {
        Self {
            file_name: file_name.into(),
            source: Arc::new(source),
        }
    }

    /// Picks a reader from the file extension: `.pdf` is parsed, anything else is text.
    pub fn from_upload(file_name: impl Into<String>, bytes: Bytes) -> Self {
        let file_name = file_name.into();
        if file_name.to_lowercase().ends_with(".pdf") {
            Self::new(file_name, PdfDocument::new(bytes))
        } else {
            Self::new(file_name, PlainTextDocument::new(bytes))
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn candidate_name(&self) -> String {
        candidate_name(&self.file_name)
    }

    pub async fn read(&self) -> Result<String, UnreadableDocument> {
        self.source.read().await
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Readers
// ────────────────────────────────────────────────────────────────────────────

/// UTF-8 text held in memory (`.txt`, pasted text, test fixtures).
pub struct PlainTextDocument {
    bytes: Bytes,
}

impl PlainTextDocument {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for PlainTextDocument {
    async fn read(&self) -> Result<String, UnreadableDocument> {
        let text = std::str::from_utf8(&self.bytes)
            .map_err(|e| UnreadableDocument::new(format!("not valid UTF-8 text ({e})")))?;
        non_empty(text.to_string())
    }
}

/// PDF bytes; text is extracted on the blocking pool since parsing is CPU-bound.
pub struct PdfDocument {
    bytes: Bytes,
}

impl PdfDocument {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for PdfDocument {
    async fn read(&self) -> Result<String, UnreadableDocument> {
        let bytes = self.bytes.clone();
        let extracted =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| {
                    UnreadableDocument::new(format!("PDF extraction task failed ({e})"))
                })?;
        let text = extracted.map_err(|e| {
            UnreadableDocument::new(format!("failed to extract text from PDF ({e})"))
        })?;
        non_empty(text)
    }
}

fn non_empty(text: String) -> Result<String, UnreadableDocument> {
    if text.trim().is_empty() {
        Err(UnreadableDocument::new("document contains no extractable text"))
    } else {
        Ok(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate names
// ────────────────────────────────────────────────────────────────────────────

static RESUME_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|txt|doc|docx)$").expect("valid extension pattern"));

/// Display name from an upload's file name: `jane_doe-CV.pdf` → `Jane Doe Cv`.
pub fn candidate_name(file_name: &str) -> String {
    let stem = RESUME_EXTENSION.replace(file_name, "");
    stem.replace(|c: char| c == '_' || c == '-', " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
