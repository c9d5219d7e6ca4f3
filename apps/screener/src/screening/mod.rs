// Bulk resume screening engine.
// Implements: keyword index, job keyword cache, credential pool, resume analyzer,
// batch dispatcher, plus the document readers and HTTP handlers around them.
// All LLM calls go through llm_client; no direct API calls here.

pub mod analyzer;
pub mod cancellation;
pub mod credentials;
pub mod dispatcher;
pub mod documents;
pub mod handlers;
pub mod keyword_cache;
pub mod keywords;
pub mod prompts;

#[cfg(test)]
pub mod test_support;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::screening::credentials::PoolExhausted;
use crate::screening::documents::UnreadableDocument;

/// Failure taxonomy of a single document's screening.
///
/// Only `Cancelled` ever leaves the analyzer. Remote failures become keyword
/// fallbacks there, and read failures become zero-score records in the dispatcher.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("screening session was cancelled")]
    Cancelled,

    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),

    #[error("remote analysis failed: {0}")]
    RemoteCallFailure(#[from] LlmError),

    #[error("document could not be read: {0}")]
    UnreadableDocument(#[from] UnreadableDocument),
}
