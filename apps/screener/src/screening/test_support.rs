//! Test doubles for the screening collaborators.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::llm_client::{InferenceBackend, LlmError};
use crate::screening::documents::{DocumentSource, UnreadableDocument};

type Responder = Box<dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: String,
    pub prompt: String,
    pub started_at: Instant,
}

/// In-memory `InferenceBackend`: answers every call through a closure and
/// records each call.
pub struct ScriptedBackend {
    responder: Responder,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn replying(
        responder: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self::replying_per_key(move |_, prompt| responder(prompt))
    }

    /// Like `replying`, but the closure also sees the API key: `(api_key, prompt)`.
    pub fn replying_per_key(
        responder: impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scores each resume from a `SCORE=<n>` marker in its text.
    pub fn scoring_from_marker() -> Self {
        Self::replying(|prompt| Ok(analysis_json(score_marker(prompt).unwrap_or(0))))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn complete(
        &self,
        api_key: &str,
        prompt: &str,
        _system: &str,
    ) -> Result<String, LlmError> {
        self.calls.lock().push(RecordedCall {
            api_key: api_key.to_string(),
            prompt: prompt.to_string(),
            started_at: Instant::now(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(api_key, prompt)
    }
}

/// A document whose text can never be extracted.
pub struct BrokenDocument;

#[async_trait]
impl DocumentSource for BrokenDocument {
    async fn read(&self) -> Result<String, UnreadableDocument> {
        Err(UnreadableDocument::new("corrupt file"))
    }
}

/// A well-formed analysis response with the given score.
pub fn analysis_json(score: i64) -> String {
    serde_json::json!({
        "matchPercentage": score,
        "matchedKeywords": ["react"],
        "strengths": ["Relevant experience"],
        "weaknesses": ["No Kubernetes"],
        "summary": "Solid candidate."
    })
    .to_string()
}

fn score_marker(prompt: &str) -> Option<i64> {
    let start = prompt.find("SCORE=")? + "SCORE=".len();
    let digits: String = prompt[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
