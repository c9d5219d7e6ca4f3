//! Resume Analyzer — one scored analysis of one resume against one job description.
//!
//! Flow: cancellation check → select key → truncate resume → cancellation check →
//!       remote call (with timeout) → report key health → validate JSON.
//!
//! Any remote failure (transport, API status, timeout, malformed shape, exhausted
//! key pool) is absorbed into the keyword-overlap fallback. Only cancellation
//! escapes, because it is a deliberate abort rather than a fault.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::DispatchSettings;
use crate::llm_client::{clean_json_text, InferenceBackend, LlmError};
use crate::models::candidate::{clamp_percentage, AnalysisResult, AnalysisSource};
use crate::screening::cancellation::CancellationToken;
use crate::screening::credentials::CredentialPool;
use crate::screening::keyword_cache::JobKeywordCache;
use crate::screening::keywords::fallback_analysis;
use crate::screening::prompts::{analysis_system, build_analysis_prompt};
use crate::screening::ScreeningError;

/// Inputs for one analysis. Borrowed: the dispatcher owns the text for the
/// lifetime of the call.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub document_text: &'a str,
    pub job_description: &'a str,
    pub cancellation: &'a CancellationToken,
}

/// Shape the model must return. Every field is required; serde rejects
/// missing fields and wrong JSON types.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteAnalysis {
    match_percentage: f64,
    matched_keywords: Vec<String>,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    summary: String,
}

pub struct ResumeAnalyzer {
    pool: Arc<CredentialPool>,
    backend: Arc<dyn InferenceBackend>,
    keyword_cache: JobKeywordCache,
    call_timeout: Duration,
    max_document_chars: usize,
}

impl ResumeAnalyzer {
    pub fn new(
        pool: Arc<CredentialPool>,
        backend: Arc<dyn InferenceBackend>,
        settings: &DispatchSettings,
    ) -> Self {
        Self {
            pool,
            backend,
            keyword_cache: JobKeywordCache::default(),
            call_timeout: settings.call_timeout,
            max_document_chars: settings.max_document_chars,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Returns a remote or fallback result; fails only with `ScreeningError::Cancelled`.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
    ) -> Result<AnalysisResult, ScreeningError> {
        if request.cancellation.is_cancelled() {
            return Err(ScreeningError::Cancelled);
        }

        match self.analyze_remote(request).await {
            Ok(result) => Ok(result),
            Err(ScreeningError::Cancelled) => Err(ScreeningError::Cancelled),
            Err(e) => {
                warn!("Remote analysis unavailable, using keyword fallback: {e}");
                let job_keywords = self.keyword_cache.get(request.job_description);
                Ok(fallback_analysis(&job_keywords, request.document_text))
            }
        }
    }

    async fn analyze_remote(
        &self,
        request: &AnalysisRequest<'_>,
    ) -> Result<AnalysisResult, ScreeningError> {
        let credential = self.pool.select()?;

        let excerpt = truncate_chars(request.document_text, self.max_document_chars);
        let prompt = build_analysis_prompt(excerpt, request.job_description);
        let system = analysis_system();

        if request.cancellation.is_cancelled() {
            return Err(ScreeningError::Cancelled);
        }

        let outcome = match tokio::time::timeout(
            self.call_timeout,
            self.backend.complete(credential.secret(), &prompt, &system),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(LlmError::Timeout(self.call_timeout)),
        };

        match &outcome {
            Ok(_) => self.pool.report_success(&credential),
            Err(_) => self.pool.report_failure(&credential),
        }

        // The call finished, but the session no longer wants its result.
        if request.cancellation.is_cancelled() {
            return Err(ScreeningError::Cancelled);
        }

        let text = outcome?;
        match parse_analysis(&text) {
            Ok(result) => {
                debug!(
                    "Remote analysis via {}: {}%",
                    credential.label(),
                    result.match_percentage
                );
                Ok(result)
            }
            Err(e) => {
                self.pool.report_failure(&credential);
                Err(e.into())
            }
        }
    }
}

/// Validates model output against the analysis shape.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, LlmError> {
    let cleaned = clean_json_text(text);
    let remote: RemoteAnalysis = serde_json::from_str(&cleaned)?;
    Ok(AnalysisResult {
        match_percentage: clamp_percentage(remote.match_percentage),
        matched_keywords: remote.matched_keywords,
        strengths: remote.strengths,
        weaknesses: remote.weaknesses,
        summary: remote.summary,
        source: AnalysisSource::Remote,
    })
}

/// Longest prefix of `text` holding at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::credentials::CircuitState;
    use crate::screening::test_support::{analysis_json, ScriptedBackend};

    const JOB: &str = "Senior React Engineer, needs AWS and Docker experience";
    const RESUME: &str = "Built React frontends deployed on AWS.";

    fn analyzer_with(backend: Arc<ScriptedBackend>, keys: usize) -> ResumeAnalyzer {
        let pool = CredentialPool::new((0..keys).map(|i| format!("sk-analyzer-key-{i}"))).unwrap();
        ResumeAnalyzer::new(Arc::new(pool), backend, &DispatchSettings::default())
    }

    fn request<'a>(token: &'a CancellationToken) -> AnalysisRequest<'a> {
        AnalysisRequest {
            document_text: RESUME,
            job_description: JOB,
            cancellation: token,
        }
    }

    #[tokio::test]
    async fn test_remote_success_is_parsed() {
        let backend = Arc::new(ScriptedBackend::replying(|_| Ok(analysis_json(82))));
        let analyzer = analyzer_with(backend.clone(), 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.match_percentage, 82);
        assert_eq!(result.source, AnalysisSource::Remote);
        assert_eq!(backend.call_count(), 1);
        assert_eq!(analyzer.pool().snapshot()[0].failure_count, 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_call() {
        let backend = Arc::new(ScriptedBackend::replying(|_| Ok(analysis_json(50))));
        let analyzer = analyzer_with(backend.clone(), 1);
        let token = CancellationToken::new();
        token.cancel();

        let err = analyzer.analyze(&request(&token)).await.unwrap_err();
        assert!(matches!(err, ScreeningError::Cancelled));
        assert_eq!(backend.call_count(), 0);
        assert!(analyzer.pool().snapshot()[0].idle_secs.is_none());
    }

    #[tokio::test]
    async fn test_http_failure_falls_back_and_marks_key() {
        let backend = Arc::new(ScriptedBackend::replying(|_| {
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            })
        }));
        let analyzer = analyzer_with(backend, 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Fallback);
        // job: react, aws, docker; resume: react, aws
        assert_eq!(result.match_percentage, 67);
        assert_eq!(result.matched_keywords, vec!["react", "aws"]);
        assert_eq!(analyzer.pool().snapshot()[0].failure_count, 1);
    }

    #[tokio::test]
    async fn test_missing_field_falls_back() {
        let backend = Arc::new(ScriptedBackend::replying(|_| {
            Ok(r#"{"matchPercentage": 90, "matchedKeywords": [], "strengths": [], "weaknesses": []}"#
                .to_string())
        }));
        let analyzer = analyzer_with(backend, 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Fallback);
        // reported success for the call, then failure for the shape: net 1
        assert_eq!(analyzer.pool().snapshot()[0].failure_count, 1);
    }

    #[tokio::test]
    async fn test_wrong_type_falls_back() {
        let backend = Arc::new(ScriptedBackend::replying(|_| {
            Ok(r#"{"matchPercentage": "high", "matchedKeywords": [], "strengths": [],
                   "weaknesses": [], "summary": "ok"}"#
                .to_string())
        }));
        let analyzer = analyzer_with(backend, 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Fallback);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_clamped() {
        let backend = Arc::new(ScriptedBackend::replying(|_| Ok(analysis_json(140))));
        let analyzer = analyzer_with(backend, 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.match_percentage, 100);
    }

    #[tokio::test]
    async fn test_exhausted_pool_falls_back_without_calling() {
        let backend = Arc::new(ScriptedBackend::replying(|_| Ok(analysis_json(50))));
        let analyzer = analyzer_with(backend.clone(), 1);
        let key = analyzer.pool().select().unwrap();
        for _ in 0..3 {
            analyzer.pool().report_failure(&key);
        }
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Fallback);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(analyzer.pool().snapshot()[0].failure_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out_into_fallback() {
        let backend = Arc::new(
            ScriptedBackend::replying(|_| Ok(analysis_json(99)))
                .with_delay(Duration::from_secs(120)),
        );
        let analyzer = analyzer_with(backend, 1);
        let token = CancellationToken::new();

        let result = analyzer.analyze(&request(&token)).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Fallback);
        assert_eq!(analyzer.pool().snapshot()[0].failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_call_discards_result() {
        let backend = Arc::new(
            ScriptedBackend::replying(|_| Ok(analysis_json(75)))
                .with_delay(Duration::from_secs(1)),
        );
        let analyzer = analyzer_with(backend.clone(), 1);
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                token.cancel();
            }
        };
        let req = request(&token);
        let (outcome, _) = tokio::join!(analyzer.analyze(&req), canceller);

        assert!(matches!(outcome, Err(ScreeningError::Cancelled)));
        assert_eq!(backend.call_count(), 1);
        // The call itself succeeded, so the key is not blamed.
        let health = &analyzer.pool().snapshot()[0];
        assert_eq!(health.state, CircuitState::Closed);
        assert_eq!(health.failure_count, 0);
    }

    #[tokio::test]
    async fn test_long_resume_is_truncated_before_sending() {
        let backend = Arc::new(ScriptedBackend::replying(|_| Ok(analysis_json(10))));
        let pool = CredentialPool::new(["sk-analyzer-key"]).unwrap();
        let settings = DispatchSettings {
            max_document_chars: 100,
            ..DispatchSettings::default()
        };
        let analyzer = ResumeAnalyzer::new(Arc::new(pool), backend.clone(), &settings);
        let token = CancellationToken::new();
        let long_resume = format!("{}TAIL-MARKER", "é".repeat(100));

        analyzer
            .analyze(&AnalysisRequest {
                document_text: &long_resume,
                job_description: JOB,
                cancellation: &token,
            })
            .await
            .unwrap();

        let prompt = &backend.calls()[0].prompt;
        assert!(prompt.contains(&"é".repeat(100)));
        assert!(!prompt.contains("TAIL-MARKER"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_parse_accepts_fenced_output() {
        let text = format!("```json\n{}\n```", analysis_json(64));
        let result = parse_analysis(&text).unwrap();
        assert_eq!(result.match_percentage, 64);
    }

    #[test]
    fn test_parse_rounds_fractional_score() {
        let text = r#"{"matchPercentage": 71.6, "matchedKeywords": ["rust"],
                       "strengths": ["a"], "weaknesses": ["b"], "summary": "c"}"#;
        assert_eq!(parse_analysis(text).unwrap().match_percentage, 72);
    }
}
