//! Batch Dispatcher — turns a set of resumes into a ranked candidate list.
//!
//! Flow per session: split documents into fixed-size batches → per batch, read
//! and analyse every document concurrently → append each result as it
//! resolves and re-rank → pause before the next batch → final rank.
//!
//! Session states: Idle → Running → {Completed | Cancelled}. At most one
//! session is Running per dispatcher; a new session cancels the previous one.
//!
//! All appends happen on the task driving `dispatch`, so the candidate list
//! has a single writer. In-flight concurrency is bounded by the batch size.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DispatchSettings;
use crate::models::candidate::{rank_candidates, AnalysisResult, CandidateRecord};
use crate::screening::analyzer::{AnalysisRequest, ResumeAnalyzer};
use crate::screening::cancellation::CancellationToken;
use crate::screening::documents::Document;
use crate::screening::ScreeningError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Final result of one screening session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub session_id: Uuid,
    pub state: SessionState,
    pub documents_submitted: usize,
    /// Sorted by descending match percentage; ties keep insertion order.
    pub candidates: Vec<CandidateRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionSlot {
    id: Option<Uuid>,
    token: Option<CancellationToken>,
    state: SessionState,
}

pub struct BatchDispatcher {
    analyzer: ResumeAnalyzer,
    batch_size: usize,
    batch_pause: Duration,
    session: Mutex<SessionSlot>,
    ranking: watch::Sender<Vec<CandidateRecord>>,
}

impl BatchDispatcher {
    pub fn new(analyzer: ResumeAnalyzer, settings: &DispatchSettings) -> Self {
        let (ranking, _) = watch::channel(Vec::new());
        Self {
            analyzer,
            batch_size: settings.batch_size.max(1),
            batch_pause: settings.batch_pause,
            session: Mutex::new(SessionSlot::default()),
            ranking,
        }
    }

    pub fn analyzer(&self) -> &ResumeAnalyzer {
        &self.analyzer
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    /// Live ranking of the current session, updated after every appended result.
    pub fn subscribe(&self) -> watch::Receiver<Vec<CandidateRecord>> {
        self.ranking.subscribe()
    }

    pub fn live_ranking(&self) -> Vec<CandidateRecord> {
        self.ranking.borrow().clone()
    }

    /// Signals the running session, if any. Returns whether a session was signalled.
    pub fn cancel(&self) -> bool {
        let slot = self.session.lock();
        match (&slot.token, slot.state) {
            (Some(token), SessionState::Running) => {
                token.cancel();
                info!("Cancellation requested for screening session {:?}", slot.id);
                true
            }
            _ => false,
        }
    }

    /// Screens `documents` against `job_description`.
    ///
    /// Never fails: unreadable documents and remote failures become degraded
    /// records, and a cancelled session returns whatever had completed.
    pub async fn dispatch(
        &self,
        job_description: &str,
        documents: Vec<Document>,
        token: CancellationToken,
    ) -> DispatchOutcome {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let session = self.enter_session(session_id, &token);

        let total = documents.len();
        let batch_count = total.div_ceil(self.batch_size);
        info!(
            "Screening session {session_id}: {total} documents in {batch_count} batches of up to {}",
            self.batch_size
        );

        let mut candidates: Vec<CandidateRecord> = Vec::with_capacity(total);

        for (batch_index, batch) in documents.chunks(self.batch_size).enumerate() {
            if token.is_cancelled() {
                info!(
                    "Session {session_id} cancelled before batch {}/{batch_count}",
                    batch_index + 1
                );
                break;
            }

            debug!(
                "Session {session_id}: dispatching batch {}/{batch_count} ({} documents)",
                batch_index + 1,
                batch.len()
            );

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|document| self.screen_document(document, job_description, &token))
                .collect();

            while let Some(record) = in_flight.next().await {
                let Some(record) = record else { continue };
                candidates.push(record);
                rank_candidates(&mut candidates);
                self.publish(session_id, &candidates);
            }

            let is_last = batch_index + 1 == batch_count;
            if !is_last && !token.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(self.batch_pause) => {}
                    _ = token.cancelled() => {}
                }
            }
        }

        rank_candidates(&mut candidates);

        let state = if token.is_cancelled() && candidates.len() < total {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        session.finish(state);

        info!(
            "Screening session {session_id} {:?}: {}/{total} candidates ranked",
            state,
            candidates.len()
        );

        DispatchOutcome {
            session_id,
            state,
            documents_submitted: total,
            candidates,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Reads and analyses one document. `None` means the session was cancelled
    /// before a result could be accepted.
    async fn screen_document(
        &self,
        document: &Document,
        job_description: &str,
        token: &CancellationToken,
    ) -> Option<CandidateRecord> {
        let analysis = match self.analyze_document(document, job_description, token).await {
            Ok(analysis) => analysis,
            Err(ScreeningError::Cancelled) => return None,
            Err(ScreeningError::UnreadableDocument(e)) => {
                warn!("Could not read {}: {e}", document.file_name());
                AnalysisResult::unreadable(&e.reason)
            }
            Err(e) => {
                warn!("Could not screen {}: {e}", document.file_name());
                AnalysisResult::unreadable(&e.to_string())
            }
        };

        Some(CandidateRecord {
            name: document.candidate_name(),
            file_name: document.file_name().to_string(),
            analysis,
        })
    }

    async fn analyze_document(
        &self,
        document: &Document,
        job_description: &str,
        token: &CancellationToken,
    ) -> Result<AnalysisResult, ScreeningError> {
        let text = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ScreeningError::Cancelled),
            read = document.read() => read?,
        };

        let request = AnalysisRequest {
            document_text: &text,
            job_description,
            cancellation: token,
        };
        self.analyzer.analyze(&request).await
    }

    /// Marks `session_id` as the running session and clears the live ranking.
    /// The returned guard settles the session state when it is dropped.
    fn enter_session<'a>(
        &'a self,
        session_id: Uuid,
        token: &CancellationToken,
    ) -> SessionGuard<'a> {
        let mut slot = self.session.lock();
        if slot.state == SessionState::Running {
            if let Some(previous) = slot.token.as_ref().filter(|t| !t.same_as(token)) {
                previous.cancel();
                info!(
                    "Session {session_id} supersedes running session {:?}",
                    slot.id
                );
            }
        }
        slot.id = Some(session_id);
        slot.token = Some(token.clone());
        slot.state = SessionState::Running;
        self.ranking.send_replace(Vec::new());

        SessionGuard {
            dispatcher: self,
            session_id,
            token: token.clone(),
            final_state: None,
        }
    }

    fn leave_session(&self, session_id: Uuid, state: SessionState) {
        let mut slot = self.session.lock();
        if slot.id == Some(session_id) {
            slot.state = state;
        }
    }

    /// Publishes a ranking only while `session_id` is still the current session.
    fn publish(&self, session_id: Uuid, candidates: &[CandidateRecord]) {
        let slot = self.session.lock();
        if slot.id == Some(session_id) {
            self.ranking.send_replace(candidates.to_vec());
        }
    }
}

/// Leaves the session on drop. A session whose `dispatch` future is dropped
/// before finishing is cancelled.
struct SessionGuard<'a> {
    dispatcher: &'a BatchDispatcher,
    session_id: Uuid,
    token: CancellationToken,
    final_state: Option<SessionState>,
}

impl SessionGuard<'_> {
    fn finish(mut self, state: SessionState) {
        self.final_state = Some(state);
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let state = match self.final_state {
            Some(state) => state,
            None => {
                self.token.cancel();
                warn!("Screening session {} abandoned before completion", self.session_id);
                SessionState::Cancelled
            }
        };
        self.dispatcher.leave_session(self.session_id, state);
    }
}
