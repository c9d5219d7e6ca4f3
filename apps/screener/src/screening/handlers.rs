use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::models::candidate::CandidateRecord;
use crate::screening::cancellation::CancellationToken;
use crate::screening::credentials::CredentialHealth;
use crate::screening::dispatcher::{DispatchOutcome, SessionState};
use crate::screening::documents::Document;
use crate::state::AppState;

const JOB_DESCRIPTION_FIELD: &str = "job_description";
const FILES_FIELD: &str = "files";

#[derive(Serialize)]
pub struct LiveRankingResponse {
    pub state: SessionState,
    pub candidates: Vec<CandidateRecord>,
}

/// POST /api/v1/screenings
pub async fn handle_create_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DispatchOutcome>, AppError> {
    let mut job_description = String::new();
    let mut documents = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(JOB_DESCRIPTION_FIELD) => job_description = field.text().await?,
            Some(FILES_FIELD) => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let bytes = field.bytes().await?;
                documents.push(Document::from_upload(file_name, bytes));
            }
            _ => {}
        }
    }

    let job_description = job_description.trim();
    if job_description.is_empty() {
        return Err(AppError::Validation(format!(
            "'{JOB_DESCRIPTION_FIELD}' is required"
        )));
    }
    if documents.is_empty() {
        return Err(AppError::Validation(format!(
            "at least one '{FILES_FIELD}' part is required"
        )));
    }

    info!("Screening request received with {} documents", documents.len());
    let outcome = state
        .dispatcher
        .dispatch(job_description, documents, CancellationToken::new())
        .await;
    Ok(Json(outcome))
}

/// POST /api/v1/screenings/cancel
pub async fn handle_cancel(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let cancelled = state.dispatcher.cancel();
    (StatusCode::ACCEPTED, Json(json!({ "cancelled": cancelled })))
}

/// GET /api/v1/screenings/live
pub async fn handle_live(State(state): State<AppState>) -> Json<LiveRankingResponse> {
    Json(LiveRankingResponse {
        state: state.dispatcher.state(),
        candidates: state.dispatcher.live_ranking(),
    })
}

/// GET /api/v1/screenings/live/stream
/// Server-sent `ranking` events: the current ranking first, then every update.
pub async fn handle_live_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = state.dispatcher.subscribe();
    let current = receiver.borrow().clone();

    let updates = stream::unfold(receiver, |mut receiver| async move {
        receiver.changed().await.ok()?;
        let ranking = receiver.borrow_and_update().clone();
        Some((ranking, receiver))
    });

    let events = stream::once(async move { current })
        .chain(updates)
        .map(|ranking| Event::default().event("ranking").json_data(ranking));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/v1/credentials
pub async fn handle_credentials(State(state): State<AppState>) -> Json<Vec<CredentialHealth>> {
    Json(state.dispatcher.analyzer().pool().snapshot())
}
