use std::sync::Arc;

use crate::screening::dispatcher::BatchDispatcher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// One dispatcher per process; it owns the credential pool and keyword cache.
    pub dispatcher: Arc<BatchDispatcher>,
}
