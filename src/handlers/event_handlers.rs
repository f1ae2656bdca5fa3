//! Inbound landing-event feed. The storage backend (or a bridge in front of
//! it) POSTs creation-event batches here; per-event failures are isolated
//! inside the reconciler, so the feed always gets a 200 back for a
//! well-formed batch.

use crate::{models::event::LandingBatch, state::AppState};
use axum::{Json, extract::State, http::StatusCode};

/// POST `/events` — reconcile a batch of landing events.
pub async fn ingest_landing_events(
    State(state): State<AppState>,
    Json(batch): Json<LandingBatch>,
) -> StatusCode {
    state.reconciler.process(&batch.records).await;
    StatusCode::OK
}
