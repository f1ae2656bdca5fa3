//! Defines routes for the upload-authorization surface and the landing-event
//! feed.
//!
//! ## Structure
//! - **Request surface (client-facing)**
//!   - `GET  /upload?name=<filename>` — issue single-shot upload authorization
//!   - `GET  /download?file_id=<id>` — issue download authorization
//!   - `GET  /multipart?name=<filename>&parts=<n>` — open multipart session
//!   - `POST /complete` — finalize multipart session
//!
//! - **Event feed (storage-facing)**
//!   - `POST /events` — landing-event batch for the completion reconciler

use crate::{
    handlers::{
        event_handlers::ingest_landing_events,
        health_handlers::{healthz, readyz},
        upload_handlers::{
            finalize_multipart_session, issue_download_authorization,
            issue_upload_authorization, open_multipart_session,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for the full inbound surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // client-facing request surface
        .route("/upload", get(issue_upload_authorization))
        .route("/download", get(issue_download_authorization))
        .route("/multipart", get(open_multipart_session))
        .route("/complete", post(finalize_multipart_session))
        // storage-facing event feed
        .route("/events", post(ingest_landing_events))
}
