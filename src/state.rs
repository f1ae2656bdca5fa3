use crate::services::{reconciler::CompletionReconciler, upload_service::UploadService};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler. Both components are cheap clones
/// over `Arc`-held collaborator clients.
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,
    pub reconciler: CompletionReconciler,

    /// Kept alongside the components for the readiness probe.
    pub db: Arc<SqlitePool>,
}
