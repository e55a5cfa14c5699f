//! HTTP route definitions.

mod blobs;
mod changes;
mod collections;
mod health;

use crate::AppState;
use axum::Router;

/// Create all application routes. Blob uploads are capped at
/// `max_blob_bytes`.
pub fn create_routes(max_blob_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(collections::routes())
        .merge(blobs::routes(max_blob_bytes))
        .merge(changes::routes())
}
