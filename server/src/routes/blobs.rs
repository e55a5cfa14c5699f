//! Blob routes.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::put,
    Json, Router,
};
use folio_engine::BlobUploaded;

use crate::error::Result;
use crate::handlers::{handle_blob_delete, handle_download, handle_upload};
use crate::AppState;

pub fn routes(max_blob_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/v1/blobs/{*path}",
            put(upload_handler).get(download_handler).delete(delete_handler),
        )
        .layer(DefaultBodyLimit::max(max_blob_bytes))
}

/// PUT /v1/blobs/{*path}
async fn upload_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BlobUploaded>> {
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let uploaded = handle_upload(&state.pool, &state.config, &path, mime, &body).await?;
    Ok(Json(uploaded))
}

/// GET /v1/blobs/{*path}
async fn download_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse> {
    let blob = handle_download(&state.pool, &path).await?;
    Ok(([(CONTENT_TYPE, blob.mime)], blob.data))
}

/// DELETE /v1/blobs/{*path}
async fn delete_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<StatusCode> {
    handle_blob_delete(&state.pool, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}
