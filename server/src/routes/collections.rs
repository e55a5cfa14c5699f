//! Document collection routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use folio_engine::{ChangeEvent, ChangeKind, CollectionKind, DocCreated, RemoteDoc};
use serde_json::Value;

use crate::error::Result;
use crate::handlers::{
    handle_create, handle_delete, handle_list, handle_update, parse_collection, DocQuery,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/collections/{collection}",
            get(list_handler).post(create_handler),
        )
        .route(
            "/v1/collections/{collection}/{remote_id}",
            patch(update_handler).delete(delete_handler),
        )
}

fn publish(state: &AppState, collection: CollectionKind, change: ChangeKind, remote_id: String) {
    state.hub.publish(ChangeEvent {
        collection,
        change,
        remote_id,
    });
}

/// GET /v1/collections/{collection}
async fn list_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<DocQuery>,
) -> Result<Json<Vec<RemoteDoc>>> {
    let collection = parse_collection(&collection)?;
    let docs = handle_list(&state.pool, collection, query).await?;
    Ok(Json(docs))
}

/// POST /v1/collections/{collection}
async fn create_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<DocCreated>)> {
    let collection = parse_collection(&collection)?;
    let created = handle_create(&state.pool, collection, body).await?;
    publish(&state, collection, ChangeKind::Created, created.remote_id.clone());
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /v1/collections/{collection}/{remote_id}
async fn update_handler(
    State(state): State<AppState>,
    Path((collection, remote_id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<StatusCode> {
    let collection = parse_collection(&collection)?;
    handle_update(&state.pool, collection, &remote_id, patch).await?;
    publish(&state, collection, ChangeKind::Updated, remote_id);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/collections/{collection}/{remote_id}
async fn delete_handler(
    State(state): State<AppState>,
    Path((collection, remote_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let collection = parse_collection(&collection)?;
    handle_delete(&state.pool, collection, &remote_id).await?;
    publish(&state, collection, ChangeKind::Deleted, remote_id);
    Ok(StatusCode::NO_CONTENT)
}
