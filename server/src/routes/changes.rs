//! Change feed route.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::handlers::handle_change_feed;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/changes", get(changes_handler))
}

/// GET /v1/changes - upgrade to the change feed.
async fn changes_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_change_feed(socket, hub))
}
