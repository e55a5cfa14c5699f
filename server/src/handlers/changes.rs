//! Change feed connection handler.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use folio_engine::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::websocket::ChangeHub;

/// Handle an established change feed connection.
///
/// Registers the connection, forwards hub messages to the socket from a
/// separate task, and answers client messages until the socket closes.
pub async fn handle_change_feed(socket: WebSocket, hub: Arc<ChangeHub>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn_id = hub.register(tx);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send change feed message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize change feed message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(text.as_str(), &hub, &conn_id);
                hub.send_to(&conn_id, response);
            }
            Ok(Message::Binary(_)) => {
                hub.send_to(&conn_id, ServerMessage::error("binary messages are not supported"));
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::debug!(conn_id = %conn_id, "change feed close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "change feed error: {}", e);
                break;
            }
        }
    }

    hub.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        active_connections = hub.connection_count(),
        "change feed client disconnected"
    );
}

/// Apply a client message and produce the reply.
pub fn process_message(text: &str, hub: &ChangeHub, conn_id: &str) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => return ServerMessage::error(format!("Invalid message format: {e}")),
    };

    match client_msg {
        ClientMessage::Subscribe { collection } => {
            hub.subscribe(conn_id, collection);
            ServerMessage::Subscribed { collection }
        }
        ClientMessage::Unsubscribe { collection } => {
            hub.unsubscribe(conn_id, collection);
            ServerMessage::Unsubscribed { collection }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}
