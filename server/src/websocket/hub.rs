//! Change feed subscriber registry.
//!
//! Tracks connected change-feed clients and which collections each one
//! subscribed to, and fans document changes out to them.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use folio_engine::{ChangeEvent, CollectionKind, ServerMessage};
use tokio::sync::mpsc;

/// Sender for change feed messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single change feed connection.
#[derive(Debug)]
struct Subscriber {
    sender: MessageSender,
    collections: HashSet<CollectionKind>,
}

/// Registry of change feed connections.
///
/// Thread-safe and shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ChangeHub {
    subscribers: DashMap<String, Subscriber>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection with no subscriptions. Returns its id.
    pub fn register(&self, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();
        self.subscribers.insert(
            conn_id.clone(),
            Subscriber {
                sender,
                collections: HashSet::new(),
            },
        );

        tracing::info!(conn_id = %conn_id, "change feed connection registered");
        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        if self.subscribers.remove(conn_id).is_some() {
            tracing::info!(conn_id = %conn_id, "change feed connection unregistered");
        }
    }

    /// Start delivering changes for `collection`. Returns false for an
    /// unknown connection.
    pub fn subscribe(&self, conn_id: &str, collection: CollectionKind) -> bool {
        match self.subscribers.get_mut(conn_id) {
            Some(mut subscriber) => {
                subscriber.collections.insert(collection);
                tracing::debug!(conn_id = %conn_id, collection = %collection, "subscribed");
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&self, conn_id: &str, collection: CollectionKind) {
        if let Some(mut subscriber) = self.subscribers.get_mut(conn_id) {
            subscriber.collections.remove(&collection);
        }
    }

    /// Send `event` to every connection subscribed to its collection.
    ///
    /// Returns the number of connections that received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut sent_count = 0;

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if subscriber.collections.contains(&event.collection)
                && subscriber
                    .sender
                    .send(ServerMessage::Changed(event.clone()))
                    .is_ok()
            {
                sent_count += 1;
            }
        }

        tracing::debug!(
            collection = %event.collection,
            remote_id = %event.remote_id,
            recipients = sent_count,
            "published change"
        );

        sent_count
    }

    /// Send a message to one connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.subscribers.get(conn_id) {
            Some(subscriber) => subscriber.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }
}
