//! Types exchanged with the cloud mirror.
//!
//! Documents are loosely typed JSON objects: the mirror only knows about
//! `remoteId` and the optional `localId` correlation field. Everything else
//! is passed through as-is.

use crate::{CollectionKind, LocalId, RemoteId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as stored in a mirror collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDoc {
    pub remote_id: RemoteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteDoc {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }
}

/// Equality filter for finding documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum DocFilter {
    LocalId(LocalId),
    AlbumId(LocalId),
    Key(String),
}

impl DocFilter {
    /// Query string parameter name and value.
    pub fn query_pair(&self) -> (&'static str, String) {
        match self {
            DocFilter::LocalId(id) => ("localId", id.to_string()),
            DocFilter::AlbumId(id) => ("albumId", id.to_string()),
            DocFilter::Key(key) => ("key", key.clone()),
        }
    }

    /// True if `doc` carries the filtered field with the filtered value.
    pub fn matches(&self, doc: &RemoteDoc) -> bool {
        match self {
            DocFilter::LocalId(id) => doc.local_id == Some(*id),
            DocFilter::AlbumId(id) => doc.u64_field("albumId") == Some(*id),
            DocFilter::Key(key) => doc.str_field("key") == Some(key.as_str()),
        }
    }
}

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A change notification for one mirror collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: CollectionKind,
    pub change: ChangeKind,
    pub remote_id: RemoteId,
}

/// Response to a document insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocCreated {
    pub remote_id: RemoteId,
}

/// Response to a blob upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobUploaded {
    #[serde(rename = "downloadURL")]
    pub download_url: String,
}

/// Messages sent from client to mirror over the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { collection: CollectionKind },
    Unsubscribe { collection: CollectionKind },
    Ping,
}

/// Messages sent from mirror to client over the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { collection: CollectionKind },
    Unsubscribed { collection: CollectionKind },
    Changed(ChangeEvent),
    Pong,
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_doc_flattens_fields() {
        let doc: RemoteDoc = serde_json::from_value(json!({
            "remoteId": "abc",
            "localId": 3,
            "name": "Trips",
            "order": 1
        }))
        .unwrap();

        assert_eq!(doc.remote_id, "abc");
        assert_eq!(doc.local_id, Some(3));
        assert_eq!(doc.str_field("name"), Some("Trips"));
        assert_eq!(doc.i64_field("order"), Some(1));
        assert!(!doc.fields.contains_key("remoteId"));
    }

    #[test]
    fn filters() {
        let doc: RemoteDoc = serde_json::from_value(json!({
            "remoteId": "p1",
            "localId": 7,
            "albumId": 2
        }))
        .unwrap();

        assert!(DocFilter::LocalId(7).matches(&doc));
        assert!(DocFilter::AlbumId(2).matches(&doc));
        assert!(!DocFilter::AlbumId(3).matches(&doc));
        assert!(!DocFilter::Key("favicon".into()).matches(&doc));
        assert_eq!(DocFilter::AlbumId(2).query_pair(), ("albumId", "2".to_string()));
    }

    #[test]
    fn server_message_format() {
        let msg = ServerMessage::Changed(ChangeEvent {
            collection: CollectionKind::Photos,
            change: ChangeKind::Deleted,
            remote_id: "r1".into(),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "changed",
                "collection": "photos",
                "change": "deleted",
                "remoteId": "r1"
            })
        );
    }

    #[test]
    fn client_message_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","collection":"albums"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                collection: CollectionKind::Albums
            }
        );
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
    }

    #[test]
    fn blob_uploaded_field_name() {
        let uploaded = BlobUploaded {
            download_url: "http://x/v1/blobs/a".into(),
        };
        assert_eq!(
            serde_json::to_value(&uploaded).unwrap(),
            json!({"downloadURL": "http://x/v1/blobs/a"})
        );
    }
}
