//! Remote document and blob stores.
//!
//! A remote mirrors the local collections as loosely typed documents. Each
//! document carries the provider-assigned `remoteId` and, for ordered
//! collections, the `localId` it shadows. Blobs live at paths and are
//! addressed by the `downloadURL` the remote hands back.

mod http;
mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use folio_engine::{Blob, ChangeEvent, CollectionKind, DocFilter, LocalId, RemoteDoc, RemoteId};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// JSON object holding a document's fields.
pub type Fields = Map<String, Value>;

/// A remote document store with blob storage and change notifications.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Check that the remote answers.
    async fn probe(&self) -> RemoteResult<()>;

    /// Insert a document and return its remote id.
    async fn insert(
        &self,
        kind: CollectionKind,
        local_id: Option<LocalId>,
        fields: Fields,
    ) -> RemoteResult<RemoteId>;

    /// Documents matching an equality filter.
    async fn find(&self, kind: CollectionKind, filter: &DocFilter) -> RemoteResult<Vec<RemoteDoc>>;

    /// Every document, ascending by `order` then `localId`.
    async fn list(&self, kind: CollectionKind) -> RemoteResult<Vec<RemoteDoc>>;

    /// Merge `patch` into a document.
    async fn update(&self, kind: CollectionKind, remote_id: &str, patch: Fields) -> RemoteResult<()>;

    async fn delete(&self, kind: CollectionKind, remote_id: &str) -> RemoteResult<()>;

    /// Store a blob at `path` and return its download URL.
    async fn upload_blob(&self, path: &str, blob: &Blob) -> RemoteResult<String>;

    async fn download_blob(&self, url: &str) -> RemoteResult<Blob>;

    async fn delete_blob(&self, path: &str) -> RemoteResult<()>;

    /// Receive change events for one collection.
    async fn subscribe(&self, kind: CollectionKind)
        -> RemoteResult<broadcast::Receiver<ChangeEvent>>;
}

/// Serialize a value into document fields.
pub fn to_fields<T: Serialize>(value: &T) -> RemoteResult<Fields> {
    match serde_json::to_value(value).map_err(RemoteError::decode)? {
        Value::Object(fields) => Ok(fields),
        other => Err(RemoteError::Decode(format!("expected an object, got {other}"))),
    }
}

/// Deserialize a document's fields.
pub fn from_fields<T: DeserializeOwned>(doc: &RemoteDoc) -> RemoteResult<T> {
    serde_json::from_value(Value::Object(doc.fields.clone())).map_err(|e| {
        RemoteError::Decode(format!("document {}: {e}", doc.remote_id))
    })
}

/// The local id a document shadows.
pub fn local_id_of(doc: &RemoteDoc) -> RemoteResult<LocalId> {
    doc.local_id
        .ok_or_else(|| RemoteError::Decode(format!("document {} has no localId", doc.remote_id)))
}

/// Sort documents ascending by `order`, ties broken by `localId`.
pub fn sort_docs(docs: &mut [RemoteDoc]) {
    docs.sort_by_key(|doc| (doc.i64_field("order").unwrap_or(i64::MAX), doc.local_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Shape {
        name: String,
        created_at: u64,
    }

    fn doc(remote_id: &str, local_id: Option<LocalId>, fields: Value) -> RemoteDoc {
        RemoteDoc {
            remote_id: remote_id.into(),
            local_id,
            fields: match fields {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    #[test]
    fn fields_round_trip() {
        let shape = Shape {
            name: "Trips".into(),
            created_at: 5,
        };
        let fields = to_fields(&shape).unwrap();
        assert_eq!(fields["createdAt"], json!(5));

        let parsed: Shape = from_fields(&doc("r", Some(1), Value::Object(fields))).unwrap();
        assert_eq!(parsed, shape);
    }

    #[test]
    fn scalars_are_not_fields() {
        assert!(matches!(to_fields(&3), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn missing_local_id() {
        assert!(local_id_of(&doc("r", None, json!({}))).is_err());
        assert_eq!(local_id_of(&doc("r", Some(4), json!({}))).unwrap(), 4);
    }

    #[test]
    fn sorts_by_order_then_local_id() {
        let mut docs = vec![
            doc("a", Some(3), json!({"order": 2})),
            doc("b", Some(2), json!({"order": 1})),
            doc("c", Some(1), json!({"order": 2})),
            doc("d", Some(4), json!({})),
        ];
        sort_docs(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }
}
