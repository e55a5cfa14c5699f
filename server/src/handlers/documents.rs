//! Document collection handlers.

use folio_engine::{CollectionKind, DocCreated, DocFilter, RemoteDoc};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::db;
use crate::error::{AppError, Result};

/// Equality filters accepted by `GET /v1/collections/{collection}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocQuery {
    pub local_id: Option<u64>,
    pub album_id: Option<u64>,
    pub key: Option<String>,
}

impl DocQuery {
    /// The single filter this query asks for, if any.
    pub fn filter(self) -> Result<Option<DocFilter>> {
        let filters: Vec<DocFilter> = [
            self.local_id.map(DocFilter::LocalId),
            self.album_id.map(DocFilter::AlbumId),
            self.key.map(DocFilter::Key),
        ]
        .into_iter()
        .flatten()
        .collect();

        match filters.len() {
            0 | 1 => Ok(filters.into_iter().next()),
            _ => Err(AppError::BadRequest(
                "at most one of localId, albumId, key may be given".into(),
            )),
        }
    }
}

/// Parse a collection name from the request path.
pub fn parse_collection(name: &str) -> Result<CollectionKind> {
    name.parse().map_err(AppError::BadRequest)
}

/// Split a posted document into its `localId` and stored body.
pub fn split_document(body: Value) -> Result<(Option<i64>, Value)> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::BadRequest("document must be a JSON object".into()));
    };
    fields.remove("remoteId");

    let local_id = match fields.remove("localId") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let id = value
                .as_u64()
                .and_then(|id| i64::try_from(id).ok())
                .ok_or_else(|| AppError::BadRequest(format!("invalid localId: {value}")))?;
            Some(id)
        }
    };

    Ok((local_id, Value::Object(fields)))
}

/// Strip correlation fields from a patch; they cannot be changed.
pub fn clean_patch(patch: Value) -> Result<Value> {
    let Value::Object(fields) = patch else {
        return Err(AppError::BadRequest("patch must be a JSON object".into()));
    };
    let fields: Map<String, Value> = fields
        .into_iter()
        .filter(|(name, _)| name != "remoteId" && name != "localId")
        .collect();
    Ok(Value::Object(fields))
}

/// Sort documents ascending by `order`, ties broken by `localId`.
pub fn sort_documents(docs: &mut [RemoteDoc]) {
    docs.sort_by_key(|doc| (doc.i64_field("order").unwrap_or(i64::MAX), doc.local_id));
}

pub async fn handle_list(
    pool: &PgPool,
    collection: CollectionKind,
    query: DocQuery,
) -> Result<Vec<RemoteDoc>> {
    let filter = query.filter()?;
    let stored = db::find_documents(pool, collection, filter.as_ref()).await?;

    let mut docs: Vec<RemoteDoc> = stored.iter().map(db::StoredDocument::to_remote_doc).collect();
    sort_documents(&mut docs);
    Ok(docs)
}

pub async fn handle_create(
    pool: &PgPool,
    collection: CollectionKind,
    body: Value,
) -> Result<DocCreated> {
    let (local_id, body) = split_document(body)?;
    let remote_id = db::insert_document(pool, collection, local_id, &body).await?;

    tracing::debug!(collection = %collection, remote_id = %remote_id, local_id, "document created");
    Ok(DocCreated { remote_id })
}

pub async fn handle_update(
    pool: &PgPool,
    collection: CollectionKind,
    remote_id: &str,
    patch: Value,
) -> Result<()> {
    let patch = clean_patch(patch)?;
    if !db::merge_document(pool, collection, remote_id, &patch).await? {
        return Err(AppError::NotFound(format!("{collection} document {remote_id}")));
    }
    Ok(())
}

pub async fn handle_delete(pool: &PgPool, collection: CollectionKind, remote_id: &str) -> Result<()> {
    if !db::delete_document(pool, collection, remote_id).await? {
        return Err(AppError::NotFound(format!("{collection} document {remote_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_filters() {
        assert_eq!(DocQuery::default().filter().unwrap(), None);

        let query = DocQuery {
            album_id: Some(3),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap(), Some(DocFilter::AlbumId(3)));

        let query = DocQuery {
            local_id: Some(1),
            key: Some("headerLogo".into()),
            ..Default::default()
        };
        assert!(matches!(query.filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn unknown_collection_is_bad_request() {
        assert_eq!(parse_collection("videos").unwrap(), CollectionKind::Videos);
        assert!(matches!(parse_collection("todos"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn split_extracts_local_id() {
        let (local_id, body) =
            split_document(json!({"remoteId": "x", "localId": 7, "name": "Trips"})).unwrap();
        assert_eq!(local_id, Some(7));
        assert_eq!(body, json!({"name": "Trips"}));

        let (local_id, _) = split_document(json!({"key": "headerLogo"})).unwrap();
        assert_eq!(local_id, None);
    }

    #[test]
    fn split_rejects_bad_input() {
        assert!(split_document(json!([1])).is_err());
        assert!(split_document(json!({"localId": "seven"})).is_err());
        assert!(split_document(json!({"localId": -1})).is_err());
    }

    #[test]
    fn patch_cannot_change_correlation() {
        let patch = clean_patch(json!({"localId": 9, "remoteId": "y", "order": 2})).unwrap();
        assert_eq!(patch, json!({"order": 2}));
    }

    #[test]
    fn documents_sorted_by_order_then_local_id() {
        let doc = |remote_id: &str, local_id: u64, order: i64| RemoteDoc {
            remote_id: remote_id.into(),
            local_id: Some(local_id),
            fields: json!({"order": order}).as_object().cloned().unwrap(),
        };
        let mut docs = vec![doc("a", 3, 1), doc("b", 1, 2), doc("c", 2, 1)];
        sort_documents(&mut docs);

        let ids: Vec<_> = docs.iter().map(|d| d.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
