//! Database operations for the documents table.

use folio_engine::{CollectionKind, DocFilter, RemoteDoc};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};

use super::now_millis;

/// A stored document row from the database.
#[derive(Debug)]
pub struct StoredDocument {
    pub remote_id: String,
    pub collection: String,
    pub local_id: Option<i64>,
    pub body: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            remote_id: row.try_get("remote_id")?,
            collection: row.try_get("collection")?,
            local_id: row.try_get("local_id")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredDocument {
    /// Convert the row into the wire document.
    pub fn to_remote_doc(&self) -> RemoteDoc {
        let fields = match &self.body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        RemoteDoc {
            remote_id: self.remote_id.clone(),
            local_id: self.local_id.and_then(|id| u64::try_from(id).ok()),
            fields,
        }
    }
}

const COLUMNS: &str = "remote_id, collection, local_id, body, created_at, updated_at";

/// Insert a new document and return its generated remote id.
pub async fn insert_document(
    pool: &PgPool,
    collection: CollectionKind,
    local_id: Option<i64>,
    body: &Value,
) -> Result<String, sqlx::Error> {
    let remote_id = uuid::Uuid::new_v4().to_string();
    let now = now_millis();

    sqlx::query(
        r#"
        INSERT INTO documents (remote_id, collection, local_id, body, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(&remote_id)
    .bind(collection.table())
    .bind(local_id)
    .bind(body)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(remote_id)
}

/// Documents in a collection, optionally narrowed by an equality filter,
/// in insertion order.
pub async fn find_documents(
    pool: &PgPool,
    collection: CollectionKind,
    filter: Option<&DocFilter>,
) -> Result<Vec<StoredDocument>, sqlx::Error> {
    let query = match filter {
        None => format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 ORDER BY created_at, remote_id"
        ),
        Some(DocFilter::LocalId(_)) => format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND local_id = $2 \
             ORDER BY created_at, remote_id"
        ),
        Some(DocFilter::AlbumId(_)) => format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND body->>'albumId' = $2 \
             ORDER BY created_at, remote_id"
        ),
        Some(DocFilter::Key(_)) => format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND body->>'key' = $2 \
             ORDER BY created_at, remote_id"
        ),
    };

    let mut query = sqlx::query_as::<_, StoredDocument>(&query).bind(collection.table());
    query = match filter {
        None => query,
        Some(DocFilter::LocalId(id)) => query.bind(i64::try_from(*id).unwrap_or(i64::MAX)),
        Some(DocFilter::AlbumId(id)) => query.bind(id.to_string()),
        Some(DocFilter::Key(key)) => query.bind(key.clone()),
    };
    query.fetch_all(pool).await
}

/// Merge `patch` into a document's body. Returns false if it does not exist.
pub async fn merge_document(
    pool: &PgPool,
    collection: CollectionKind,
    remote_id: &str,
    patch: &Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET body = body || $3, updated_at = $4
        WHERE collection = $1 AND remote_id = $2
        "#,
    )
    .bind(collection.table())
    .bind(remote_id)
    .bind(patch)
    .bind(now_millis())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a document. Returns false if it did not exist.
pub async fn delete_document(
    pool: &PgPool,
    collection: CollectionKind,
    remote_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND remote_id = $2")
        .bind(collection.table())
        .bind(remote_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
