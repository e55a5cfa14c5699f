//! Database operations for the blobs table.

use sqlx::{PgPool, Row};

use super::now_millis;

/// A stored blob row.
#[derive(Debug)]
pub struct StoredBlob {
    pub path: String,
    pub mime: String,
    pub data: Vec<u8>,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredBlob {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredBlob {
            path: row.try_get("path")?,
            mime: row.try_get("mime")?,
            data: row.try_get("data")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Store a blob, replacing any previous content at `path`.
pub async fn put_blob(pool: &PgPool, path: &str, mime: &str, data: &[u8]) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO blobs (path, mime, data, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (path) DO UPDATE SET
            mime = EXCLUDED.mime,
            data = EXCLUDED.data,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(path)
    .bind(mime)
    .bind(data)
    .bind(now_millis())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_blob(pool: &PgPool, path: &str) -> Result<Option<StoredBlob>, sqlx::Error> {
    sqlx::query_as::<_, StoredBlob>(
        "SELECT path, mime, data, updated_at FROM blobs WHERE path = $1",
    )
    .bind(path)
    .fetch_optional(pool)
    .await
}

/// Delete a blob. Returns false if it did not exist.
pub async fn delete_blob(pool: &PgPool, path: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM blobs WHERE path = $1")
        .bind(path)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
