//! Blob storage handlers.

use sqlx::PgPool;

use crate::config::Config;
use crate::db::{self, StoredBlob};
use crate::error::{AppError, Result};
use folio_engine::BlobUploaded;

/// Fallback content type for uploads without one.
pub const DEFAULT_CONTENT_TYPE: &str = folio_engine::codec::DEFAULT_MIME;

/// Reject empty paths and paths that try to climb out of the namespace.
pub fn validate_blob_path(path: &str) -> Result<&str> {
    let path = path.trim_matches('/');
    if path.is_empty() || path.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(AppError::BadRequest(format!("invalid blob path: {path:?}")));
    }
    Ok(path)
}

pub async fn handle_upload(
    pool: &PgPool,
    config: &Config,
    path: &str,
    mime: Option<&str>,
    data: &[u8],
) -> Result<BlobUploaded> {
    let path = validate_blob_path(path)?;
    if data.len() > config.max_blob_bytes {
        return Err(AppError::PayloadTooLarge {
            size: data.len(),
            limit: config.max_blob_bytes,
        });
    }

    let mime = mime.unwrap_or(DEFAULT_CONTENT_TYPE);
    db::put_blob(pool, path, mime, data).await?;

    tracing::debug!(path, mime, size = data.len(), "blob stored");
    Ok(BlobUploaded {
        download_url: config.download_url(path),
    })
}

pub async fn handle_download(pool: &PgPool, path: &str) -> Result<StoredBlob> {
    let path = validate_blob_path(path)?;
    db::get_blob(pool, path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("blob {path}")))
}

pub async fn handle_blob_delete(pool: &PgPool, path: &str) -> Result<()> {
    let path = validate_blob_path(path)?;
    if !db::delete_blob(pool, path).await? {
        return Err(AppError::NotFound(format!("blob {path}")));
    }
    Ok(())
}
