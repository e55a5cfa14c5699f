//! Database module for PostgreSQL persistence.

mod blobs;
mod documents;
mod pool;

pub use blobs::*;
pub use documents::*;
pub use pool::*;

/// Milliseconds since the Unix epoch, as stored in timestamp columns.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
