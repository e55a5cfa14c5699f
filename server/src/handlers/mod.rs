//! Request handlers for documents, blobs and the change feed.

mod blobs;
mod changes;
mod documents;

pub use blobs::*;
pub use changes::*;
pub use documents::*;
