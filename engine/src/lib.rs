//! # Folio Engine
//!
//! The local-first persistence core of a personal portfolio.
//!
//! This crate holds the source of truth for a portfolio site: site-wide
//! image assets, photo albums, PDF essays and embedded videos. Everything
//! works without a network; mirroring to a cloud backend lives in
//! `folio-sync` and builds on the types defined here.
//!
//! ## Design Principles
//!
//! - **Local first**: every operation succeeds or fails against local storage alone
//! - **Atomic writes**: each operation is one [`WriteBatch`]; a failed commit changes nothing
//! - **Injected time**: timestamps come from a [`Clock`], so tests are deterministic
//! - **Pluggable storage**: any [`Backend`] (in-memory, redb, ...) can hold the data
//!
//! ## Core Concepts
//!
//! ### Collections
//!
//! Albums, photos, essays and videos are ordered collections keyed by an
//! auto-incrementing [`LocalId`]. A new record goes to the end of its scope
//! (photos are scoped to their album). Reordering assigns each listed id its
//! 0-based position.
//!
//! ### Assets
//!
//! Three singleton image slots ([`AssetKey`]) that are only ever upserted.
//!
//! ### Export / Import
//!
//! [`Store::export_all`] produces a version-tagged [`ExportDocument`] with
//! every blob inlined as a data URL. [`Store::import_all`] replaces the whole
//! store with a document's contents, after checking its version.
//!
//! ## Quick Start
//!
//! ```rust
//! use folio_engine::{Blob, ManualClock, MemoryBackend, Store};
//! use std::sync::Arc;
//!
//! // 1. Open a store
//! let mut store = Store::open(MemoryBackend::new(), Arc::new(ManualClock::new(1_000))).unwrap();
//!
//! // 2. Create an album and add a photo to it
//! let album = store.create_album("Travel").unwrap();
//! store
//!     .add_photo(album, Blob::new(b"\x89PNG".to_vec(), "image/png"))
//!     .unwrap();
//!
//! // 3. Add a video by URL
//! let video = store.add_video("https://youtu.be/dQw4w9WgXcQ").unwrap();
//! assert_eq!(store.get_video(video).unwrap().embed_id, "dQw4w9WgXcQ");
//!
//! // 4. Export and restore
//! let json = store.export_all().to_json().unwrap();
//! let doc = folio_engine::ExportDocument::from_json(&json).unwrap();
//! let report = store.import_all(doc).unwrap();
//! assert_eq!(report.photos, 1);
//! ```

pub mod backend;
pub mod clock;
pub mod codec;
pub mod collection;
pub mod error;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod video;
pub mod wire;

// Re-export main types at crate root
pub use backend::{Backend, MemoryBackend, RedbBackend, WriteBatch, WriteOp};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::Collection;
pub use error::{Error, Result};
pub use record::{Album, Asset, AssetKey, Blob, Essay, Photo, Video};
pub use schema::{CollectionKind, Entity, SCHEMA_VERSION};
pub use snapshot::{ExportDocument, ExportSummary, ImportReport, SkippedItem};
pub use store::{Store, StoreStats};
pub use video::{parse_video_url, Provider, VideoRef};
pub use wire::{
    BlobUploaded, ChangeEvent, ChangeKind, ClientMessage, DocCreated, DocFilter, RemoteDoc,
    ServerMessage,
};

/// Type aliases for clarity
pub type LocalId = u64;
pub type RemoteId = String;
pub type Order = i64;
pub type Timestamp = u64;
pub type SchemaVersion = u32;
