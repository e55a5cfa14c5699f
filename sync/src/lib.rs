//! # Folio Sync
//!
//! Cloud mirror overlay for the Folio local store.
//!
//! The local store stays the source of truth. When sync is enabled every
//! write lands locally first and is then mirrored to a [`RemoteStore`] in
//! the background. Reads prefer the remote and fall back to the local
//! store on any failure.
//!
//! ## Layers
//!
//! - [`remote`]: the remote document/blob store and its HTTP and in-memory
//!   implementations
//! - [`mirror`]: the [`MirrorClient`] with local-first writes and bulk push
//! - [`facade`]: the [`Portfolio`] API the application calls
//! - [`coordinator`]: the connectivity state machine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio_sync::{Portfolio, SyncConfig};
//!
//! # async fn run() -> folio_engine::Result<()> {
//! let config = SyncConfig::local_only("portfolio.redb")
//!     .with_remote("https://mirror.example.com");
//! let portfolio = Portfolio::open(&config)?;
//!
//! portfolio.enable_sync().await;
//! let album = portfolio.create_album("Summer").await?;
//! assert_eq!(portfolio.get_album(album).await.unwrap().name, "Summer");
//!
//! portfolio.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod facade;
pub mod mirror;
pub mod remote;
pub mod shapes;

pub use config::{ConfigError, SyncConfig};
pub use coordinator::{NetworkSignal, SyncCoordinator, SyncState, ViewSink, LIVE_COLLECTIONS};
pub use error::{RemoteError, RemoteResult};
pub use facade::{ImageCompressor, Passthrough, Portfolio, View, ViewContent};
pub use mirror::{MirrorClient, PushCounts, PushReport, SharedStore};
pub use remote::{Fields, HttpRemote, MemoryRemote, RemoteStore};
