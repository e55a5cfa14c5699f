//! Application facade.
//!
//! One method per logical operation. With sync enabled each call goes to the
//! [`MirrorClient`]; otherwise it goes straight to the local store.

use crate::config::SyncConfig;
use crate::mirror::{MirrorClient, PushReport, SharedStore};
use crate::remote::{HttpRemote, RemoteStore};
use folio_engine::{
    Album, Asset, AssetKey, Blob, Essay, ExportDocument, ImportReport, LocalId, Photo,
    RedbBackend, Result, Store, StoreStats, SystemClock, Video,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shrinks photos before they are stored.
pub trait ImageCompressor: Send + Sync {
    fn compress(&self, blob: Blob) -> Blob;
}

/// Stores images unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ImageCompressor for Passthrough {
    fn compress(&self, blob: Blob) -> Blob {
        blob
    }
}

/// A screen of the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Albums,
    Album(LocalId),
    Essays,
    Videos,
}

/// The records a view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewContent {
    Assets(Vec<Asset>),
    Albums(Vec<Album>),
    Photos(Vec<Photo>),
    Essays(Vec<Essay>),
    Videos(Vec<Video>),
}

/// The portfolio: local store, optional mirror, collaborators.
pub struct Portfolio {
    store: SharedStore,
    mirror: Option<MirrorClient>,
    compressor: Arc<dyn ImageCompressor>,
    unload_timeout: Duration,
}

impl Portfolio {
    /// A portfolio without a remote.
    pub fn local(store: Store) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            mirror: None,
            compressor: Arc::new(Passthrough),
            unload_timeout: Duration::from_secs(2),
        }
    }

    /// A portfolio that can mirror to `remote`. Sync starts disabled.
    pub fn with_remote(store: Store, remote: Arc<dyn RemoteStore>, probe_timeout: Duration) -> Self {
        let store = Arc::new(RwLock::new(store));
        let mirror = MirrorClient::new(Arc::clone(&store), remote, probe_timeout);
        Self {
            store,
            mirror: Some(mirror),
            compressor: Arc::new(Passthrough),
            unload_timeout: Duration::from_secs(2),
        }
    }

    /// Open the file-backed store and, if configured, the HTTP remote.
    pub fn open(config: &SyncConfig) -> Result<Self> {
        let backend = RedbBackend::open_with_quota(&config.data_path, config.quota_bytes)?;
        let store = Store::open(backend, Arc::new(SystemClock))?;

        let remote = config.remote_url.as_deref().and_then(|url| {
            match HttpRemote::new(url, config.request_timeout) {
                Ok(remote) => Some(remote),
                Err(e) => {
                    warn!(url, error = %e, "could not build remote client, staying local");
                    None
                }
            }
        });

        let portfolio = match remote {
            Some(remote) => Self::with_remote(store, Arc::new(remote), config.probe_timeout),
            None => Self::local(store),
        };
        info!(path = %config.data_path.display(), remote = portfolio.mirror.is_some(), "portfolio opened");
        Ok(portfolio.with_unload_timeout(config.unload_timeout))
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn ImageCompressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout = timeout;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn mirror(&self) -> Option<&MirrorClient> {
        self.mirror.as_ref()
    }

    /// The mirror, if sync is currently enabled.
    fn active(&self) -> Option<&MirrorClient> {
        self.mirror.as_ref().filter(|mirror| mirror.is_enabled())
    }

    // ------------------------------------------------------------------
    // Sync control
    // ------------------------------------------------------------------

    /// Try to turn sync on. False without a remote or when the probe fails.
    pub async fn enable_sync(&self) -> bool {
        match &self.mirror {
            Some(mirror) => mirror.enable_sync().await,
            None => false,
        }
    }

    pub fn disable_sync(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.disable_sync();
        }
    }

    pub fn sync_enabled(&self) -> bool {
        self.active().is_some()
    }

    /// Wait for in-flight mirror tasks, at most the unload timeout.
    pub async fn shutdown(&self) -> bool {
        self.shutdown_within(self.unload_timeout).await
    }

    pub async fn shutdown_within(&self, limit: Duration) -> bool {
        match &self.mirror {
            Some(mirror) => mirror.flush(limit).await,
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    pub async fn create_album(&self, name: &str) -> Result<LocalId> {
        match self.active() {
            Some(mirror) => mirror.create_album(name).await,
            None => self.store.write().await.create_album(name),
        }
    }

    pub async fn list_albums(&self) -> Vec<Album> {
        match self.active() {
            Some(mirror) => mirror.list_albums().await,
            None => self.store.read().await.list_albums(),
        }
    }

    pub async fn get_album(&self, id: LocalId) -> Option<Album> {
        self.store.read().await.get_album(id).cloned()
    }

    pub async fn rename_album(&self, id: LocalId, name: &str) -> Result<Album> {
        match self.active() {
            Some(mirror) => mirror.rename_album(id, name).await,
            None => self.store.write().await.rename_album(id, name),
        }
    }

    pub async fn delete_album(&self, id: LocalId) -> Result<()> {
        match self.active() {
            Some(mirror) => mirror.delete_album(id).await,
            None => self.store.write().await.delete_album(id),
        }
    }

    pub async fn reorder_albums(&self, ids: &[LocalId]) -> Result<usize> {
        match self.active() {
            Some(mirror) => mirror.reorder_albums(ids).await,
            None => self.store.write().await.reorder_albums(ids),
        }
    }

    // ------------------------------------------------------------------
    // Photos
    // ------------------------------------------------------------------

    /// Compress and add a photo to an album.
    pub async fn add_photo(&self, album_id: LocalId, blob: Blob) -> Result<LocalId> {
        let blob = self.compressor.compress(blob);
        match self.active() {
            Some(mirror) => mirror.add_photo(album_id, blob).await,
            None => self.store.write().await.add_photo(album_id, blob),
        }
    }

    pub async fn list_photos(&self, album_id: LocalId) -> Vec<Photo> {
        self.store.read().await.list_photos(album_id)
    }

    pub async fn get_photo(&self, id: LocalId) -> Option<Photo> {
        self.store.read().await.get_photo(id).cloned()
    }

    pub async fn album_cover(&self, album_id: LocalId) -> Option<Photo> {
        self.store.read().await.album_cover(album_id)
    }

    pub async fn photo_count(&self, album_id: LocalId) -> usize {
        self.store.read().await.photo_count(album_id)
    }

    pub async fn delete_photo(&self, id: LocalId) -> Result<()> {
        match self.active() {
            Some(mirror) => mirror.delete_photo(id).await,
            None => self.store.write().await.delete_photo(id),
        }
    }

    pub async fn reorder_photos(&self, album_id: LocalId, ids: &[LocalId]) -> Result<usize> {
        match self.active() {
            Some(mirror) => mirror.reorder_photos(album_id, ids).await,
            None => self.store.write().await.reorder_photos(album_id, ids),
        }
    }

    // ------------------------------------------------------------------
    // Essays
    // ------------------------------------------------------------------

    pub async fn add_essay(&self, title: &str, blob: Blob) -> Result<LocalId> {
        match self.active() {
            Some(mirror) => mirror.add_essay(title, blob).await,
            None => self.store.write().await.add_essay(title, blob),
        }
    }

    pub async fn list_essays(&self) -> Vec<Essay> {
        match self.active() {
            Some(mirror) => mirror.list_essays().await,
            None => self.store.read().await.list_essays(),
        }
    }

    pub async fn get_essay(&self, id: LocalId) -> Option<Essay> {
        self.store.read().await.get_essay(id).cloned()
    }

    pub async fn rename_essay(&self, id: LocalId, title: &str) -> Result<Essay> {
        match self.active() {
            Some(mirror) => mirror.rename_essay(id, title).await,
            None => self.store.write().await.rename_essay(id, title),
        }
    }

    pub async fn delete_essay(&self, id: LocalId) -> Result<()> {
        match self.active() {
            Some(mirror) => mirror.delete_essay(id).await,
            None => self.store.write().await.delete_essay(id),
        }
    }

    pub async fn reorder_essays(&self, ids: &[LocalId]) -> Result<usize> {
        match self.active() {
            Some(mirror) => mirror.reorder_essays(ids).await,
            None => self.store.write().await.reorder_essays(ids),
        }
    }

    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    pub async fn add_video(&self, url: &str) -> Result<LocalId> {
        match self.active() {
            Some(mirror) => mirror.add_video(url).await,
            None => self.store.write().await.add_video(url),
        }
    }

    pub async fn list_videos(&self) -> Vec<Video> {
        match self.active() {
            Some(mirror) => mirror.list_videos().await,
            None => self.store.read().await.list_videos(),
        }
    }

    pub async fn get_video(&self, id: LocalId) -> Option<Video> {
        self.store.read().await.get_video(id).cloned()
    }

    pub async fn rename_video(&self, id: LocalId, title: &str) -> Result<Video> {
        match self.active() {
            Some(mirror) => mirror.rename_video(id, title).await,
            None => self.store.write().await.rename_video(id, title),
        }
    }

    pub async fn delete_video(&self, id: LocalId) -> Result<()> {
        match self.active() {
            Some(mirror) => mirror.delete_video(id).await,
            None => self.store.write().await.delete_video(id),
        }
    }

    pub async fn reorder_videos(&self, ids: &[LocalId]) -> Result<usize> {
        match self.active() {
            Some(mirror) => mirror.reorder_videos(ids).await,
            None => self.store.write().await.reorder_videos(ids),
        }
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    pub async fn put_asset(&self, key: AssetKey, blob: Blob) -> Result<Asset> {
        match self.active() {
            Some(mirror) => mirror.put_asset(key, blob).await,
            None => self.store.write().await.put_asset(key, blob),
        }
    }

    pub async fn get_asset(&self, key: AssetKey) -> Option<Asset> {
        match self.active() {
            Some(mirror) => mirror.get_asset(key).await,
            None => self.store.read().await.get_asset(key).cloned(),
        }
    }

    pub async fn list_assets(&self) -> Vec<Asset> {
        self.store.read().await.list_assets()
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    pub async fn export_all(&self) -> ExportDocument {
        self.store.read().await.export_all()
    }

    /// Replace the local store with `doc`, then push it if sync is on.
    pub async fn import_all(&self, doc: ExportDocument) -> Result<ImportReport> {
        let report = self.store.write().await.import_all(doc)?;
        if let Some(mirror) = self.active() {
            let pushed: PushReport = mirror.bulk_push().await;
            info!(
                pushed = pushed.pushed(),
                failed = pushed.failed(),
                "pushed imported records"
            );
        }
        Ok(report)
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.write().await.clear_all()
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.read().await.stats()
    }

    /// Load what `view` shows.
    pub async fn load_view(&self, view: View) -> ViewContent {
        match view {
            View::Home => {
                let mut assets = Vec::with_capacity(AssetKey::ALL.len());
                for key in AssetKey::ALL {
                    if let Some(asset) = self.get_asset(key).await {
                        assets.push(asset);
                    }
                }
                ViewContent::Assets(assets)
            }
            View::Albums => ViewContent::Albums(self.list_albums().await),
            View::Album(id) => ViewContent::Photos(self.list_photos(id).await),
            View::Essays => ViewContent::Essays(self.list_essays().await),
            View::Videos => ViewContent::Videos(self.list_videos().await),
        }
    }
}
