//! Remote Mirror Client.
//!
//! Wraps the local store and shadows every write to a [`RemoteStore`].
//! The local write always happens first and decides the result; the remote
//! copy is made in the background and its failures are only logged.
//!
//! Remote work runs on a single queue, one job at a time, in the order the
//! local writes happened. A rename or delete therefore never overtakes the
//! insert that created the shadow it targets.
//!
//! Reads of albums, essays, videos and assets go to the remote first while
//! sync is enabled and fall back to the local store on any remote error.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{to_fields, Fields, RemoteStore};
use crate::shapes::{
    self, asset_path, essay_path, photo_path, AlbumDoc, AssetDoc, EssayDoc, PhotoDoc, VideoDoc,
};
use folio_engine::{
    Album, Asset, AssetKey, Blob, ChangeEvent, CollectionKind, DocFilter, Essay, LocalId, Order,
    Photo, Result, Store, Video,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

/// The local store shared between the facade, the mirror and its tasks.
pub type SharedStore = Arc<RwLock<Store>>;

/// Outcome of a bulk push for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCounts {
    /// Shadows created by this push
    pub pushed: usize,
    /// Records that already had a shadow
    pub present: usize,
    pub failed: usize,
}

/// Outcome of a bulk push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub collections: BTreeMap<CollectionKind, PushCounts>,
}

impl PushReport {
    fn entry(&mut self, kind: CollectionKind) -> &mut PushCounts {
        self.collections.entry(kind).or_default()
    }

    pub fn get(&self, kind: CollectionKind) -> PushCounts {
        self.collections.get(&kind).copied().unwrap_or_default()
    }

    pub fn pushed(&self) -> usize {
        self.collections.values().map(|c| c.pushed).sum()
    }

    pub fn present(&self) -> usize {
        self.collections.values().map(|c| c.present).sum()
    }

    pub fn failed(&self) -> usize {
        self.collections.values().map(|c| c.failed).sum()
    }
}

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Inner {
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    enabled: AtomicBool,
    probe_timeout: Duration,
    /// Started on the first mirrored write.
    queue: OnceLock<mpsc::UnboundedSender<Job>>,
    pending: Arc<AtomicUsize>,
}

/// Run queued jobs one after another until every sender is gone.
fn start_worker() -> mpsc::UnboundedSender<Job> {
    let (sender, mut jobs) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            job.await;
        }
        debug!("mirror queue closed");
    });
    sender
}

/// Local store plus best-effort remote shadowing.
#[derive(Clone)]
pub struct MirrorClient {
    inner: Arc<Inner>,
}

impl MirrorClient {
    pub fn new(store: SharedStore, remote: Arc<dyn RemoteStore>, probe_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                enabled: AtomicBool::new(false),
                probe_timeout,
                queue: OnceLock::new(),
                pending: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.inner.remote)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Sync control
    // ------------------------------------------------------------------

    /// Probe the remote and, if it answers in time, turn sync on and push
    /// every local record that has no shadow yet.
    ///
    /// Returns false (and leaves sync off) when the probe fails.
    pub async fn enable_sync(&self) -> bool {
        let probe = tokio::time::timeout(self.inner.probe_timeout, self.inner.remote.probe()).await;
        let failure = match probe {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(RemoteError::Timeout(self.inner.probe_timeout)),
        };
        if let Some(e) = failure {
            warn!(error = %e, "remote probe failed, sync stays disabled");
            return false;
        }

        self.inner.enabled.store(true, Ordering::SeqCst);
        let report = self.bulk_push().await;
        info!(
            pushed = report.pushed(),
            present = report.present(),
            failed = report.failed(),
            "sync enabled"
        );
        true
    }

    pub fn disable_sync(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
        debug!("sync disabled");
    }

    /// Push every local record without a shadow. Safe to repeat.
    pub async fn bulk_push(&self) -> PushReport {
        let (assets, albums, photos, essays, videos) = {
            let store = self.inner.store.read().await;
            let albums = store.list_albums();
            let photos: Vec<Photo> = albums
                .iter()
                .flat_map(|album| store.list_photos(album.id))
                .collect();
            (
                store.list_assets(),
                albums,
                photos,
                store.list_essays(),
                store.list_videos(),
            )
        };

        let remote = self.remote();
        let remote = remote.as_ref();
        let mut report = PushReport::default();

        for asset in &assets {
            let counts = report.entry(CollectionKind::Assets);
            let existing = remote
                .find(CollectionKind::Assets, &DocFilter::Key(asset.key.to_string()))
                .await;
            match existing {
                Ok(docs) if !docs.is_empty() => counts.present += 1,
                Ok(_) => match upsert_asset(remote, asset).await {
                    Ok(()) => counts.pushed += 1,
                    Err(e) => {
                        warn!(key = %asset.key, error = %e, "could not push asset");
                        counts.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(key = %asset.key, error = %e, "could not look up asset shadow");
                    counts.failed += 1;
                }
            }
        }

        for album in &albums {
            push_record(remote, &mut report, CollectionKind::Albums, album.id, || {
                insert_album(remote, album)
            })
            .await;
        }
        for photo in &photos {
            push_record(remote, &mut report, CollectionKind::Photos, photo.id, || {
                insert_photo(remote, photo)
            })
            .await;
        }
        for essay in &essays {
            push_record(remote, &mut report, CollectionKind::Essays, essay.id, || {
                insert_essay(remote, essay)
            })
            .await;
        }
        for video in &videos {
            push_record(remote, &mut report, CollectionKind::Videos, video.id, || {
                insert_video(remote, video)
            })
            .await;
        }

        report
    }

    /// Wait up to `limit` for queued mirror jobs. Returns false if some
    /// were still waiting; the queue keeps draining in the background.
    pub async fn flush(&self, limit: Duration) -> bool {
        let Some(queue) = self.inner.queue.get() else {
            return true;
        };
        if self.pending_tasks() == 0 {
            return true;
        }

        let (done, drained) = oneshot::channel();
        let barrier: Job = Box::pin(async move {
            let _ = done.send(());
        });
        if queue.send(barrier).is_err() {
            return true;
        }

        match tokio::time::timeout(limit, drained).await {
            Ok(_) => true,
            Err(_) => {
                warn!(pending = self.pending_tasks(), ?limit, "gave up waiting for remote mirror jobs");
                false
            }
        }
    }

    /// Mirror jobs queued or running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub async fn subscribe(
        &self,
        kind: CollectionKind,
    ) -> RemoteResult<broadcast::Receiver<ChangeEvent>> {
        self.inner.remote.subscribe(kind).await
    }

    /// Queue `task` behind earlier mirror jobs if sync is enabled, logging
    /// its failure.
    async fn enqueue<F>(&self, operation: &'static str, task: F)
    where
        F: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        if !self.is_enabled() {
            return;
        }

        let pending = Arc::clone(&self.inner.pending);
        let job: Job = Box::pin(async move {
            match task.await {
                Ok(()) => debug!(operation, "mirrored"),
                Err(e) => warn!(operation, error = %e, "remote mirror failed"),
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        });

        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let queue = self.inner.queue.get_or_init(start_worker);
        if queue.send(job).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(operation, "mirror queue closed, dropping remote write");
        }
    }

    async fn enqueue_update(&self, operation: &'static str, kind: CollectionKind, id: LocalId, patch: Fields) {
        let remote = self.remote();
        self.enqueue(operation, async move {
            update_shadows(remote.as_ref(), kind, id, patch).await
        })
        .await;
    }

    async fn enqueue_reorder(&self, kind: CollectionKind, orders: Vec<(LocalId, Order)>) {
        let remote = self.remote();
        self.enqueue("reorder", async move {
            for (id, order) in orders {
                if let Err(e) = update_shadows(remote.as_ref(), kind, id, patch("order", order)).await {
                    warn!(collection = %kind, local_id = id, error = %e, "could not mirror order");
                }
            }
            Ok(())
        })
        .await;
    }

    /// Read remotely when enabled, falling back to `local` on any failure.
    async fn read_through<T, R, L>(&self, collection: CollectionKind, remote: R, local: L) -> T
    where
        R: Future<Output = RemoteResult<T>>,
        L: FnOnce(&Store) -> T,
    {
        if self.is_enabled() {
            match remote.await {
                Ok(value) => return value,
                Err(e) => warn!(collection = %collection, error = %e, "remote read failed, using local store"),
            }
        }
        local(&*self.inner.store.read().await)
    }

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    pub async fn create_album(&self, name: &str) -> Result<LocalId> {
        let album = {
            let mut store = self.inner.store.write().await;
            let id = store.create_album(name)?;
            store.get_album(id).cloned()
        };
        let Some(album) = album else {
            return Err(folio_engine::Error::Storage("album vanished after create".into()));
        };

        let remote = self.remote();
        let id = album.id;
        self.enqueue("create_album", async move {
            insert_album(remote.as_ref(), &album).await
        })
        .await;
        Ok(id)
    }

    pub async fn list_albums(&self) -> Vec<Album> {
        self.read_through(CollectionKind::Albums, self.remote_albums(), Store::list_albums)
            .await
    }

    async fn remote_albums(&self) -> RemoteResult<Vec<Album>> {
        let docs = self.inner.remote.list(CollectionKind::Albums).await?;
        docs.iter()
            .map(|doc| {
                let (id, shape) = shapes::decode::<AlbumDoc>(doc)?;
                Ok(shape.into_album(id))
            })
            .collect()
    }

    pub async fn rename_album(&self, id: LocalId, name: &str) -> Result<Album> {
        let album = self.inner.store.write().await.rename_album(id, name)?;
        self.enqueue_update("rename_album", CollectionKind::Albums, id, patch("name", name))
            .await;
        Ok(album)
    }

    /// Delete an album and its photos locally, then remotely.
    pub async fn delete_album(&self, id: LocalId) -> Result<()> {
        self.inner.store.write().await.delete_album(id)?;

        let remote = self.remote();
        self.enqueue("delete_album", async move {
            let remote = remote.as_ref();
            delete_shadows(remote, CollectionKind::Albums, &DocFilter::LocalId(id)).await?;

            let photos = remote
                .find(CollectionKind::Photos, &DocFilter::AlbumId(id))
                .await?;
            for doc in photos {
                if let Err(e) = remote.delete(CollectionKind::Photos, &doc.remote_id).await {
                    warn!(album_id = id, remote_id = %doc.remote_id, error = %e, "could not delete photo shadow");
                    continue;
                }
                if let Some(photo_id) = doc.local_id {
                    delete_blob_quietly(remote, &photo_path(id, photo_id)).await;
                }
            }
            Ok(())
        })
        .await;
        Ok(())
    }

    pub async fn reorder_albums(&self, ids: &[LocalId]) -> Result<usize> {
        let (moved, orders) = {
            let mut store = self.inner.store.write().await;
            let moved = store.reorder_albums(ids)?;
            let orders = ids
                .iter()
                .filter_map(|id| store.get_album(*id).map(|a| (a.id, a.order)))
                .collect();
            (moved, orders)
        };
        self.enqueue_reorder(CollectionKind::Albums, orders).await;
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Photos
    // ------------------------------------------------------------------

    pub async fn add_photo(&self, album_id: LocalId, blob: Blob) -> Result<LocalId> {
        let photo = {
            let mut store = self.inner.store.write().await;
            let id = store.add_photo(album_id, blob)?;
            store.get_photo(id).cloned()
        };
        let Some(photo) = photo else {
            return Err(folio_engine::Error::Storage("photo vanished after create".into()));
        };

        let remote = self.remote();
        let id = photo.id;
        self.enqueue("add_photo", async move {
            insert_photo(remote.as_ref(), &photo).await
        })
        .await;
        Ok(id)
    }

    pub async fn delete_photo(&self, id: LocalId) -> Result<()> {
        let album_id = {
            let mut store = self.inner.store.write().await;
            let album_id = store.get_photo(id).map(|p| p.album_id);
            store.delete_photo(id)?;
            album_id
        };

        let remote = self.remote();
        self.enqueue("delete_photo", async move {
            let remote = remote.as_ref();
            delete_shadows(remote, CollectionKind::Photos, &DocFilter::LocalId(id)).await?;
            if let Some(album_id) = album_id {
                delete_blob_quietly(remote, &photo_path(album_id, id)).await;
            }
            Ok(())
        })
        .await;
        Ok(())
    }

    pub async fn reorder_photos(&self, album_id: LocalId, ids: &[LocalId]) -> Result<usize> {
        let (moved, orders) = {
            let mut store = self.inner.store.write().await;
            let moved = store.reorder_photos(album_id, ids)?;
            let orders = ids
                .iter()
                .filter_map(|id| store.get_photo(*id))
                .filter(|p| p.album_id == album_id)
                .map(|p| (p.id, p.order))
                .collect();
            (moved, orders)
        };
        self.enqueue_reorder(CollectionKind::Photos, orders).await;
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Essays
    // ------------------------------------------------------------------

    pub async fn add_essay(&self, title: &str, blob: Blob) -> Result<LocalId> {
        let essay = {
            let mut store = self.inner.store.write().await;
            let id = store.add_essay(title, blob)?;
            store.get_essay(id).cloned()
        };
        let Some(essay) = essay else {
            return Err(folio_engine::Error::Storage("essay vanished after create".into()));
        };

        let remote = self.remote();
        let id = essay.id;
        self.enqueue("add_essay", async move {
            insert_essay(remote.as_ref(), &essay).await
        })
        .await;
        Ok(id)
    }

    pub async fn list_essays(&self) -> Vec<Essay> {
        self.read_through(CollectionKind::Essays, self.remote_essays(), Store::list_essays)
            .await
    }

    /// Remote essays, with content taken from the local copy when there is
    /// one and downloaded otherwise.
    async fn remote_essays(&self) -> RemoteResult<Vec<Essay>> {
        let docs = self.inner.remote.list(CollectionKind::Essays).await?;
        let mut essays = Vec::with_capacity(docs.len());

        for doc in &docs {
            let (id, shape) = shapes::decode::<EssayDoc>(doc)?;
            let cached = self
                .inner
                .store
                .read()
                .await
                .get_essay(id)
                .map(|essay| essay.blob.clone());
            let blob = match cached {
                Some(blob) => blob,
                None => {
                    let mut blob = self.inner.remote.download_blob(&shape.download_url).await?;
                    blob.mime = shape.mime.clone();
                    blob
                }
            };
            essays.push(shape.into_essay(id, blob));
        }
        Ok(essays)
    }

    pub async fn rename_essay(&self, id: LocalId, title: &str) -> Result<Essay> {
        let essay = self.inner.store.write().await.rename_essay(id, title)?;
        self.enqueue_update("rename_essay", CollectionKind::Essays, id, patch("title", title))
            .await;
        Ok(essay)
    }

    pub async fn delete_essay(&self, id: LocalId) -> Result<()> {
        self.inner.store.write().await.delete_essay(id)?;

        let remote = self.remote();
        self.enqueue("delete_essay", async move {
            let remote = remote.as_ref();
            delete_shadows(remote, CollectionKind::Essays, &DocFilter::LocalId(id)).await?;
            delete_blob_quietly(remote, &essay_path(id)).await;
            Ok(())
        })
        .await;
        Ok(())
    }

    pub async fn reorder_essays(&self, ids: &[LocalId]) -> Result<usize> {
        let (moved, orders) = {
            let mut store = self.inner.store.write().await;
            let moved = store.reorder_essays(ids)?;
            let orders = ids
                .iter()
                .filter_map(|id| store.get_essay(*id).map(|e| (e.id, e.order)))
                .collect();
            (moved, orders)
        };
        self.enqueue_reorder(CollectionKind::Essays, orders).await;
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    pub async fn add_video(&self, url: &str) -> Result<LocalId> {
        let video = {
            let mut store = self.inner.store.write().await;
            let id = store.add_video(url)?;
            store.get_video(id).cloned()
        };
        let Some(video) = video else {
            return Err(folio_engine::Error::Storage("video vanished after create".into()));
        };

        let remote = self.remote();
        let id = video.id;
        self.enqueue("add_video", async move {
            insert_video(remote.as_ref(), &video).await
        })
        .await;
        Ok(id)
    }

    pub async fn list_videos(&self) -> Vec<Video> {
        self.read_through(CollectionKind::Videos, self.remote_videos(), Store::list_videos)
            .await
    }

    async fn remote_videos(&self) -> RemoteResult<Vec<Video>> {
        let docs = self.inner.remote.list(CollectionKind::Videos).await?;
        docs.iter()
            .map(|doc| {
                let (id, shape) = shapes::decode::<VideoDoc>(doc)?;
                Ok(shape.into_video(id))
            })
            .collect()
    }

    pub async fn rename_video(&self, id: LocalId, title: &str) -> Result<Video> {
        let video = self.inner.store.write().await.rename_video(id, title)?;
        self.enqueue_update("rename_video", CollectionKind::Videos, id, patch("title", title))
            .await;
        Ok(video)
    }

    pub async fn delete_video(&self, id: LocalId) -> Result<()> {
        self.inner.store.write().await.delete_video(id)?;

        let remote = self.remote();
        self.enqueue("delete_video", async move {
            delete_shadows(remote.as_ref(), CollectionKind::Videos, &DocFilter::LocalId(id))
                .await
                .map(|_| ())
        })
        .await;
        Ok(())
    }

    pub async fn reorder_videos(&self, ids: &[LocalId]) -> Result<usize> {
        let (moved, orders) = {
            let mut store = self.inner.store.write().await;
            let moved = store.reorder_videos(ids)?;
            let orders = ids
                .iter()
                .filter_map(|id| store.get_video(*id).map(|v| (v.id, v.order)))
                .collect();
            (moved, orders)
        };
        self.enqueue_reorder(CollectionKind::Videos, orders).await;
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    pub async fn put_asset(&self, key: AssetKey, blob: Blob) -> Result<Asset> {
        let asset = self.inner.store.write().await.put_asset(key, blob)?;

        let remote = self.remote();
        let shadow = asset.clone();
        self.enqueue("put_asset", async move {
            upsert_asset(remote.as_ref(), &shadow).await
        })
        .await;
        Ok(asset)
    }

    /// Read an asset remotely when enabled, refreshing the local copy.
    pub async fn get_asset(&self, key: AssetKey) -> Option<Asset> {
        if self.is_enabled() {
            match self.remote_asset(key).await {
                Ok(Some(asset)) => {
                    if let Err(e) = self.inner.store.write().await.cache_asset(asset.clone()) {
                        warn!(key = %key, error = %e, "could not refresh local asset copy");
                    }
                    return Some(asset);
                }
                Ok(None) => debug!(key = %key, "no remote asset, using local store"),
                Err(e) => warn!(key = %key, error = %e, "remote read failed, using local store"),
            }
        }
        self.inner.store.read().await.get_asset(key).cloned()
    }

    async fn remote_asset(&self, key: AssetKey) -> RemoteResult<Option<Asset>> {
        let docs = self
            .inner
            .remote
            .find(CollectionKind::Assets, &DocFilter::Key(key.to_string()))
            .await?;
        let Some(doc) = docs.first() else {
            return Ok(None);
        };

        let shape: AssetDoc = crate::remote::from_fields(doc)?;
        let mut blob = self.inner.remote.download_blob(&shape.download_url).await?;
        blob.mime = shape.mime;
        Ok(Some(Asset {
            key,
            blob,
            updated_at: shape.updated_at,
        }))
    }
}

fn patch(name: &str, value: impl Into<Value>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(name.to_string(), value.into());
    fields
}

async fn push_record<F, Fut>(
    remote: &dyn RemoteStore,
    report: &mut PushReport,
    kind: CollectionKind,
    id: LocalId,
    create: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = RemoteResult<()>>,
{
    let counts = report.entry(kind);
    match remote.find(kind, &DocFilter::LocalId(id)).await {
        Ok(docs) if !docs.is_empty() => counts.present += 1,
        Ok(_) => match create().await {
            Ok(()) => counts.pushed += 1,
            Err(e) => {
                warn!(collection = %kind, local_id = id, error = %e, "could not push record");
                counts.failed += 1;
            }
        },
        Err(e) => {
            warn!(collection = %kind, local_id = id, error = %e, "could not look up shadow");
            counts.failed += 1;
        }
    }
}

async fn insert_album(remote: &dyn RemoteStore, album: &Album) -> RemoteResult<()> {
    let fields = to_fields(&AlbumDoc::new(album))?;
    remote
        .insert(CollectionKind::Albums, Some(album.id), fields)
        .await?;
    Ok(())
}

async fn insert_photo(remote: &dyn RemoteStore, photo: &Photo) -> RemoteResult<()> {
    let url = remote
        .upload_blob(&photo_path(photo.album_id, photo.id), &photo.blob)
        .await?;
    let fields = to_fields(&PhotoDoc::new(photo, url))?;
    remote
        .insert(CollectionKind::Photos, Some(photo.id), fields)
        .await?;
    Ok(())
}

async fn insert_essay(remote: &dyn RemoteStore, essay: &Essay) -> RemoteResult<()> {
    let url = remote.upload_blob(&essay_path(essay.id), &essay.blob).await?;
    let fields = to_fields(&EssayDoc::new(essay, url))?;
    remote
        .insert(CollectionKind::Essays, Some(essay.id), fields)
        .await?;
    Ok(())
}

async fn insert_video(remote: &dyn RemoteStore, video: &Video) -> RemoteResult<()> {
    let fields = to_fields(&VideoDoc::new(video))?;
    remote
        .insert(CollectionKind::Videos, Some(video.id), fields)
        .await?;
    Ok(())
}

/// Upload an asset and point its shadow (by key) at the new blob.
async fn upsert_asset(remote: &dyn RemoteStore, asset: &Asset) -> RemoteResult<()> {
    let url = remote.upload_blob(&asset_path(asset.key), &asset.blob).await?;
    let fields = to_fields(&AssetDoc::new(asset, url))?;

    let existing = remote
        .find(CollectionKind::Assets, &DocFilter::Key(asset.key.to_string()))
        .await?;
    if existing.is_empty() {
        remote.insert(CollectionKind::Assets, None, fields).await?;
        return Ok(());
    }
    for doc in existing {
        remote
            .update(CollectionKind::Assets, &doc.remote_id, fields.clone())
            .await?;
    }
    Ok(())
}

/// Apply `patch` to every shadow of a local record.
async fn update_shadows(
    remote: &dyn RemoteStore,
    kind: CollectionKind,
    id: LocalId,
    patch: Fields,
) -> RemoteResult<()> {
    let docs = remote.find(kind, &DocFilter::LocalId(id)).await?;
    if docs.is_empty() {
        debug!(collection = %kind, local_id = id, "no shadow to update");
    }
    for doc in docs {
        remote.update(kind, &doc.remote_id, patch.clone()).await?;
    }
    Ok(())
}

/// Delete every document matching `filter`, continuing past failures.
async fn delete_shadows(
    remote: &dyn RemoteStore,
    kind: CollectionKind,
    filter: &DocFilter,
) -> RemoteResult<usize> {
    let docs = remote.find(kind, filter).await?;
    let mut deleted = 0;
    for doc in docs {
        match remote.delete(kind, &doc.remote_id).await {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!(collection = %kind, remote_id = %doc.remote_id, error = %e, "could not delete shadow")
            }
        }
    }
    Ok(deleted)
}

async fn delete_blob_quietly(remote: &dyn RemoteStore, path: &str) {
    if let Err(e) = remote.delete_blob(path).await {
        debug!(path, error = %e, "could not delete remote blob");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use folio_engine::{ManualClock, MemoryBackend};

    fn client(remote: Arc<MemoryRemote>) -> MirrorClient {
        let store = Store::open(MemoryBackend::new(), Arc::new(ManualClock::new(1000))).unwrap();
        MirrorClient::new(
            Arc::new(RwLock::new(store)),
            remote,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn queued_jobs_run_in_order() {
        let remote = Arc::new(MemoryRemote::new());
        let client = client(remote);
        client.inner.enabled.store(true, Ordering::SeqCst);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for (step, delay) in [(1, 30), (2, 0), (3, 10)] {
            let seen = Arc::clone(&seen);
            client
                .enqueue("step", async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    seen.lock().unwrap().push(step);
                    Ok(())
                })
                .await;
        }
        assert_eq!(client.pending_tasks(), 3);

        assert!(client.flush(Duration::from_secs(1)).await);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(client.pending_tasks(), 0);
    }

    #[test]
    fn report_totals() {
        let mut report = PushReport::default();
        report.entry(CollectionKind::Albums).pushed = 2;
        report.entry(CollectionKind::Videos).present = 1;
        report.entry(CollectionKind::Videos).failed = 3;
        assert_eq!(report.pushed(), 2);
        assert_eq!(report.present(), 1);
        assert_eq!(report.failed(), 3);
        assert_eq!(report.get(CollectionKind::Essays), PushCounts::default());
    }

    #[test]
    fn patch_fields() {
        let fields = patch("order", 3i64);
        assert_eq!(fields["order"], Value::from(3));
    }

    #[tokio::test]
    async fn disabled_client_never_touches_remote() {
        let remote = Arc::new(MemoryRemote::new());
        let client = client(remote.clone());

        let album = client.create_album("Trips").await.unwrap();
        client.rename_album(album, "Travel").await.unwrap();
        assert_eq!(client.list_albums().await[0].name, "Travel");
        assert!(client.flush(Duration::from_secs(1)).await);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn probe_timeout_keeps_sync_off() {
        let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_secs(5)));
        let client = client(remote);

        assert!(!client.enable_sync().await);
        assert!(!client.is_enabled());
    }

    #[tokio::test]
    async fn enable_sync_pushes_existing_records() {
        let remote = Arc::new(MemoryRemote::new());
        let client = client(remote.clone());
        let album = client.create_album("Trips").await.unwrap();
        client
            .add_photo(album, Blob::new(b"p".to_vec(), "image/png"))
            .await
            .unwrap();

        assert!(client.enable_sync().await);
        let photos = remote.docs(CollectionKind::Photos).await;
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].u64_field("albumId"), Some(album));
        assert_eq!(remote.blob_paths().await, vec![photo_path(album, photos[0].local_id.unwrap())]);
    }

    #[tokio::test]
    async fn remote_asset_read_refreshes_local_copy() {
        let remote = Arc::new(MemoryRemote::new());
        let client = client(remote.clone());
        assert!(client.enable_sync().await);

        // Another device uploaded a logo
        let logo = Asset {
            key: AssetKey::HeaderLogo,
            blob: Blob::new(b"logo".to_vec(), "image/png"),
            updated_at: 77,
        };
        upsert_asset(remote.as_ref(), &logo).await.unwrap();

        let read = client.get_asset(AssetKey::HeaderLogo).await.unwrap();
        assert_eq!(read, logo);

        let local = client.store().read().await.get_asset(AssetKey::HeaderLogo).cloned();
        assert_eq!(local, Some(logo));
    }
}
