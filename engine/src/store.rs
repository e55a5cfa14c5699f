//! Store - the local source of truth.
//!
//! The Store keeps typed collections in memory and persists every mutation
//! to a [`Backend`] as a single [`WriteBatch`]. Memory is only updated after
//! the batch commits, so a failed write (quota, I/O) leaves both the backend
//! and the in-memory view untouched.

use crate::{
    backend::{decode_json, Backend, MemoryBackend, WriteBatch},
    clock::{to_rfc3339, Clock, SystemClock},
    codec,
    collection::Collection,
    error::Result,
    record::{Album, Asset, AssetKey, Blob, Essay, Photo, Video},
    schema::{Entity, META_TABLE},
    snapshot::{
        AlbumExport, AssetExport, EssayExport, ExportDocument, ImportReport, PhotoExport,
        VideoExport,
    },
    video::parse_video_url,
    CollectionKind, Error, LocalId, Order, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

fn seq_key(kind: CollectionKind) -> String {
    format!("seq:{}", kind.table())
}

/// Access to the collection holding entity type `T`.
trait Holds<T: Entity> {
    fn collection(&self) -> &Collection<T>;
    fn collection_mut(&mut self) -> &mut Collection<T>;
}

macro_rules! impl_holds {
    ($ty:ty, $field:ident) => {
        impl Holds<$ty> for Store {
            fn collection(&self) -> &Collection<$ty> {
                &self.$field
            }

            fn collection_mut(&mut self) -> &mut Collection<$ty> {
                &mut self.$field
            }
        }
    };
}

/// Record counts and storage usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub assets: usize,
    pub albums: usize,
    pub photos: usize,
    pub essays: usize,
    pub videos: usize,
    pub bytes: usize,
}

/// The local store.
pub struct Store {
    backend: Box<dyn Backend>,
    clock: Arc<dyn Clock>,
    assets: BTreeMap<AssetKey, Asset>,
    albums: Collection<Album>,
    photos: Collection<Photo>,
    essays: Collection<Essay>,
    videos: Collection<Video>,
}

impl_holds!(Album, albums);
impl_holds!(Photo, photos);
impl_holds!(Essay, essays);
impl_holds!(Video, videos);

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("stats", &self.stats()).finish()
    }
}

impl Store {
    /// Open a store over `backend`, loading everything it holds.
    pub fn open(backend: impl Backend + 'static, clock: Arc<dyn Clock>) -> Result<Self> {
        let backend: Box<dyn Backend> = Box::new(backend);

        let table = CollectionKind::Assets.table();
        let mut assets = BTreeMap::new();
        for (key, bytes) in backend.scan(table)? {
            let asset: Asset = decode_json(table, &key, &bytes)?;
            assets.insert(asset.key, asset);
        }

        Ok(Self {
            albums: load_collection(backend.as_ref())?,
            photos: load_collection(backend.as_ref())?,
            essays: load_collection(backend.as_ref())?,
            videos: load_collection(backend.as_ref())?,
            assets,
            backend,
            clock,
        })
    }

    /// An empty store held in memory, stamped by the system clock.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            clock: Arc::new(SystemClock),
            assets: BTreeMap::new(),
            albums: Collection::new(),
            photos: Collection::new(),
            essays: Collection::new(),
            videos: Collection::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            assets: self.assets.len(),
            albums: self.albums.len(),
            photos: self.photos.len(),
            essays: self.essays.len(),
            videos: self.videos.len(),
            bytes: self.backend.size(),
        }
    }

    // ------------------------------------------------------------------
    // Generic collection operations
    // ------------------------------------------------------------------

    fn create<T: Entity>(
        &mut self,
        scope: Option<LocalId>,
        build: impl FnOnce(LocalId, Order, Timestamp) -> T,
    ) -> Result<LocalId>
    where
        Self: Holds<T>,
    {
        let now = self.clock.now();
        let collection = Holds::<T>::collection(self);
        let id = collection.next_id();
        let record = build(id, collection.next_order(scope), now);

        let mut batch = WriteBatch::new();
        batch.put_json(T::KIND.table(), id.to_string(), &record)?;
        batch.put_json(META_TABLE, seq_key(T::KIND), &(id + 1))?;
        self.backend.commit(batch)?;

        Holds::<T>::collection_mut(self).insert(record);
        Ok(id)
    }

    fn update<T: Entity>(&mut self, id: LocalId, change: impl FnOnce(&mut T, Timestamp)) -> Result<T>
    where
        Self: Holds<T>,
    {
        let mut record = Holds::<T>::collection(self)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(T::KIND, id))?;
        change(&mut record, self.clock.now());

        let mut batch = WriteBatch::new();
        batch.put_json(T::KIND.table(), id.to_string(), &record)?;
        self.backend.commit(batch)?;

        Holds::<T>::collection_mut(self).insert(record.clone());
        Ok(record)
    }

    fn delete<T: Entity>(&mut self, id: LocalId) -> Result<T>
    where
        Self: Holds<T>,
    {
        if !Holds::<T>::collection(self).contains(id) {
            return Err(Error::not_found(T::KIND, id));
        }

        let mut batch = WriteBatch::new();
        batch.delete(T::KIND.table(), id.to_string());
        self.backend.commit(batch)?;

        Holds::<T>::collection_mut(self)
            .remove(id)
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    fn reorder<T: Entity>(&mut self, ids: &[LocalId], scope: Option<LocalId>) -> Result<usize>
    where
        Self: Holds<T>,
    {
        let planned = Holds::<T>::collection(self).reorder_plan(ids, scope);
        if planned.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for record in &planned {
            batch.put_json(T::KIND.table(), record.id().to_string(), record)?;
        }
        self.backend.commit(batch)?;

        let count = planned.len();
        let collection = Holds::<T>::collection_mut(self);
        for record in planned {
            collection.insert(record);
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    /// Create an album at the end of the album list.
    pub fn create_album(&mut self, name: &str) -> Result<LocalId> {
        let name = name.to_string();
        self.create(None, |id, order, now| Album {
            id,
            name,
            order,
            created_at: now,
            updated_at: None,
        })
    }

    /// All albums, ascending by order.
    pub fn list_albums(&self) -> Vec<Album> {
        self.albums.sorted(None)
    }

    pub fn get_album(&self, id: LocalId) -> Option<&Album> {
        self.albums.get(id)
    }

    pub fn rename_album(&mut self, id: LocalId, name: &str) -> Result<Album> {
        self.update(id, |album: &mut Album, now| {
            album.name = name.to_string();
            album.updated_at = Some(now);
        })
    }

    /// Delete an album and every photo in it, in one transaction.
    pub fn delete_album(&mut self, id: LocalId) -> Result<()> {
        if !self.albums.contains(id) {
            return Err(Error::not_found(CollectionKind::Albums, id));
        }

        let photo_ids: Vec<LocalId> = self.photos.in_scope(Some(id)).map(|p| p.id).collect();

        let mut batch = WriteBatch::new();
        for photo_id in &photo_ids {
            batch.delete(CollectionKind::Photos.table(), photo_id.to_string());
        }
        batch.delete(CollectionKind::Albums.table(), id.to_string());
        self.backend.commit(batch)?;

        for photo_id in photo_ids {
            self.photos.remove(photo_id);
        }
        self.albums.remove(id);
        Ok(())
    }

    /// Give each listed album its position as order. Returns how many moved.
    pub fn reorder_albums(&mut self, ids: &[LocalId]) -> Result<usize> {
        self.reorder::<Album>(ids, None)
    }

    // ------------------------------------------------------------------
    // Photos
    // ------------------------------------------------------------------

    /// Add an image to the end of an album.
    pub fn add_photo(&mut self, album_id: LocalId, blob: Blob) -> Result<LocalId> {
        if !self.albums.contains(album_id) {
            return Err(Error::not_found(CollectionKind::Albums, album_id));
        }
        if !blob.is_image() {
            return Err(Error::InvalidReference(format!(
                "unrecognized file type for photo: {}",
                blob.mime
            )));
        }

        self.create(Some(album_id), |id, order, now| Photo {
            id,
            album_id,
            size: blob.size(),
            blob,
            order,
            created_at: now,
        })
    }

    /// Photos of one album, ascending by order.
    pub fn list_photos(&self, album_id: LocalId) -> Vec<Photo> {
        self.photos.sorted(Some(album_id))
    }

    pub fn get_photo(&self, id: LocalId) -> Option<&Photo> {
        self.photos.get(id)
    }

    /// First photo of an album, used as its cover.
    pub fn album_cover(&self, album_id: LocalId) -> Option<Photo> {
        self.photos
            .in_scope(Some(album_id))
            .min_by_key(|p| (p.order, p.id))
            .cloned()
    }

    pub fn photo_count(&self, album_id: LocalId) -> usize {
        self.photos.in_scope(Some(album_id)).count()
    }

    pub fn delete_photo(&mut self, id: LocalId) -> Result<()> {
        self.delete::<Photo>(id).map(|_| ())
    }

    /// Reorder photos within one album. Photos of other albums are ignored.
    pub fn reorder_photos(&mut self, album_id: LocalId, ids: &[LocalId]) -> Result<usize> {
        self.reorder::<Photo>(ids, Some(album_id))
    }

    // ------------------------------------------------------------------
    // Essays
    // ------------------------------------------------------------------

    /// Add a PDF essay at the end of the essay list.
    pub fn add_essay(&mut self, title: &str, blob: Blob) -> Result<LocalId> {
        if !blob.is_pdf() {
            return Err(Error::InvalidReference(format!(
                "unrecognized file type for essay: {}",
                blob.mime
            )));
        }

        let title = title.to_string();
        self.create(None, |id, order, now| Essay {
            id,
            title,
            size: blob.size(),
            blob,
            order,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn list_essays(&self) -> Vec<Essay> {
        self.essays.sorted(None)
    }

    pub fn get_essay(&self, id: LocalId) -> Option<&Essay> {
        self.essays.get(id)
    }

    pub fn rename_essay(&mut self, id: LocalId, title: &str) -> Result<Essay> {
        self.update(id, |essay: &mut Essay, now| {
            essay.title = title.to_string();
            essay.updated_at = Some(now);
        })
    }

    pub fn delete_essay(&mut self, id: LocalId) -> Result<()> {
        self.delete::<Essay>(id).map(|_| ())
    }

    pub fn reorder_essays(&mut self, ids: &[LocalId]) -> Result<usize> {
        self.reorder::<Essay>(ids, None)
    }

    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    /// Add a video by URL. Nothing is written if the URL is not recognized.
    pub fn add_video(&mut self, url: &str) -> Result<LocalId> {
        let parsed = parse_video_url(url)?;
        let url = url.trim().to_string();

        self.create(None, |id, order, now| Video {
            id,
            provider: parsed.provider,
            url,
            embed_id: parsed.embed_id,
            title: parsed.title,
            order,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn list_videos(&self) -> Vec<Video> {
        self.videos.sorted(None)
    }

    pub fn get_video(&self, id: LocalId) -> Option<&Video> {
        self.videos.get(id)
    }

    /// Change a video's title. The URL and embed id never change.
    pub fn rename_video(&mut self, id: LocalId, title: &str) -> Result<Video> {
        self.update(id, |video: &mut Video, now| {
            video.title = title.to_string();
            video.updated_at = Some(now);
        })
    }

    pub fn delete_video(&mut self, id: LocalId) -> Result<()> {
        self.delete::<Video>(id).map(|_| ())
    }

    pub fn reorder_videos(&mut self, ids: &[LocalId]) -> Result<usize> {
        self.reorder::<Video>(ids, None)
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    /// Replace the image in an asset slot.
    pub fn put_asset(&mut self, key: AssetKey, blob: Blob) -> Result<Asset> {
        if !blob.is_image() {
            return Err(Error::InvalidReference(format!(
                "unrecognized file type for {key}: {}",
                blob.mime
            )));
        }

        let asset = Asset {
            key,
            blob,
            updated_at: self.clock.now(),
        };
        self.cache_asset(asset.clone())?;
        Ok(asset)
    }

    /// Store an asset exactly as given, keeping its timestamp.
    pub fn cache_asset(&mut self, asset: Asset) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put_json(CollectionKind::Assets.table(), asset.key.as_str(), &asset)?;
        self.backend.commit(batch)?;

        self.assets.insert(asset.key, asset);
        Ok(())
    }

    pub fn get_asset(&self, key: AssetKey) -> Option<&Asset> {
        self.assets.get(&key)
    }

    pub fn list_assets(&self) -> Vec<Asset> {
        self.assets.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Snapshot every collection with blobs inlined.
    pub fn export_all(&self) -> ExportDocument {
        let mut doc = ExportDocument::new(to_rfc3339(self.clock.now()));

        for asset in self.assets.values() {
            doc.assets.insert(
                asset.key,
                AssetExport {
                    key: asset.key,
                    data: codec::encode(&asset.blob),
                    mime: asset.blob.mime.clone(),
                    updated_at: asset.updated_at,
                },
            );
        }

        doc.albums = self
            .list_albums()
            .into_iter()
            .map(|a| AlbumExport {
                id: a.id,
                name: a.name,
                order: a.order,
                created_at: a.created_at,
            })
            .collect();

        for album in &doc.albums {
            doc.photos
                .extend(self.list_photos(album.id).into_iter().map(|p| PhotoExport {
                    id: p.id,
                    album_id: p.album_id,
                    order: p.order,
                    created_at: p.created_at,
                    data: codec::encode(&p.blob),
                    mime: p.blob.mime,
                    size: p.size,
                }));
        }

        doc.essays = self
            .list_essays()
            .into_iter()
            .map(|e| EssayExport {
                id: e.id,
                title: e.title,
                order: e.order,
                created_at: e.created_at,
                data: codec::encode(&e.blob),
                mime: e.blob.mime,
                size: e.size,
            })
            .collect();

        doc.videos = self
            .list_videos()
            .into_iter()
            .map(|v| VideoExport {
                id: v.id,
                provider: v.provider.to_string(),
                url: v.url,
                embed_id: v.embed_id,
                title: v.title,
                order: v.order,
                created_at: v.created_at,
            })
            .collect();

        doc
    }

    /// Replace the whole store with the contents of `doc`.
    ///
    /// The version tag is checked before anything is touched. Items that
    /// cannot be restored (undecodable blobs, unrecognized video URLs,
    /// photos of albums missing from the document) are skipped and listed
    /// in the report. Ids are reassigned in (order, id) sequence; order
    /// values are kept as exported.
    pub fn import_all(&mut self, doc: ExportDocument) -> Result<ImportReport> {
        doc.check_version()?;

        let mut report = ImportReport::default();

        let mut assets = BTreeMap::new();
        for (key, export) in doc.assets {
            match decode_blob(&export.data, &export.mime) {
                Ok(blob) => {
                    assets.insert(
                        key,
                        Asset {
                            key,
                            blob,
                            updated_at: export.updated_at,
                        },
                    );
                    report.assets += 1;
                }
                Err(e) => report.skip(CollectionKind::Assets, key, e),
            }
        }

        let mut albums = Collection::<Album>::starting_at(self.albums.next_id());
        let mut album_ids: HashMap<LocalId, LocalId> = HashMap::new();
        let mut album_exports = doc.albums;
        album_exports.sort_by_key(|a| (a.order, a.id));
        for export in album_exports {
            let id = albums.next_id();
            albums.insert(Album {
                id,
                name: export.name,
                order: export.order,
                created_at: export.created_at,
                updated_at: None,
            });
            album_ids.insert(export.id, id);
            report.albums += 1;
        }

        let mut photos = Collection::<Photo>::starting_at(self.photos.next_id());
        let mut photo_exports = doc.photos;
        photo_exports.sort_by_key(|p| (p.album_id, p.order, p.id));
        for export in photo_exports {
            let Some(&album_id) = album_ids.get(&export.album_id) else {
                report.skip(
                    CollectionKind::Photos,
                    export.id,
                    format!("album {} is not in the export", export.album_id),
                );
                continue;
            };
            let blob = match decode_blob(&export.data, &export.mime) {
                Ok(blob) => blob,
                Err(e) => {
                    report.skip(CollectionKind::Photos, export.id, e);
                    continue;
                }
            };
            photos.insert(Photo {
                id: photos.next_id(),
                album_id,
                size: blob.size(),
                blob,
                order: export.order,
                created_at: export.created_at,
            });
            report.photos += 1;
        }

        let mut essays = Collection::<Essay>::starting_at(self.essays.next_id());
        let mut essay_exports = doc.essays;
        essay_exports.sort_by_key(|e| (e.order, e.id));
        for export in essay_exports {
            let blob = match decode_blob(&export.data, &export.mime) {
                Ok(blob) => blob,
                Err(e) => {
                    report.skip(CollectionKind::Essays, export.id, e);
                    continue;
                }
            };
            essays.insert(Essay {
                id: essays.next_id(),
                title: export.title,
                size: blob.size(),
                blob,
                order: export.order,
                created_at: export.created_at,
                updated_at: None,
            });
            report.essays += 1;
        }

        let mut videos = Collection::<Video>::starting_at(self.videos.next_id());
        let mut video_exports = doc.videos;
        video_exports.sort_by_key(|v| (v.order, v.id));
        for export in video_exports {
            let parsed = match parse_video_url(&export.url) {
                Ok(parsed) => parsed,
                Err(e) => {
                    report.skip(CollectionKind::Videos, export.id, e);
                    continue;
                }
            };
            videos.insert(Video {
                id: videos.next_id(),
                provider: parsed.provider,
                url: export.url,
                embed_id: parsed.embed_id,
                title: export.title,
                order: export.order,
                created_at: export.created_at,
                updated_at: None,
            });
            report.videos += 1;
        }

        let mut batch = WriteBatch::new();
        for kind in CollectionKind::ALL {
            batch.clear(kind.table());
        }
        for asset in assets.values() {
            batch.put_json(CollectionKind::Assets.table(), asset.key.as_str(), asset)?;
        }
        stage_collection(&mut batch, &albums)?;
        stage_collection(&mut batch, &photos)?;
        stage_collection(&mut batch, &essays)?;
        stage_collection(&mut batch, &videos)?;
        self.backend.commit(batch)?;

        self.assets = assets;
        self.albums = albums;
        self.photos = photos;
        self.essays = essays;
        self.videos = videos;

        Ok(report)
    }

    /// Remove every record from every collection. Id sequences keep counting.
    pub fn clear_all(&mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        for kind in CollectionKind::ALL {
            batch.clear(kind.table());
        }
        self.backend.commit(batch)?;

        self.assets.clear();
        self.albums.clear();
        self.photos.clear();
        self.essays.clear();
        self.videos.clear();
        Ok(())
    }
}

fn load_collection<T: Entity>(backend: &dyn Backend) -> Result<Collection<T>> {
    let table = T::KIND.table();
    let records = backend
        .scan(table)?
        .iter()
        .map(|(key, bytes)| decode_json::<T>(table, key, bytes))
        .collect::<Result<Vec<_>>>()?;

    let seq = seq_key(T::KIND);
    let next_id = match backend.get(META_TABLE, &seq)? {
        Some(bytes) => decode_json(META_TABLE, &seq, &bytes)?,
        None => 1,
    };

    Ok(Collection::from_records(records, next_id))
}

fn stage_collection<T: Entity>(batch: &mut WriteBatch, collection: &Collection<T>) -> Result<()> {
    for record in collection.all() {
        batch.put_json(T::KIND.table(), record.id().to_string(), record)?;
    }
    batch.put_json(META_TABLE, seq_key(T::KIND), &collection.next_id())
}

fn decode_blob(data: &str, mime: &str) -> Result<Blob> {
    let mut blob = codec::decode(data)?;
    if !mime.is_empty() {
        blob.mime = mime.to_string();
    }
    Ok(blob)
}
