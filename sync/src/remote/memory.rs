//! In-process remote with failure injection.

use super::{sort_docs, Fields, RemoteStore};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use folio_engine::{
    Blob, ChangeEvent, ChangeKind, CollectionKind, DocFilter, LocalId, RemoteDoc, RemoteId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

const URL_PREFIX: &str = "memory://blobs/";
const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct State {
    next_id: u64,
    docs: HashMap<CollectionKind, BTreeMap<RemoteId, RemoteDoc>>,
    blobs: HashMap<String, Blob>,
}

/// A remote held in memory.
///
/// `set_available(false)` makes every call fail with
/// [`RemoteError::Unavailable`] until it is switched back on.
pub struct MemoryRemote {
    state: Mutex<State>,
    available: AtomicBool,
    latency: Duration,
    inserts: AtomicUsize,
    writes: AtomicUsize,
    channels: HashMap<CollectionKind, broadcast::Sender<ChangeEvent>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let channels = CollectionKind::ALL
            .into_iter()
            .map(|kind| (kind, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();

        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
            latency: Duration::ZERO,
            inserts: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            channels,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Successful document inserts so far.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Successful mutating calls (documents and blobs) so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every document in a collection, in storage order.
    pub async fn docs(&self, kind: CollectionKind) -> Vec<RemoteDoc> {
        let state = self.state.lock().await;
        state
            .docs
            .get(&kind)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn blob_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.state.lock().await.blobs.keys().cloned().collect();
        paths.sort();
        paths
    }

    async fn enter(&self) -> RemoteResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.is_available() {
            return Err(RemoteError::Unavailable("memory remote switched off".into()));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn notify(&self, collection: CollectionKind, change: ChangeKind, remote_id: &str) {
        if let Some(sender) = self.channels.get(&collection) {
            // No receivers is fine
            let _ = sender.send(ChangeEvent {
                collection,
                change,
                remote_id: remote_id.to_string(),
            });
        }
    }
}

fn not_found(what: impl std::fmt::Display) -> RemoteError {
    RemoteError::Status {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn probe(&self) -> RemoteResult<()> {
        self.enter().await
    }

    async fn insert(
        &self,
        kind: CollectionKind,
        local_id: Option<LocalId>,
        fields: Fields,
    ) -> RemoteResult<RemoteId> {
        self.enter().await?;

        let remote_id = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            let remote_id = format!("mem-{}", state.next_id);
            let mut fields = fields;
            fields.remove("remoteId");
            fields.remove("localId");
            state.docs.entry(kind).or_default().insert(
                remote_id.clone(),
                RemoteDoc {
                    remote_id: remote_id.clone(),
                    local_id,
                    fields,
                },
            );
            remote_id
        };

        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.wrote();
        self.notify(kind, ChangeKind::Created, &remote_id);
        Ok(remote_id)
    }

    async fn find(&self, kind: CollectionKind, filter: &DocFilter) -> RemoteResult<Vec<RemoteDoc>> {
        self.enter().await?;

        let state = self.state.lock().await;
        let mut docs: Vec<_> = state
            .docs
            .get(&kind)
            .into_iter()
            .flat_map(|docs| docs.values())
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        sort_docs(&mut docs);
        Ok(docs)
    }

    async fn list(&self, kind: CollectionKind) -> RemoteResult<Vec<RemoteDoc>> {
        self.enter().await?;

        let mut docs = self.docs(kind).await;
        sort_docs(&mut docs);
        Ok(docs)
    }

    async fn update(&self, kind: CollectionKind, remote_id: &str, patch: Fields) -> RemoteResult<()> {
        self.enter().await?;

        {
            let mut state = self.state.lock().await;
            let doc = state
                .docs
                .get_mut(&kind)
                .and_then(|docs| docs.get_mut(remote_id))
                .ok_or_else(|| not_found(format!("{kind} document {remote_id}")))?;
            for (name, value) in patch {
                if name != "remoteId" && name != "localId" {
                    doc.fields.insert(name, value);
                }
            }
        }

        self.wrote();
        self.notify(kind, ChangeKind::Updated, remote_id);
        Ok(())
    }

    async fn delete(&self, kind: CollectionKind, remote_id: &str) -> RemoteResult<()> {
        self.enter().await?;

        let removed = {
            let mut state = self.state.lock().await;
            state
                .docs
                .get_mut(&kind)
                .and_then(|docs| docs.remove(remote_id))
        };
        if removed.is_none() {
            return Err(not_found(format!("{kind} document {remote_id}")));
        }

        self.wrote();
        self.notify(kind, ChangeKind::Deleted, remote_id);
        Ok(())
    }

    async fn upload_blob(&self, path: &str, blob: &Blob) -> RemoteResult<String> {
        self.enter().await?;

        self.state
            .lock()
            .await
            .blobs
            .insert(path.to_string(), blob.clone());
        self.wrote();
        Ok(format!("{URL_PREFIX}{path}"))
    }

    async fn download_blob(&self, url: &str) -> RemoteResult<Blob> {
        self.enter().await?;

        let path = url
            .strip_prefix(URL_PREFIX)
            .ok_or_else(|| RemoteError::Decode(format!("not a memory blob url: {url}")))?;
        self.state
            .lock()
            .await
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(format!("blob {path}")))
    }

    async fn delete_blob(&self, path: &str) -> RemoteResult<()> {
        self.enter().await?;

        if self.state.lock().await.blobs.remove(path).is_none() {
            return Err(not_found(format!("blob {path}")));
        }
        self.wrote();
        Ok(())
    }

    async fn subscribe(
        &self,
        kind: CollectionKind,
    ) -> RemoteResult<broadcast::Receiver<ChangeEvent>> {
        self.enter().await?;

        self.channels
            .get(&kind)
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| RemoteError::Socket(format!("no channel for {kind}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::to_fields;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        to_fields(&value).unwrap()
    }

    #[tokio::test]
    async fn insert_find_update_delete() {
        let remote = MemoryRemote::new();
        let id = remote
            .insert(CollectionKind::Albums, Some(1), fields(json!({"name": "a", "order": 1})))
            .await
            .unwrap();

        let found = remote
            .find(CollectionKind::Albums, &DocFilter::LocalId(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].remote_id, id);

        remote
            .update(CollectionKind::Albums, &id, fields(json!({"name": "b"})))
            .await
            .unwrap();
        let docs = remote.list(CollectionKind::Albums).await.unwrap();
        assert_eq!(docs[0].str_field("name"), Some("b"));
        assert_eq!(docs[0].i64_field("order"), Some(1));

        remote.delete(CollectionKind::Albums, &id).await.unwrap();
        assert!(remote.list(CollectionKind::Albums).await.unwrap().is_empty());
        assert!(remote
            .delete(CollectionKind::Albums, &id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn unavailable_rejects_everything() {
        let remote = MemoryRemote::new();
        remote.set_available(false);

        assert!(matches!(remote.probe().await, Err(RemoteError::Unavailable(_))));
        assert!(remote
            .insert(CollectionKind::Videos, Some(1), Fields::new())
            .await
            .is_err());
        assert_eq!(remote.write_count(), 0);

        remote.set_available(true);
        assert!(remote.probe().await.is_ok());
    }

    #[tokio::test]
    async fn blobs() {
        let remote = MemoryRemote::new();
        let blob = Blob::new(b"pdf".to_vec(), "application/pdf");
        let url = remote.upload_blob("essays/1", &blob).await.unwrap();
        assert_eq!(url, "memory://blobs/essays/1");

        assert_eq!(remote.download_blob(&url).await.unwrap(), blob);
        remote.delete_blob("essays/1").await.unwrap();
        assert!(remote.download_blob(&url).await.is_err());
    }

    #[tokio::test]
    async fn change_events() {
        let remote = MemoryRemote::new();
        let mut rx = remote.subscribe(CollectionKind::Essays).await.unwrap();

        let id = remote
            .insert(CollectionKind::Essays, Some(1), Fields::new())
            .await
            .unwrap();
        // Other collections are not delivered
        remote
            .insert(CollectionKind::Albums, Some(1), Fields::new())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.remote_id, id);
        assert_eq!(event.change, ChangeKind::Created);
        assert!(rx.try_recv().is_err());
    }
}
