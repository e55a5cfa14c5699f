//! Integration tests for the mirror overlay, run against the in-memory remote.

use folio_engine::{Blob, CollectionKind, ManualClock, MemoryBackend, Store};
use folio_sync::remote::to_fields;
use folio_sync::shapes::{photo_path, AlbumDoc};
use folio_sync::{
    MemoryRemote, NetworkSignal, Portfolio, RemoteStore, SyncCoordinator, SyncState, View,
    ViewContent, ViewSink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn store() -> Store {
    Store::open(MemoryBackend::new(), Arc::new(ManualClock::new(1_000))).unwrap()
}

fn portfolio(remote: Arc<MemoryRemote>) -> Portfolio {
    Portfolio::with_remote(store(), remote, Duration::from_millis(500))
}

fn png(bytes: &[u8]) -> Blob {
    Blob::new(bytes.to_vec(), "image/png")
}

fn pdf(bytes: &[u8]) -> Blob {
    Blob::new(bytes.to_vec(), "application/pdf")
}

async fn flush(portfolio: &Portfolio) {
    assert!(portfolio.shutdown_within(Duration::from_secs(5)).await);
}

// =============================================================================
// Local-first behavior
// =============================================================================

#[tokio::test]
async fn disabled_sync_matches_local_store() {
    let local = Portfolio::local(store());
    let remote = Arc::new(MemoryRemote::new());
    let mirrored = portfolio(remote.clone());

    for portfolio in [&local, &mirrored] {
        let album = portfolio.create_album("Summer").await.unwrap();
        portfolio.add_photo(album, png(b"one")).await.unwrap();
        portfolio.add_essay("Notes", pdf(b"%PDF-1")).await.unwrap();
        let video = portfolio
            .add_video("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        portfolio.rename_video(video, "Intro").await.unwrap();
    }
    flush(&mirrored).await;

    assert!(!mirrored.sync_enabled());
    assert_eq!(local.list_albums().await, mirrored.list_albums().await);
    assert_eq!(local.list_essays().await, mirrored.list_essays().await);
    assert_eq!(local.list_videos().await, mirrored.list_videos().await);
    assert_eq!(local.stats().await, mirrored.stats().await);
    assert_eq!(remote.write_count(), 0);
}

#[tokio::test]
async fn remote_failure_leaves_local_results_unchanged() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    remote.set_available(false);
    let album = portfolio.create_album("Offline").await.unwrap();
    let renamed = portfolio.rename_album(album, "Still offline").await.unwrap();
    let video = portfolio.add_video("https://vimeo.com/76979871").await.unwrap();
    flush(&portfolio).await;

    assert_eq!(renamed.name, "Still offline");
    let albums = portfolio.list_albums().await;
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].name, "Still offline");
    assert_eq!(portfolio.list_videos().await[0].id, video);
    assert!(remote.docs(CollectionKind::Albums).await.is_empty());
}

#[tokio::test]
async fn invalid_write_fails_before_any_remote_call() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);
    let writes = remote.write_count();

    assert!(portfolio.add_photo(42, png(b"x")).await.is_err());
    assert!(portfolio.add_video("https://example.com/clip").await.is_err());
    flush(&portfolio).await;

    assert_eq!(remote.write_count(), writes);
}

// =============================================================================
// Mirroring
// =============================================================================

#[tokio::test]
async fn bulk_push_is_idempotent() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());

    let album = portfolio.create_album("Trips").await.unwrap();
    portfolio.add_photo(album, png(b"a")).await.unwrap();
    portfolio.add_photo(album, png(b"b")).await.unwrap();
    portfolio.add_essay("Essay", pdf(b"%PDF")).await.unwrap();
    portfolio.add_video("https://youtu.be/abcdefghijk").await.unwrap();

    assert!(portfolio.enable_sync().await);
    let inserts = remote.insert_count();
    assert_eq!(inserts, 5);

    let mirror = portfolio.mirror().unwrap();
    let report = mirror.bulk_push().await;
    assert_eq!(report.pushed(), 0);
    assert_eq!(report.present(), 5);
    assert_eq!(report.failed(), 0);
    assert_eq!(remote.insert_count(), inserts);
}

#[tokio::test]
async fn writes_are_mirrored_with_local_ids() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let first = portfolio.create_album("First").await.unwrap();
    let second = portfolio.create_album("Second").await.unwrap();
    flush(&portfolio).await;
    portfolio.rename_album(first, "Renamed").await.unwrap();
    flush(&portfolio).await;
    portfolio.reorder_albums(&[second, first]).await.unwrap();
    flush(&portfolio).await;

    let docs = remote.list(CollectionKind::Albums).await.unwrap();
    let summary: Vec<_> = docs
        .iter()
        .map(|doc| (doc.local_id, doc.str_field("name"), doc.i64_field("order")))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some(second), Some("Second"), Some(0)),
            (Some(first), Some("Renamed"), Some(1)),
        ]
    );
}

#[tokio::test]
async fn album_delete_cascades_remotely() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let keep = portfolio.create_album("Keep").await.unwrap();
    let gone = portfolio.create_album("Drop").await.unwrap();
    let kept_photo = portfolio.add_photo(keep, png(b"k")).await.unwrap();
    portfolio.add_photo(gone, png(b"d1")).await.unwrap();
    portfolio.add_photo(gone, png(b"d2")).await.unwrap();
    flush(&portfolio).await;
    assert_eq!(remote.docs(CollectionKind::Photos).await.len(), 3);

    portfolio.delete_album(gone).await.unwrap();
    flush(&portfolio).await;

    let albums = remote.docs(CollectionKind::Albums).await;
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].local_id, Some(keep));

    let photos = remote.docs(CollectionKind::Photos).await;
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].local_id, Some(kept_photo));
    assert_eq!(remote.blob_paths().await, vec![photo_path(keep, kept_photo)]);
    assert_eq!(portfolio.photo_count(gone).await, 0);
}

#[tokio::test]
async fn essay_delete_removes_blob() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let essay = portfolio.add_essay("Gone", pdf(b"%PDF-gone")).await.unwrap();
    flush(&portfolio).await;
    assert_eq!(remote.blob_paths().await.len(), 1);

    portfolio.delete_essay(essay).await.unwrap();
    flush(&portfolio).await;
    assert!(remote.docs(CollectionKind::Essays).await.is_empty());
    assert!(remote.blob_paths().await.is_empty());
}

#[tokio::test]
async fn rename_right_after_add_reaches_remote() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(20)));
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let essay = portfolio.add_essay("Old", pdf(b"%PDF-old")).await.unwrap();
    portfolio.rename_essay(essay, "New").await.unwrap();
    flush(&portfolio).await;

    let docs = remote.docs(CollectionKind::Essays).await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].str_field("title"), Some("New"));

    let titles: Vec<_> = portfolio
        .list_essays()
        .await
        .into_iter()
        .map(|essay| essay.title)
        .collect();
    assert_eq!(titles, vec!["New"]);
}

#[tokio::test]
async fn delete_right_after_add_leaves_no_shadow() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(20)));
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let album = portfolio.create_album("Brief").await.unwrap();
    let photo = portfolio.add_photo(album, png(b"brief")).await.unwrap();
    portfolio.delete_photo(photo).await.unwrap();
    flush(&portfolio).await;

    assert_eq!(portfolio.photo_count(album).await, 0);
    assert!(remote.docs(CollectionKind::Photos).await.is_empty());
    assert!(remote.blob_paths().await.is_empty());
    assert_eq!(remote.docs(CollectionKind::Albums).await.len(), 1);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn reads_prefer_remote_when_enabled() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    // Written by another device
    let album = folio_engine::Album {
        id: 99,
        name: "Elsewhere".into(),
        order: 1,
        created_at: 5,
        updated_at: None,
    };
    remote
        .insert(
            CollectionKind::Albums,
            Some(album.id),
            to_fields(&AlbumDoc::new(&album)).unwrap(),
        )
        .await
        .unwrap();

    let albums = portfolio.list_albums().await;
    assert_eq!(albums, vec![album]);
    assert!(portfolio.store().read().await.list_albums().is_empty());
}

#[tokio::test]
async fn reads_fall_back_when_remote_is_down() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    let video = portfolio.add_video("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
    let essay = portfolio.add_essay("Kept", pdf(b"%PDF-kept")).await.unwrap();
    flush(&portfolio).await;

    remote.set_available(false);
    assert!(portfolio.sync_enabled());
    assert_eq!(portfolio.list_videos().await[0].id, video);
    let essays = portfolio.list_essays().await;
    assert_eq!(essays[0].id, essay);
    assert_eq!(essays[0].blob.data, b"%PDF-kept");
}

#[tokio::test]
async fn remote_essays_reuse_local_content() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = portfolio(remote.clone());
    assert!(portfolio.enable_sync().await);

    portfolio.add_essay("Local", pdf(b"%PDF-local")).await.unwrap();
    flush(&portfolio).await;

    let essays = portfolio.list_essays().await;
    assert_eq!(essays.len(), 1);
    assert_eq!(essays[0].blob, pdf(b"%PDF-local"));
    assert_eq!(essays[0].size, 10);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn shutdown_gives_up_after_limit() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(300)));
    let portfolio = Portfolio::with_remote(store(), remote, Duration::from_secs(2));
    assert!(portfolio.enable_sync().await);

    let album = portfolio.create_album("Slow").await.unwrap();
    assert!(!portfolio.shutdown_within(Duration::from_millis(20)).await);

    // The local write is unaffected
    assert_eq!(portfolio.get_album(album).await.unwrap().name, "Slow");
}

#[tokio::test]
async fn shutdown_without_remote_is_immediate() {
    let portfolio = Portfolio::local(store());
    portfolio.create_album("Local").await.unwrap();
    assert!(portfolio.shutdown().await);
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Default)]
struct Recorder {
    shown: Mutex<Vec<(View, ViewContent)>>,
}

impl ViewSink for Recorder {
    fn show(&self, view: View, content: ViewContent) {
        self.shown.lock().unwrap().push((view, content));
    }
}

impl Recorder {
    fn last(&self) -> Option<(View, ViewContent)> {
        self.shown.lock().unwrap().last().cloned()
    }
}

#[tokio::test]
async fn coordinator_state_transitions() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = Arc::new(portfolio(remote.clone()));
    let mut coordinator =
        SyncCoordinator::new(portfolio.clone(), Arc::new(Recorder::default()), false);
    let states = coordinator.watch_state();
    assert_eq!(coordinator.state(), SyncState::Offline);

    coordinator.handle(NetworkSignal::Available).await;
    assert_eq!(coordinator.state(), SyncState::OnlineSynced);
    assert_eq!(*states.borrow(), SyncState::OnlineSynced);
    assert_eq!(coordinator.subscription_count(), 3);
    assert!(portfolio.sync_enabled());

    coordinator.handle(NetworkSignal::Unavailable).await;
    assert_eq!(coordinator.state(), SyncState::Offline);

    remote.set_available(false);
    coordinator.handle(NetworkSignal::Available).await;
    assert_eq!(coordinator.state(), SyncState::OnlineUnsynced);

    remote.set_available(true);
    coordinator.handle(NetworkSignal::Available).await;
    assert_eq!(coordinator.state(), SyncState::OnlineSynced);
}

#[tokio::test]
async fn remote_change_reloads_current_view() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = Arc::new(portfolio(remote.clone()));
    let recorder = Arc::new(Recorder::default());
    let mut coordinator = SyncCoordinator::new(portfolio.clone(), recorder.clone(), true);

    coordinator.start().await;
    assert_eq!(coordinator.state(), SyncState::OnlineSynced);
    coordinator.set_view(View::Albums);

    portfolio.create_album("Fresh").await.unwrap();
    flush(&portfolio).await;

    let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some((View::Albums, ViewContent::Albums(albums))) = recorder.last() {
                if !albums.is_empty() {
                    return albums;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(reloaded[0].name, "Fresh");
}

#[tokio::test]
async fn changes_to_other_collections_are_ignored() {
    let remote = Arc::new(MemoryRemote::new());
    let portfolio = Arc::new(portfolio(remote.clone()));
    let recorder = Arc::new(Recorder::default());
    let mut coordinator = SyncCoordinator::new(portfolio.clone(), recorder.clone(), true);

    coordinator.start().await;
    coordinator.set_view(View::Essays);

    portfolio.add_video("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
    flush(&portfolio).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(recorder.last().is_none());
}
