//! Property-based tests for ordering and export/import.

use folio_engine::{Blob, Error, ExportDocument, LocalId, ManualClock, MemoryBackend, Store};
use proptest::prelude::*;
use proptest::sample::subsequence;
use std::sync::Arc;

fn test_store() -> Store {
    Store::open(MemoryBackend::new(), Arc::new(ManualClock::new(1000))).unwrap()
}

fn album_ids(store: &Store) -> Vec<LocalId> {
    store.list_albums().iter().map(|a| a.id).collect()
}

/// A store with `albums` albums holding the given photo payloads each.
fn populated(albums: &[Vec<Vec<u8>>]) -> Store {
    let mut store = test_store();
    for (i, photos) in albums.iter().enumerate() {
        let album = store.create_album(&format!("album {i}")).unwrap();
        for bytes in photos {
            store
                .add_photo(album, Blob::new(bytes.clone(), "image/png"))
                .unwrap();
        }
    }
    store
}

fn arb_photos() -> impl Strategy<Value = Vec<Vec<Vec<u8>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..4),
        0..5,
    )
}

proptest! {
    #[test]
    fn prop_creates_are_strictly_increasing(count in 1usize..30) {
        let mut store = test_store();
        let created: Vec<_> = (0..count)
            .map(|i| store.create_album(&i.to_string()).unwrap())
            .collect();

        let albums = store.list_albums();
        prop_assert_eq!(album_ids(&store), created);
        prop_assert!(albums.windows(2).all(|w| w[0].order < w[1].order));
    }

    #[test]
    fn prop_permutation_reorder_matches_list(
        order in (1usize..20).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let mut store = test_store();
        let ids: Vec<_> = order
            .iter()
            .map(|i| store.create_album(&i.to_string()).unwrap())
            .collect();

        let wanted: Vec<_> = order.iter().map(|&i| ids[i]).collect();
        store.reorder_albums(&wanted).unwrap();
        prop_assert_eq!(album_ids(&store), wanted);
    }

    #[test]
    fn prop_subset_reorder_keeps_untouched_relative_order(
        (count, subset) in (2usize..20).prop_flat_map(|n| (Just(n), subsequence((0..n).collect::<Vec<_>>(), 0..n)))
    ) {
        let mut store = test_store();
        let ids: Vec<_> = (0..count)
            .map(|i| store.create_album(&i.to_string()).unwrap())
            .collect();

        let mut moved: Vec<_> = subset.iter().map(|&i| ids[i]).collect();
        moved.reverse();
        store.reorder_albums(&moved).unwrap();

        let untouched_before: Vec<_> = ids.iter().filter(|id| !moved.contains(id)).copied().collect();
        let untouched_after: Vec<_> = album_ids(&store)
            .into_iter()
            .filter(|id| !moved.contains(id))
            .collect();
        prop_assert_eq!(untouched_after, untouched_before);
    }

    #[test]
    fn prop_delete_album_removes_all_its_photos(albums in arb_photos(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!albums.is_empty());
        let mut store = populated(&albums);
        let ids = album_ids(&store);
        let target = ids[pick.index(ids.len())];
        let others: usize = ids
            .iter()
            .filter(|&&id| id != target)
            .map(|&id| store.photo_count(id))
            .sum();

        store.delete_album(target).unwrap();

        prop_assert!(store.list_photos(target).is_empty());
        prop_assert!(!album_ids(&store).contains(&target));
        prop_assert_eq!(store.stats().photos, others);
    }

    #[test]
    fn prop_export_import_round_trip(albums in arb_photos(), shuffle_seed in any::<u64>()) {
        let mut source = populated(&albums);
        let mut ids = album_ids(&source);
        if !ids.is_empty() {
            let len = ids.len();
            ids.rotate_left((shuffle_seed as usize) % len);
            source.reorder_albums(&ids).unwrap();
        }

        let json = source.export_all().to_json().unwrap();
        let mut target = test_store();
        target.import_all(ExportDocument::from_json(&json).unwrap()).unwrap();

        let source_albums = source.list_albums();
        let target_albums = target.list_albums();
        prop_assert_eq!(source_albums.len(), target_albums.len());

        for (s, t) in source_albums.iter().zip(&target_albums) {
            prop_assert_eq!(&s.name, &t.name);
            prop_assert_eq!(s.order, t.order);

            let s_photos = source.list_photos(s.id);
            let t_photos = target.list_photos(t.id);
            prop_assert_eq!(s_photos.len(), t_photos.len());
            for (sp, tp) in s_photos.iter().zip(&t_photos) {
                prop_assert_eq!(&sp.blob.data, &tp.blob.data);
                prop_assert_eq!(sp.order, tp.order);
            }
        }
    }

    #[test]
    fn prop_wrong_version_changes_nothing(version in any::<u32>(), albums in arb_photos()) {
        prop_assume!(version != folio_engine::SCHEMA_VERSION);
        let mut store = populated(&albums);
        let before = store.export_all();

        let mut doc = ExportDocument::new("t");
        doc.version = version;
        let result = store.import_all(doc);

        prop_assert!(
            matches!(result, Err(Error::IncompatibleVersion { .. })),
            "expected IncompatibleVersion"
        );
        let after = store.export_all();
        prop_assert_eq!(before.albums, after.albums);
        prop_assert_eq!(before.photos, after.photos);
    }
}
