//! Performance benchmarks for folio-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use folio_engine::{codec, Blob, ExportDocument, ManualClock, MemoryBackend, Store};
use std::sync::Arc;

fn test_store() -> Store {
    Store::open(MemoryBackend::new(), Arc::new(ManualClock::new(1000))).unwrap()
}

/// A store with `albums` albums of `photos` small photos each.
fn populated(albums: usize, photos: usize) -> Store {
    let mut store = test_store();
    for i in 0..albums {
        let album = store.create_album(&format!("Album {}", i)).unwrap();
        for j in 0..photos {
            let bytes = vec![(i + j) as u8; 256];
            store
                .add_photo(album, Blob::new(bytes, "image/jpeg"))
                .unwrap();
        }
    }
    store
}

fn bench_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_operations");

    group.bench_function("create_album", |b| {
        let mut store = test_store();
        b.iter(|| store.create_album(black_box("Album")).unwrap())
    });

    group.bench_function("add_photo", |b| {
        let mut store = test_store();
        let album = store.create_album("Album").unwrap();
        let blob = Blob::new(vec![7; 1024], "image/png");
        b.iter(|| store.add_photo(album, black_box(blob.clone())).unwrap())
    });

    group.bench_function("add_video", |b| {
        let mut store = test_store();
        b.iter(|| {
            store
                .add_video(black_box("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
                .unwrap()
        })
    });

    group.bench_function("list_albums_1000", |b| {
        let store = populated(1000, 0);
        b.iter(|| store.list_albums())
    });

    group.finish();
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("reverse_albums", size), size, |b, &size| {
            let mut store = populated(size, 0);
            let mut ids: Vec<_> = store.list_albums().iter().map(|a| a.id).collect();

            b.iter(|| {
                ids.reverse();
                store.reorder_albums(black_box(&ids)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for size in [10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::new("export_all", size), size, |b, &size| {
            let store = populated(size, 5);
            b.iter(|| store.export_all())
        });

        group.bench_with_input(BenchmarkId::new("import_all", size), size, |b, &size| {
            let doc = populated(size, 5).export_all();

            b.iter(|| {
                let mut store = test_store();
                store.import_all(black_box(doc.clone())).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("from_json", size), size, |b, &size| {
            let json = populated(size, 5).export_all().to_json().unwrap();
            b.iter(|| ExportDocument::from_json(black_box(&json)).unwrap())
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let blob = Blob::new(vec![42; 64 * 1024], "image/png");
    let encoded = codec::encode(&blob);

    group.bench_function("encode_64k", |b| b.iter(|| codec::encode(black_box(&blob))));
    group.bench_function("decode_64k", |b| {
        b.iter(|| codec::decode(black_box(&encoded)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_operations,
    bench_reorder,
    bench_export,
    bench_codec,
);
criterion_main!(benches);
