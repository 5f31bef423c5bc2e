use criterion::{black_box, criterion_group, criterion_main, Criterion};
use diagramdb::cache::RecordCache;
use diagramdb::{NewRecord, Record, RecordId, StorageBackend};
use diagramdb_sqlite::EmbeddedStore;

fn seeded_store(count: usize) -> EmbeddedStore {
    let mut store = EmbeddedStore::in_memory();
    store.init().unwrap();
    for i in 0..count {
        let code = format!("graph TD\n    A{i}[Start] --> B{i}{{Check}}\n    B{i} --> C{i}[End]");
        store.add(&NewRecord::new(format!("Diagram {}", i), code)).unwrap();
    }
    store
}

fn bench_load_from(c: &mut Criterion) {
    let store = seeded_store(500);
    c.bench_function("cache_load_500", |b| {
        b.iter(|| {
            let mut cache = RecordCache::new();
            cache.load_from(black_box(&store)).unwrap()
        })
    });
}

fn bench_display_order(c: &mut Criterion) {
    let store = seeded_store(500);
    let mut cache = RecordCache::new();
    cache.load_from(&store).unwrap();

    c.bench_function("cache_display_order_500", |b| {
        b.iter(|| black_box(&cache).display_order().count())
    });
}

fn bench_upsert(c: &mut Criterion) {
    let store = seeded_store(500);
    let mut cache = RecordCache::new();
    cache.load_from(&store).unwrap();

    c.bench_function("cache_upsert_existing", |b| {
        b.iter(|| {
            cache.upsert_local(black_box(Record::new(RecordId(250), "renamed", "graph LR; A")))
        })
    });
}

fn bench_embedded_add(c: &mut Criterion) {
    let mut store = seeded_store(0);
    let record = NewRecord::new("Flow A", "graph TD; A-->B");

    c.bench_function("embedded_add", |b| {
        b.iter(|| store.add(black_box(&record)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_load_from,
    bench_display_order,
    bench_upsert,
    bench_embedded_add
);
criterion_main!(benches);
