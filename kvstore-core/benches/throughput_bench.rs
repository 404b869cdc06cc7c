use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kvstore_core::infrastructure_in_memory::InMemoryStore;
use kvstore_core::Store;

fn bench_put_get_cycle(c: &mut Criterion) {
    let store = InMemoryStore::new();

    c.bench_function("put_get_cycle", |b| {
        b.iter(|| {
            store.put("services/web", b"payload").unwrap();
            black_box(store.get("services/web").unwrap())
        })
    });
}

fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_prefix");

    for key_count in [10, 100, 1000] {
        let store = InMemoryStore::new();
        for i in 0..key_count {
            store.put(&format!("nodes/{}", i), b"node").unwrap();
            store.put(&format!("tasks/{}", i), b"task").unwrap();
        }

        group.bench_with_input(BenchmarkId::new("keys", key_count), &key_count, |b, _| {
            b.iter(|| black_box(store.list("nodes/").unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put_get_cycle, bench_list);
criterion_main!(benches);
