use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use codescope_index::embedding::{Embedder, HashingEmbedder, normalize_l2};
use codescope_index::store::FlatIpStore;

fn generate_vector(dim: usize, seed: f32) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dim).map(|i| ((i as f32 + seed) * 0.1).sin()).collect();
    normalize_l2(&mut v);
    v
}

fn top_k_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_ip_top_k");

    for rows in [100, 1_000, 10_000] {
        let mut store = FlatIpStore::with_capacity(384, rows);
        for i in 0..rows {
            store.push(&generate_vector(384, i as f32)).unwrap();
        }
        let query = generate_vector(384, 0.5);

        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, _| {
            b.iter(|| black_box(store.top_k(black_box(&query), 5).unwrap()));
        });
    }

    group.finish();
}

fn embed_bench(c: &mut Criterion) {
    let embedder = HashingEmbedder::default();
    let short = "def load_config(path):\n    return toml.load(path)";
    let long = short.repeat(20);

    let mut group = c.benchmark_group("hashing_embed");
    group.bench_function("short", |b| {
        b.iter(|| embedder.embed(black_box(short)).unwrap());
    });
    group.bench_function("long", |b| {
        b.iter(|| embedder.embed(black_box(&long)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, top_k_bench, embed_bench);
criterion_main!(benches);
