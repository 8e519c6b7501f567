//! Tree construction and proof generation benchmarks
//!
//! Route counts cover a small facet upgrade up to a full diamond migration.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use facet_manifest::{Address, Hash32, Manifest, ManifestValidator, MerkleTree, Route, Selector};

fn create_routes(count: usize) -> Vec<Route> {
    (0..count)
        .map(|i| {
            let facet = (i % 8) as u8;
            Route::new(
                Selector::new((i as u32).to_be_bytes()),
                Address::new([facet; 20]),
                Hash32::new([facet ^ 0x5a; 32]),
            )
        })
        .collect()
}

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");

    for count in [16usize, 128, 1024] {
        let leaves: Vec<Hash32> = create_routes(count).iter().map(Route::leaf).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &leaves, |b, leaves| {
            b.iter(|| black_box(MerkleTree::build(leaves.iter().copied())));
        });
    }

    group.finish();
}

fn bench_manifest_with_proofs(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_with_proofs");

    for count in [16usize, 128, 1024] {
        let routes = create_routes(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("build", count), &routes, |b, routes| {
            b.iter(|| black_box(Manifest::build(routes.clone(), true)));
        });

        if let Ok(manifest) = Manifest::build(routes, true) {
            group.bench_with_input(BenchmarkId::new("validate", count), &manifest, |b, m| {
                b.iter(|| black_box(ManifestValidator::strict().validate(m).is_ok()));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tree_build, bench_manifest_with_proofs);
criterion_main!(benches);
