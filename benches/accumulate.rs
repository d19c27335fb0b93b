//! Performance benchmarks for the accumulate → filter → rank pipeline.
//!
//! Run with: `cargo bench --bench accumulate`
//!
//! ## Workload
//!
//! Synthetic histories shaped like a mid-sized project: a small pool of
//! core reviewers approving changes from a larger pool of authors.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use review_graph_kernel::{
    rank, FilterEngine, FilterPolicyV1, GraphAccumulator, IdentityDescriptor, ReviewEvent,
};

fn who(kind: &str, i: usize) -> IdentityDescriptor {
    IdentityDescriptor::new(format!("{kind} {i}"), format!("{kind}{i}@example.org"))
}

/// Deterministic history: `events` changes, 1-3 approvals each.
fn make_history(events: usize, authors: usize, reviewers: usize) -> Vec<ReviewEvent> {
    (0..events)
        .map(|i| {
            let author = who("author", (i * 7) % authors);
            let approvers = (0..1 + i % 3)
                .map(|k| who("reviewer", (i * 3 + k * 5) % reviewers))
                .collect();
            ReviewEvent::new(author, approvers).with_change(i.to_string())
        })
        .collect()
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    for &size in &[1_000usize, 10_000, 50_000] {
        let history = make_history(size, size / 20 + 1, 25);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| {
                let mut acc = GraphAccumulator::default();
                acc.ingest_all(black_box(history)).unwrap();
                acc.finish()
            })
        });
    }
    group.finish();
}

fn bench_filter_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_and_rank");
    for &size in &[1_000usize, 10_000, 50_000] {
        let mut acc = GraphAccumulator::default();
        acc.ingest_all(&make_history(size, size / 20 + 1, 25)).unwrap();
        let graph = acc.finish().graph;
        let policy = FilterPolicyV1::new(3, 2, 0.99);
        let engine = FilterEngine::new(policy.clone());

        group.throughput(Throughput::Elements(graph.num_edges() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let filtered = engine.apply(black_box(graph)).unwrap();
                rank(&filtered, graph, policy.selection, policy.display, policy.core_review_threshold).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_filter_and_rank);
criterion_main!(benches);
