//! Pipeline Criterion benchmarks.
//!
//! Measures graph construction and compilation, and local execution of
//! hash joins and co-groups.
//!
//! Run with: cargo bench --bench pipeline_bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tributary_core::aggregate::ops;
use tributary_core::{JoinOn, LocalExecutor, Pipeline, PipelineDag, Sink, Source};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `n` `(key, value)` pairs over `keys` distinct keys.
fn keyed(n: u64, keys: u64) -> Vec<(u64, u64)> {
    (0..n).map(|i| (i % keys, i)).collect()
}

/// A chain of `depth` map stages ending in a sink.
fn linear_pipeline(depth: usize) -> Pipeline {
    let pipeline = Pipeline::new();
    let mut stage = pipeline.draw_from(Source::from_vec("numbers", vec![1_u64]));
    for _ in 0..depth {
        stage = stage.map(|x: &u64| x + 1);
    }
    let (sink, _out) = Sink::collect("out");
    stage.drain_to(sink);
    pipeline
}

fn join_pipeline(n: u64) -> PipelineDag {
    let pipeline = Pipeline::new();
    let left = pipeline.draw_from(Source::from_vec("left", keyed(n, n / 4 + 1)));
    let right = pipeline.draw_from(Source::from_vec("right", keyed(n / 4 + 1, n / 4 + 1)));
    let on = JoinOn::on_keys(|l: &(u64, u64)| l.0, |r: &(u64, u64)| r.0);
    let (sink, _out) = Sink::collect("joined");
    left.join(&right, on)
        .expect("same pipeline")
        .drain_to(sink);
    pipeline.compile().expect("valid pipeline")
}

fn co_group_pipeline(n: u64) -> PipelineDag {
    let pipeline = Pipeline::new();
    let a = pipeline.draw_from(Source::from_vec("a", keyed(n, 64)));
    let b = pipeline.draw_from(Source::from_vec("b", keyed(n, 128)));
    let mut builder = a.co_group_builder(|x: &(u64, u64)| x.0);
    builder.add(&b, |x: &(u64, u64)| x.0);
    let (sink, _out) = Sink::collect("grouped");
    builder
        .build_to_bags()
        .expect("same pipeline")
        .drain_to(sink);
    pipeline.compile().expect("valid pipeline")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_construct_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_compile");
    for depth in [4_usize, 32, 256] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("linear", depth), &depth, |b, &depth| {
            b.iter(|| {
                let pipeline = linear_pipeline(depth);
                black_box(pipeline.compile().expect("valid pipeline"))
            });
        });
    }
    group.finish();
}

fn bench_group_by(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_group_by");
    for n in [1_000_u64, 100_000] {
        let pipeline = Pipeline::new();
        let (sink, _out) = Sink::collect("counts");
        pipeline
            .draw_from(Source::from_vec("items", keyed(n, 1_000)))
            .group_by(|x: &(u64, u64)| x.0, ops::counting())
            .drain_to(sink);
        let dag = pipeline.compile().expect("valid pipeline");
        let executor = LocalExecutor::default();

        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::new("counting", n), &dag, |b, dag| {
            b.iter(|| black_box(executor.run(dag).expect("run")));
        });
    }
    group.finish();
}

fn bench_hash_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_hash_join");
    for n in [1_000_u64, 100_000] {
        let dag = join_pipeline(n);
        let executor = LocalExecutor::default();
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::new("two_way", n), &dag, |b, dag| {
            b.iter(|| black_box(executor.run(dag).expect("run")));
        });
    }
    group.finish();
}

fn bench_co_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_co_group");
    for n in [1_000_u64, 100_000] {
        let dag = co_group_pipeline(n);
        let executor = LocalExecutor::default();
        group.throughput(Throughput::Elements(2 * n));
        group.bench_with_input(BenchmarkId::new("to_bags", n), &dag, |b, dag| {
            b.iter(|| black_box(executor.run(dag).expect("run")));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_construct_and_compile,
    bench_group_by,
    bench_hash_join,
    bench_co_group
);
criterion_main!(benches);
