//! Performance benchmarks for cache-debugger
//!
//! This benchmark suite measures:
//! - Raw InMemory backend operations (baseline)
//! - InstrumentedCache overhead with no scope open
//! - InstrumentedCache overhead with a scope open (text and JSON output)
//! - Value envelope encode/decode across payload sizes
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use cache_debugger::backend::{CacheBackend, InMemoryBackend};
use cache_debugger::config::{Config, Format};
use cache_debugger::serialization::{decode_value, encode_value};
use cache_debugger::sink::MemorySink;
use cache_debugger::CacheDebugger;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

// ============================================================================
// Benchmark Fixtures
// ============================================================================

/// Debugger writing into a bounded memory sink.
fn bench_debugger(format: Format) -> (CacheDebugger, MemorySink) {
    let sink = MemorySink::new();
    let debugger = CacheDebugger::new(
        Config::default()
            .observe_all()
            .with_format(format)
            .with_sink(sink.clone()),
    )
    .expect("Failed to create debugger");
    (debugger, sink)
}

// ============================================================================
// Group 1: Baseline Backend
// ============================================================================

fn backend_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_backend");
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    group.bench_function("set", |b| {
        let backend = InMemoryBackend::new();
        let value = vec![1u8; 1000];

        b.to_async(&rt).iter(|| async {
            backend
                .set(black_box("test_key"), black_box(value.clone()), None)
                .await
                .expect("Failed to set")
        });
    });

    group.bench_function("get_hit", |b| {
        let backend = InMemoryBackend::new();
        rt.block_on(async {
            backend
                .set("test_key", vec![1u8; 1000], None)
                .await
                .expect("Failed to set");
        });

        b.to_async(&rt)
            .iter(|| async { backend.get(black_box("test_key")).await });
    });

    group.bench_function("get_miss", |b| {
        let backend = InMemoryBackend::new();

        b.to_async(&rt)
            .iter(|| async { backend.get(black_box("nonexistent_key")).await });
    });

    group.finish();
}

// ============================================================================
// Group 2: Instrumentation Overhead
// ============================================================================

fn instrumented_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("instrumented_cache");
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    // No scope open: signals are never built
    group.bench_function("read_hit/idle", |b| {
        let (debugger, _sink) = bench_debugger(Format::Text);
        let cache = debugger.instrument(InMemoryBackend::new());
        rt.block_on(async {
            cache.write("test_key", "value").await.expect("Failed to write");
        });

        b.to_async(&rt)
            .iter(|| async { cache.read::<String>(black_box("test_key")).await });
    });

    for format in [Format::Text, Format::Json] {
        group.bench_with_input(
            BenchmarkId::new("read_hit/scoped", format),
            &format,
            |b, &format| {
                let (debugger, sink) = bench_debugger(format);
                let cache = debugger.instrument(InMemoryBackend::new());
                rt.block_on(async {
                    cache.write("test_key", "value").await.expect("Failed to write");
                });
                let _scope = debugger.scope();

                b.to_async(&rt).iter(|| async {
                    let value = cache.read::<String>(black_box("test_key")).await;
                    if sink.len() > 10_000 {
                        sink.clear();
                    }
                    value
                });
            },
        );
    }

    // Sampled out: the subscriber runs but nothing is formatted
    group.bench_function("write/sampled_out", |b| {
        let (debugger, _sink) = bench_debugger(Format::Text);
        debugger
            .configure(|config| config.sampling_rate = Some(0.0))
            .expect("Failed to configure");
        let cache = debugger.instrument(InMemoryBackend::new());
        let _scope = debugger.scope();

        b.to_async(&rt)
            .iter(|| async { cache.write(black_box("test_key"), "value").await });
    });

    group.finish();
}

// ============================================================================
// Group 3: Value Envelope
// ============================================================================

fn serialization_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    for size in [100, 1_000, 10_000, 100_000].iter() {
        let payload = vec![7u8; *size];

        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
                b.iter(|| encode_value(black_box(payload)));
            });

        let encoded = encode_value(&payload).expect("Failed to encode");
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
                b.iter(|| decode_value::<Vec<u8>>(black_box(encoded)));
            });
    }

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(
    benches,
    backend_benchmarks,
    instrumented_benchmarks,
    serialization_benchmarks
);
criterion_main!(benches);
