//! Benchmarks for the raw read path
//!
//! Run with: cargo bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rawread::query::compile;
use rawread::read::RawReader;
use rawread::remote::{compress, encode_response, Compression, FilterRequest, Format};
use rawread::storage::{MemoryStore, Points, StoredSeries};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn create_store(series: usize, points: usize) -> MemoryStore {
    let store = MemoryStore::default();
    for s in 0..series {
        let data = (0..points as i64)
            .map(|i| (i * 1_000_000_000, i as f64 * 0.5))
            .collect();
        store
            .write_series(
                "bench",
                "",
                StoredSeries::new("cpu", "usage", Points::Float(data))
                    .tag("host", format!("host-{:04}", s))
                    .tag("region", if s % 2 == 0 { "east" } else { "west" }),
            )
            .unwrap();
    }
    store
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let now = Utc::now();

    group.bench_function("simple", |b| {
        b.iter(|| compile("bench", "", "cpu", "usage", black_box("host = 'a'"), now).unwrap())
    });

    group.bench_function("time_and_regex", |b| {
        let clause = "(host =~ /^host-00/ OR region = 'west') AND time > now() - 1h AND time < now()";
        b.iter(|| compile("bench", "", "cpu", "usage", black_box(clause), now).unwrap())
    });

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for (series, points) in [(10, 1000), (100, 100)] {
        let reader = RawReader::new(Arc::new(create_store(series, points)));
        let filter = FilterRequest::new("bench", "cpu").field("usage").filter("region = 'east'");

        group.throughput(Throughput::Elements((series * points / 2) as u64));

        group.bench_function(format!("buffered_{}x{}", series, points), |b| {
            b.iter(|| {
                reader
                    .read(black_box(&filter), Utc::now(), &CancellationToken::new())
                    .unwrap()
            })
        });

        group.bench_function(format!("stream_{}x{}", series, points), |b| {
            b.iter(|| {
                let mut sink = Vec::new();
                reader
                    .read_stream(black_box(&filter), Utc::now(), &mut sink, &CancellationToken::new())
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let reader = RawReader::new(Arc::new(create_store(100, 100)));
    let response = reader
        .read(
            &FilterRequest::new("bench", "cpu").field("usage"),
            Utc::now(),
            &CancellationToken::new(),
        )
        .unwrap();

    for format in [Format::Json, Format::Protobuf] {
        group.bench_function(format!("{:?}", format), |b| {
            b.iter(|| encode_response(black_box(&response), format).unwrap())
        });
    }

    let protobuf = encode_response(&response, Format::Protobuf).unwrap();
    group.throughput(Throughput::Bytes(protobuf.len() as u64));
    group.bench_function("lz4", |b| {
        b.iter(|| compress(black_box(&protobuf), Compression::Lz4).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_read, bench_encode);
criterion_main!(benches);
