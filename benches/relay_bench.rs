//! Benchmarks for the hot paths of a relay session.
//!
//! Run with: cargo bench --bench relay_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::stream::{self, StreamExt};
use llm_chat_relay::{
    api::WireMessage,
    services::{aggregate, mock_source::mock_tokens, ModelCatalog, Token},
};

const MESSAGES: &[&str] = &[
    "hello",
    "explain how recursion works",
    "show me some code for a binary search function",
    "list the steps to deploy a service",
];

fn bench_mock_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock_tokens");

    for message in MESSAGES {
        group.throughput(Throughput::Bytes(message.len() as u64));
        group.bench_function(format!("{}_chars", message.len()), |b| {
            b.iter(|| black_box(mock_tokens(black_box(message), "llama3-8b")));
        });
    }

    group.finish();
}

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");

    let tokens = mock_tokens("show me some code", "llama3-8b");
    group.throughput(Throughput::Elements(tokens.len() as u64));
    group.bench_function("mock_session", |b| {
        b.iter(|| {
            for token in &tokens {
                black_box(WireMessage::token(token).to_frame().unwrap());
            }
            black_box(WireMessage::Done.to_frame().unwrap());
        });
    });

    group.bench_function("error_frame", |b| {
        b.iter(|| black_box(WireMessage::error("Streaming interrupted").to_frame().unwrap()));
    });

    group.finish();
}

fn bench_model_resolution(c: &mut Criterion) {
    let catalog = ModelCatalog::new("llama3-8b-8192");

    c.bench_function("validate_model_known", |b| {
        b.iter(|| black_box(catalog.validate_model(black_box(Some("mixtral")))));
    });
    c.bench_function("validate_model_unknown", |b| {
        b.iter(|| black_box(catalog.validate_model(black_box(Some("gpt-4")))));
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let tokens: Vec<Token> = mock_tokens("explain how recursion works", "llama3-8b");

    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(tokens.len() as u64));
    group.bench_function("mock_session", |b| {
        b.iter(|| {
            let sequence = stream::iter(tokens.clone().into_iter().map(Ok)).boxed();
            black_box(runtime.block_on(aggregate(sequence)).unwrap());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_mock_tokens,
    bench_frame_encoding,
    bench_model_resolution,
    bench_aggregate
);
criterion_main!(benches);
