//! Benchmarks for frame routing and stream naming
//!
//! Target: <2us per routed frame with two handlers

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

use market_stream::hot_path::{HandlerRegistry, HandlerResult, MessageRouter, StreamMessage};
use market_stream::infrastructure::MetricsCollector;
use market_stream::ws::StreamNameBuilder;
use market_stream::{MarketType, StreamKind, Symbol};

const TRADE_FRAME: &str = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1672515782136,"s":"BTCUSDT","t":12345,"p":"25000.50","q":"0.001","T":1672515782136,"m":true}}"#;

const MARK_PRICE_FRAME: &str = r#"{"stream":"btcusdt@markPrice@1s","data":{"e":"markPriceUpdate","E":1562305380000,"s":"BTCUSDT","p":"11794.15","i":"11784.62","r":"0.00038167","T":1562306400000}}"#;

fn setup() -> (MessageRouter, HandlerRegistry, Symbol) {
    let symbol = Symbol::parse("BTCUSDT").unwrap();
    let mut registry = HandlerRegistry::new();
    for kind in [StreamKind::Trade, StreamKind::Trade, StreamKind::MarkPrice] {
        registry.register(
            symbol.clone(),
            kind,
            Arc::new(|msg: &StreamMessage| -> HandlerResult {
                black_box(&msg.data);
                Ok(())
            }),
        );
    }
    (MessageRouter::new(Arc::new(MetricsCollector::new())), registry, symbol)
}

fn bench_route(c: &mut Criterion) {
    let (router, registry, symbol) = setup();
    let mut group = c.benchmark_group("route");

    group.throughput(Throughput::Bytes(TRADE_FRAME.len() as u64));
    group.bench_function("trade_two_handlers", |b| {
        b.iter(|| black_box(router.route(&symbol, black_box(TRADE_FRAME), &registry)))
    });

    group.throughput(Throughput::Bytes(MARK_PRICE_FRAME.len() as u64));
    group.bench_function("mark_price_suffixed", |b| {
        b.iter(|| black_box(router.route(&symbol, black_box(MARK_PRICE_FRAME), &registry)))
    });

    group.bench_function("malformed", |b| {
        b.iter(|| black_box(router.route(&symbol, black_box("{\"stream\":"), &registry)))
    });

    group.finish();
}

fn bench_stream_names(c: &mut Criterion) {
    let symbol = Symbol::parse("ETHUSDT").unwrap();
    let mut group = c.benchmark_group("stream_name");

    group.bench_function("single", |b| {
        b.iter(|| {
            StreamNameBuilder::stream_name(black_box(&symbol), MarketType::Futures, StreamKind::OpenInterest)
        })
    });

    group.bench_function("combined_all_kinds", |b| {
        b.iter(|| StreamNameBuilder::combined_path(black_box(&symbol), MarketType::Futures, &StreamKind::ALL))
    });

    group.finish();
}

criterion_group!(benches, bench_route, bench_stream_names);
criterion_main!(benches);
