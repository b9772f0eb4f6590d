//! Criterion benchmarks for candlelab hot paths.
//!
//! Benchmarks:
//! 1. Bar event loop (full backtest iteration per built-in strategy)
//! 2. Order book operations (submit, fill, bracket cascade)
//! 3. Broker resolution (trigger checks, path ordering, fills)
//! 4. Indicator updates (SMA, EMA, RSI, Supertrend streaming)

use candlelab_core::data::SyntheticSource;
use candlelab_core::domain::{Bar, BarSeries, Order, OrderId, OrderKind, OrderRole, OrderSide};
use candlelab_core::engine::order_book::OrderBook;
use candlelab_core::engine::{run_backtest, Broker, EngineConfig, ExecutionConfig, PercentSizer};
use candlelab_core::indicators::{Ema, Indicator, IndicatorSet, Rsi, Sma, Supertrend};
use candlelab_core::strategy::{BracketIntent, OrderIntent, StrategyKind};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    SyntheticSource::with_seed(1).generate(
        "BENCH",
        start,
        start + Duration::hours(n as i64),
        Duration::hours(1),
    )
}

fn make_order(id: u64, kind: OrderKind, price: Option<f64>) -> Order {
    Order::new(OrderId(id), OrderSide::Buy, kind, price, 1.0, 0)
}

// ── 1. Bar Event Loop ────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_event_loop");
    group.sample_size(20);

    let config = EngineConfig::new(1_000.0).with_sizer(PercentSizer::new(100.0).with_lot(0.0001));
    for &bar_count in &[2_000, 8_760] {
        let bars = make_bars(bar_count);
        for kind in StrategyKind::ALL {
            group.bench_with_input(
                BenchmarkId::new(kind.as_str(), bar_count),
                &bar_count,
                |b, _| {
                    b.iter(|| {
                        let series = BarSeries::new(bars.clone()).unwrap();
                        let strategy = kind.build(&BTreeMap::new()).unwrap();
                        run_backtest(black_box(series), strategy, black_box(config))
                    });
                },
            );
        }
    }

    group.finish();
}

// ── 2. Order Book Operations ─────────────────────────────────────────

fn bench_order_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_book");

    group.bench_function("submit_100", |b| {
        b.iter(|| {
            let mut book = OrderBook::new();
            for i in 0..100u64 {
                let _ = book.submit(make_order(i, OrderKind::Market, None));
            }
            black_box(&book);
        });
    });

    group.bench_function("submit_fill_100", |b| {
        b.iter(|| {
            let mut book = OrderBook::new();
            for i in 0..100u64 {
                let _ = book.submit(make_order(i, OrderKind::Market, None));
                let _ = book.activate(OrderId(i), 1);
                let _ = book.complete(OrderId(i), 100.0, 1.0, 1);
            }
            black_box(&book);
        });
    });

    group.bench_function("bracket_fill_cascade_20", |b| {
        b.iter(|| {
            let mut book = OrderBook::new();
            for n in 0..20u64 {
                let primary = make_order(n * 3, OrderKind::Limit, Some(100.0));
                let stop = Order::new(
                    OrderId(n * 3 + 1),
                    OrderSide::Sell,
                    OrderKind::Stop,
                    Some(95.0),
                    1.0,
                    0,
                )
                .as_child(primary.id, OrderRole::StopChild);
                let limit = Order::new(
                    OrderId(n * 3 + 2),
                    OrderSide::Sell,
                    OrderKind::Limit,
                    Some(110.0),
                    1.0,
                    0,
                )
                .as_child(primary.id, OrderRole::LimitChild);
                let id = primary.id;
                let _ = book.submit_bracket(primary, Some(stop), Some(limit));
                let _ = book.activate(id, 1);
                let _ = book.complete(id, 100.0, 1.0, 1);
                let _ = book.activate_children(id, 1);
                let _ = book.activate(OrderId(n * 3 + 1), 2);
                let _ = book.complete(OrderId(n * 3 + 1), 95.0, 1.0, 2);
                let _ = book.cancel_siblings(OrderId(n * 3 + 1), 2);
            }
            black_box(&book);
        });
    });

    group.finish();
}

// ── 3. Broker Resolution ─────────────────────────────────────────────

fn bench_broker(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker_resolve");

    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let signal_bar = Bar::new(t0, 100.0, 101.0, 99.0, 100.0, 1.0);
    let wide_bar = Bar::new(t0 + Duration::hours(1), 100.0, 112.0, 90.0, 104.0, 1.0);

    group.bench_function("market_fill", |b| {
        b.iter(|| {
            let mut broker =
                Broker::new(10_000.0, PercentSizer::default(), ExecutionConfig::default());
            let intent = OrderIntent::Single {
                side: OrderSide::Buy,
                kind: OrderKind::Market,
                price: None,
                size: None,
            };
            let _ = broker.submit(&intent, &signal_bar, 0);
            let _ = broker.resolve(black_box(&wide_bar), 1);
            black_box(broker.cash());
        });
    });

    group.bench_function("bracket_entry_and_exit", |b| {
        let exit_bar = Bar::new(t0 + Duration::hours(2), 104.0, 112.0, 90.0, 95.0, 1.0);
        b.iter(|| {
            let mut broker =
                Broker::new(10_000.0, PercentSizer::default(), ExecutionConfig::default());
            let intent = OrderIntent::Bracket(BracketIntent {
                side: OrderSide::Buy,
                entry_kind: OrderKind::Limit,
                entry_price: Some(100.0),
                stop_price: Some(95.0),
                limit_price: Some(110.0),
                size: None,
            });
            let _ = broker.submit(&intent, &signal_bar, 0);
            let _ = broker.resolve(black_box(&wide_bar), 1);
            let _ = broker.resolve(black_box(&exit_bar), 2);
            black_box(broker.trades().len());
        });
    });

    group.finish();
}

// ── 4. Indicator Updates ─────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_update");

    for &bar_count in &[2_000, 8_760] {
        let bars = make_bars(bar_count);

        group.bench_with_input(BenchmarkId::new("sma_50", bar_count), &bar_count, |b, _| {
            b.iter(|| {
                let mut set = IndicatorSet::from_indicators(vec![Box::new(Sma::new(50))]);
                for bar in &bars {
                    set.update(black_box(bar));
                }
                black_box(set.all_ready())
            });
        });

        group.bench_with_input(BenchmarkId::new("full_stack", bar_count), &bar_count, |b, _| {
            b.iter(|| {
                let indicators: Vec<Box<dyn Indicator>> = vec![
                    Box::new(Sma::new(50)),
                    Box::new(Sma::new(200)),
                    Box::new(Ema::new(200)),
                    Box::new(Rsi::new(14)),
                    Box::new(Supertrend::new(10, 3.0)),
                ];
                let mut set = IndicatorSet::from_indicators(indicators);
                for bar in &bars {
                    set.update(black_box(bar));
                }
                black_box(set.all_ready())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_bar_loop,
    bench_order_book,
    bench_broker,
    bench_indicators
);
criterion_main!(benches);
