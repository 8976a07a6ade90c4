//! Benchmarks for the track/trigger dispatcher.
//!
//! Run with: cargo bench -p ripple-core

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::observable::{Container, Observable};
use ripple_core::reactive::{effect, Computed, Signal};

/// An object with `n` numeric fields, all zero.
fn make_state(n: usize) -> Observable {
    let fields = (0..n).map(|i| (format!("f{i}"), 0));
    Observable::reactive(Container::from_object(fields)).unwrap_or_else(|e| panic!("{e}"))
}

fn bench_signal_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/signal_write");

    for subscribers in [1, 10, 100] {
        let signal = Signal::new(0u64);
        let runners: Vec<_> = (0..subscribers)
            .map(|_| {
                let signal = signal.clone();
                effect(move || {
                    black_box(signal.get());
                })
            })
            .collect();

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("subscribers", subscribers), &signal, |b, signal| {
            b.iter(|| {
                next += 1;
                signal.set(next);
            })
        });

        for runner in runners {
            runner.stop();
        }
    }

    group.finish();
}

fn bench_effect_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/effect_rerun");

    // One write, one effect re-reading `n` fields: measures dependency diffing.
    for n in [4, 32, 256] {
        let state = make_state(n);
        let reader = state.clone();
        let runner = effect(move || {
            let mut sum = 0.0;
            for i in 0..n {
                sum += reader.get(format!("f{i}")).as_f64().unwrap_or(0.0);
            }
            black_box(sum);
        });

        let mut next = 0i32;
        group.bench_with_input(BenchmarkId::new("fields", n), &state, |b, state| {
            b.iter(|| {
                next += 1;
                let _ = state.set("f0", next);
            })
        });

        runner.stop();
    }

    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/computed_chain");

    for length in [1, 8, 64] {
        let source = Signal::new(0i64);
        let mut tail = {
            let source = source.clone();
            Computed::new(move || source.get() + 1)
        };
        for _ in 1..length {
            let prev = tail.clone();
            tail = Computed::new(move || prev.get() + 1);
        }

        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::new("length", length), &tail, |b, tail| {
            b.iter(|| {
                next += 1;
                source.set(next);
                black_box(tail.get())
            })
        });
    }

    group.finish();
}

fn bench_array_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("observable/array_push");

    group.bench_function("push_1000_with_reader", |b| {
        b.iter(|| {
            let list = Observable::reactive(Container::array()).unwrap_or_else(|e| panic!("{e}"));
            let reader = list.clone();
            let runner = effect(move || {
                black_box(reader.len());
            });
            for i in 0..1000 {
                let _ = list.push([i]);
            }
            runner.stop();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_signal_write,
    bench_effect_rerun,
    bench_computed_chain,
    bench_array_push,
);

criterion_main!(benches);
