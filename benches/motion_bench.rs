//! Benchmarks for raw motion accumulation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inputbridge_core::event::{RawMotionEvent, Valuators};
use inputbridge_core::geometry::Rect;
use inputbridge_core::raw_motion::RawMotionAccumulator;
use inputbridge_core::sim::{default_raw_session, MOUSE_DEVICE};

const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

fn raw(dx: f64, dy: f64) -> RawMotionEvent {
    RawMotionEvent {
        device: MOUSE_DEVICE,
        time: 0,
        valuators: Valuators::from_axes(&[(0, dx), (1, dy)]),
    }
}

fn accumulate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");

    for delta in [0.1, 0.6, 2.5].iter() {
        group.bench_with_input(BenchmarkId::new("delta", delta), delta, |b, &d| {
            let mut acc = RawMotionAccumulator::new();
            acc.enable(default_raw_session());
            let event = raw(d, -d);
            b.iter(|| black_box(acc.accumulate(&event, SCREEN)));
        });
    }

    group.finish();
}

fn valuator_benchmark(c: &mut Criterion) {
    c.bench_function("valuators_from_axes", |b| {
        b.iter(|| Valuators::from_axes(black_box(&[(5, 1.0), (0, 0.5), (1, -0.5), (0, 0.25)])));
    });
}

criterion_group!(benches, accumulate_benchmark, valuator_benchmark);
criterion_main!(benches);
