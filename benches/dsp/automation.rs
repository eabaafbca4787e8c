//! Benchmarks for parameter automation.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use saavy_fm::automation::{Breakpoint, Curve, Param, Scheduler, Unit};
use saavy_fm::clock::ManualClock;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn adsr() -> Curve {
    // Exponential attack and decay, as a cymbal hit schedules them
    Curve::new(vec![
        Breakpoint::hold(1e-5, 0.0),
        Breakpoint::exponential(1.0, 0.01),
        Breakpoint::exponential(1e-5, 0.26),
        Breakpoint::hold(0.0, 0.26),
    ])
    .unwrap()
}

pub fn bench_automation(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/automation");
    let scheduler = Scheduler::new(Arc::new(ManualClock::new(0.0)));
    let curve = adsr();

    for &size in BLOCK_SIZES {
        let mut output = vec![0.0f32; size];

        // Render the middle of a ramp: every sample interpolates
        let (mut param, mut processor) = Param::new(Unit::Gain, 0.0);
        scheduler.schedule_curve(&mut param, &curve, 0.0).unwrap();
        processor.process(&mut output, 0, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("render_ramp", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output), black_box(240), SAMPLE_RATE))
        });

        // Control-plane cost of a retrigger, drained each time so the
        // queue never fills
        let (mut param, mut processor) = Param::new(Unit::Gain, 0.0);
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                scheduler
                    .schedule_curve(&mut param, black_box(&curve), 0.0)
                    .unwrap();
                processor.process(&mut output, 0, SAMPLE_RATE)
            })
        });
    }

    group.finish();
}
