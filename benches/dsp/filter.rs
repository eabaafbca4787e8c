//! Benchmarks for the state-variable filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fm::dsp::filter::SVFilter;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Square-ish input, rich in harmonics
        let input: Vec<f32> = (0..size)
            .map(|i| if (i / 16) % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let mut buffer = input.clone();

        let mut bandpass = SVFilter::bandpass(3_500.0);
        bandpass.set_q(6.0);
        group.bench_with_input(BenchmarkId::new("bandpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                bandpass.render(black_box(&mut buffer), SAMPLE_RATE)
            })
        });

        // Cutoff moves every block: the coefficient update is part of the cost
        let mut highpass = SVFilter::highpass(6_600.0);
        let mut cutoff = 6_600.0f32;
        group.bench_with_input(BenchmarkId::new("highpass_swept", size), &size, |b, _| {
            b.iter(|| {
                cutoff = if cutoff > 10_000.0 { 6_600.0 } else { cutoff * 1.01 };
                highpass.set_cutoff(black_box(cutoff));
                buffer.copy_from_slice(&input);
                highpass.render(black_box(&mut buffer), SAMPLE_RATE)
            })
        });
    }

    group.finish();
}
