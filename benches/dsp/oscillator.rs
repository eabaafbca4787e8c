//! Benchmarks for block oscillators.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fm::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    let waveforms = [
        ("sine", OscillatorWaveform::Sine),
        ("square", OscillatorWaveform::Square),
        ("pulse", OscillatorWaveform::Pulse { width: 0.75 }),
    ];

    for &size in BLOCK_SIZES {
        // A wobbling frequency, as an FM carrier sees it
        let frequency: Vec<f32> = (0..size)
            .map(|i| 440.0 + 200.0 * (i as f32 / size as f32 * std::f32::consts::TAU).sin())
            .collect();
        let mut output = vec![0.0f32; size];

        for (name, waveform) in waveforms {
            let mut osc = OscillatorBlock::new(waveform);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    osc.render(
                        black_box(&mut output),
                        black_box(&frequency),
                        SAMPLE_RATE,
                    )
                })
            });
        }
    }

    group.finish();
}
