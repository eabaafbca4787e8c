//! Benchmarks for the preset instruments, mid-note.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fm::envelope::Triggerable;
use saavy_fm::graph::{Connectable, Graph, GraphProcessor};
use saavy_fm::voices::{Bell, BellConfig, Cymbal, CymbalConfig, Glass, GlassConfig};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

/// Connect an instrument, trigger it, and return the processor.
fn struck<T>(build: impl FnOnce(&mut Graph) -> T) -> (Graph, GraphProcessor, T)
where
    T: Connectable + Triggerable,
{
    let (mut graph, processor) = Graph::new(SAMPLE_RATE).unwrap();
    let mut instrument = build(&mut graph);
    let destination = graph.destination();
    graph.connect(&instrument, destination).unwrap();
    instrument.trigger_attack(None).unwrap();
    (graph, processor, instrument)
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let mut output = vec![0.0f32; size];

        let (_graph, mut processor, _bell) =
            struck(|g| Bell::new(g, &BellConfig::classic()).unwrap());
        group.bench_with_input(BenchmarkId::new("bell", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output)))
        });

        let (_graph, mut processor, _cymbal) =
            struck(|g| Cymbal::new(g, &CymbalConfig::classic()).unwrap());
        group.bench_with_input(BenchmarkId::new("cymbal", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output)))
        });

        let (_graph, mut processor, _glass) =
            struck(|g| Glass::new(g, &GlassConfig::classic()).unwrap());
        group.bench_with_input(BenchmarkId::new("glass", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output)))
        });
    }

    group.finish();
}
