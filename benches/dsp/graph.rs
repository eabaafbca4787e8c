//! Benchmarks for graph rendering overhead.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fm::automation::Unit;
use saavy_fm::graph::{Graph, NodeKind};
use saavy_fm::synth::{Voice, VoiceConfig};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/graph");

    for &size in BLOCK_SIZES {
        let mut output = vec![0.0f32; size];

        // A chain of gain stages: pure routing cost
        let (mut graph, mut processor) = Graph::new(SAMPLE_RATE).unwrap();
        let mut previous = graph.add(NodeKind::signal(Unit::Audio, 0.5)).unwrap();
        for _ in 0..32 {
            let stage = graph.add(NodeKind::gain(Unit::Audio, 0.99)).unwrap();
            graph.connect(&previous, &stage).unwrap();
            previous = stage;
        }
        let destination = graph.destination();
        graph.connect(&previous, destination).unwrap();
        group.bench_with_input(BenchmarkId::new("gain_chain_32", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output)))
        });

        // One running FM voice
        let (mut graph, mut processor) = Graph::new(SAMPLE_RATE).unwrap();
        let mut voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 1.4, 10.0)).unwrap();
        let destination = graph.destination();
        graph.connect(&voice, destination).unwrap();
        voice.start(&mut graph, None).unwrap();
        group.bench_with_input(BenchmarkId::new("fm_voice", size), &size, |b, _| {
            b.iter(|| processor.process(black_box(&mut output)))
        });
    }

    group.finish();
}
