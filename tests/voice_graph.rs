use approx::assert_relative_eq;
use saavy_fm::automation::Unit;
use saavy_fm::error::{Error, GraphError};
use saavy_fm::envelope::{AdsrConfig, Envelope};
use saavy_fm::graph::{
    ports, Disposable, Graph, GraphProcessor, Node, NodeKind, ScaleRange, MAX_NODES,
};
use saavy_fm::synth::{PartialBank, PartialBankConfig, Voice, VoiceConfig};
use saavy_fm::voices::{Cymbal, CymbalConfig, HARMONIC_RATIOS, INHARMONIC_RATIOS};

fn graph() -> (Graph, GraphProcessor) {
    Graph::new(48_000.0).unwrap()
}

#[test]
fn voice_modulator_resolves_to_harmonicity_times_frequency() {
    let (mut graph, mut processor) = graph();
    let mut voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap();
    let destination = graph.destination();
    graph.connect(&voice, destination).unwrap();
    voice.start(&mut graph, None).unwrap();

    let mut out = [0.0f32; 128];
    processor.process(&mut out);
    assert_eq!(
        processor.input_value(voice.modulator(), ports::oscillator::FREQUENCY),
        Some(440.0)
    );

    let [carrier, modulator] = voice.oscillators();
    graph.disconnect(&voice, destination).unwrap();
    voice.dispose(&mut graph).unwrap();
    assert!(!graph.contains(carrier));
    assert!(!graph.contains(modulator));
    assert_eq!(graph.edges().count(), 0);
    graph.check_invariants().unwrap();
}

#[test]
fn ratio_tables_morph_exactly_at_the_ends() {
    let (mut graph, mut processor) = graph();
    let mut bank = PartialBank::new(
        &mut graph,
        &PartialBankConfig {
            frequency: 100.0,
            inharmonicity: 0.0,
            harmonic: HARMONIC_RATIOS.to_vec(),
            inharmonic: INHARMONIC_RATIOS.to_vec(),
            voice: VoiceConfig::sine(100.0, 1.5, 10.0),
            gain_db: -10.0,
        },
    )
    .unwrap();
    let ratios = |processor: &GraphProcessor, bank: &PartialBank| -> Vec<f32> {
        (0..bank.len())
            .map(|i| processor.output_value(bank.scale_node(i).unwrap(), 0).unwrap())
            .collect()
    };
    let mut out = [0.0f32; 64];

    processor.process(&mut out);
    assert_eq!(ratios(&processor, &bank), HARMONIC_RATIOS.to_vec());

    bank.set_inharmonicity(1.0, None).unwrap();
    processor.process(&mut out);
    assert_eq!(ratios(&processor, &bank), INHARMONIC_RATIOS.to_vec());

    bank.set_inharmonicity(0.25, None).unwrap();
    processor.process(&mut out);
    for (i, ratio) in ratios(&processor, &bank).into_iter().enumerate() {
        let expected = HARMONIC_RATIOS[i] + (INHARMONIC_RATIOS[i] - HARMONIC_RATIOS[i]) * 0.25;
        assert_relative_eq!(ratio, expected, max_relative = 1e-6);
        // The multiply stage turns the ratio into an absolute frequency.
        assert_relative_eq!(
            processor
                .output_value(bank.multiply_node(i).unwrap(), 0)
                .unwrap(),
            100.0 * ratio,
            max_relative = 1e-6
        );
    }
}

#[test]
fn frequency_output_cannot_drive_audio_input() {
    let (mut graph, _processor) = graph();
    let frequency = graph.add(NodeKind::signal(Unit::Frequency, 440.0)).unwrap();
    let audio = graph.add(NodeKind::gain(Unit::Audio, 1.0)).unwrap();

    assert_eq!(
        graph.connect(&frequency, &audio),
        Err(Error::Graph(GraphError::IncompatiblePorts {
            output: Unit::Frequency,
            input: Unit::Audio
        }))
    );

    // Through a scale stage the value becomes a plain number.
    let scale = graph
        .add(NodeKind::Scale(ScaleRange {
            in_low: 20.0,
            in_high: 20_000.0,
            out_low: 0.0,
            out_high: 1.0,
        }))
        .unwrap();
    graph.chain(&[&frequency, &scale, &audio]).unwrap();
}

#[test]
fn fan_out_is_free_but_fan_in_needs_a_summing_port() {
    let (mut graph, _processor) = graph();
    let a = graph.add(NodeKind::signal(Unit::Number, 1.0)).unwrap();
    let b = graph.add(NodeKind::signal(Unit::Number, 2.0)).unwrap();
    let multiply = graph.add(NodeKind::multiply(Unit::Number, 1.0)).unwrap();
    let mix = graph.add(NodeKind::gain(Unit::Number, 1.0)).unwrap();

    graph.connect(&a, &multiply).unwrap();
    graph.connect(&a, &mix).unwrap();
    graph.connect(&b, &mix).unwrap();
    assert!(matches!(
        graph.connect(&b, &multiply),
        Err(Error::Graph(GraphError::FanIn { .. }))
    ));
}

#[test]
fn disposed_node_cannot_be_connected() {
    let (mut graph, _processor) = graph();
    let source = graph.add(NodeKind::signal(Unit::Number, 1.0)).unwrap();
    let mut sink = graph.add(NodeKind::gain(Unit::Number, 1.0)).unwrap();
    graph.connect(&source, &sink).unwrap();

    sink.dispose(&mut graph).unwrap();
    assert_eq!(graph.edges().count(), 0);
    assert!(matches!(
        graph.connect(&source, &sink),
        Err(Error::Graph(GraphError::DisposedNode(_)))
    ));
}

/// Fill the graph until only `free` slots remain.
fn fill(graph: &mut Graph, free: usize) -> Vec<Node> {
    let mut filler = Vec::new();
    while graph.node_count() < MAX_NODES - free {
        filler.push(graph.add(NodeKind::signal(Unit::Number, 0.0)).unwrap());
    }
    filler
}

#[test]
fn voice_that_does_not_fit_leaves_graph_unchanged() {
    let (mut graph, mut processor) = graph();
    let _filler = fill(&mut graph, 3);
    let edges = graph.edges().count();

    let err = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap_err();
    assert_eq!(err, Error::Graph(GraphError::Capacity(MAX_NODES)));
    assert_eq!(graph.node_count(), MAX_NODES - 3);
    assert_eq!(graph.edges().count(), edges);
    graph.check_invariants().unwrap();

    // The slots it briefly held are free again.
    let mut out = [0.0f32; 64];
    processor.process(&mut out);
    let mut envelope = Envelope::amplitude(&mut graph, AdsrConfig::linear(0.1, 0.1, 0.5, 0.1)).unwrap();
    assert_eq!(graph.node_count(), MAX_NODES - 1);
    envelope.dispose(&mut graph).unwrap();
}

#[test]
fn nested_preset_failure_rolls_back_every_part() {
    let (mut graph, mut processor) = graph();
    let _filler = fill(&mut graph, 30);
    let before = graph.node_count();

    assert!(Cymbal::new(&mut graph, &CymbalConfig::classic()).is_err());
    assert_eq!(graph.node_count(), before);
    assert_eq!(graph.edges().count(), 0);
    graph.check_invariants().unwrap();

    let mut out = [0.0f32; 64];
    processor.process(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn oversized_buffers_render_in_chunks() {
    let (mut graph, mut processor) = graph();
    let signal = graph.add(NodeKind::signal(Unit::Audio, 0.25)).unwrap();
    let destination = graph.destination();
    graph.connect(&signal, destination).unwrap();

    let mut out = vec![0.0f32; saavy_fm::MAX_BLOCK_SIZE * 2 + 17];
    processor.process(&mut out);
    assert!(out.iter().all(|&s| s == 0.25));
    assert_eq!(processor.frame(), out.len() as u64);
}

#[cfg(feature = "serde")]
mod config {
    use saavy_fm::envelope::{EnvelopeShape, LineConfig};
    use saavy_fm::voices::CymbalConfig;

    #[test]
    fn configs_round_trip_through_json() {
        let cymbal = CymbalConfig::classic();
        let json = serde_json::to_string(&cymbal).unwrap();
        let back: CymbalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cymbal);
    }

    #[test]
    fn unknown_and_missing_keys_are_rejected() {
        let unknown = r#"{"line": {"points": [[0.0, 0.0]], "curve": "linear"}}"#;
        assert!(serde_json::from_str::<EnvelopeShape>(unknown).is_err());

        let missing = r#"{"adsr": {"attack": 0.1, "decay": 0.1, "sustain": 0.5}}"#;
        assert!(serde_json::from_str::<EnvelopeShape>(missing).is_err());

        let line: EnvelopeShape =
            serde_json::from_str(r#"{"line": {"points": [[0.0, 0.0], [1.0, 0.5]]}}"#).unwrap();
        assert_eq!(
            line,
            EnvelopeShape::Line(LineConfig::new(vec![(0.0, 0.0), (1.0, 0.5)]))
        );
    }
}
