//! Two-oscillator FM voice built out of graph nodes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::automation::{Param, Scheduler, Unit};
use crate::dsp::oscillator::OscillatorWaveform;
use crate::error::{ConfigError, Error, Result};
use crate::graph::{
    ports, Connectable, Disposable, Graph, InputRef, Node, NodeId, NodeKind, OutputRef,
};

use super::take_param;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceConfig {
    pub carrier: OscillatorWaveform,
    pub modulator: OscillatorWaveform,
    /// Modulator frequency over carrier frequency.
    pub harmonicity: f32,
    /// Depth of the frequency deviation, relative to the carrier frequency.
    pub modulation_index: f32,
    /// Carrier frequency in Hz.
    pub frequency: f32,
}

impl VoiceConfig {
    /// Sine carrier and sine modulator.
    pub fn sine(frequency: f32, harmonicity: f32, modulation_index: f32) -> Self {
        Self {
            carrier: OscillatorWaveform::Sine,
            modulator: OscillatorWaveform::Sine,
            harmonicity,
            modulation_index,
            frequency,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (field, value) in [
            ("frequency", self.frequency),
            ("harmonicity", self.harmonicity),
            ("modulation_index", self.modulation_index),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.harmonicity <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "harmonicity",
                value: self.harmonicity,
            });
        }
        if let OscillatorWaveform::Pulse { width } = self.modulator {
            if !(width > 0.0 && width < 1.0) {
                return Err(ConfigError::NonPositive {
                    field: "pulse width",
                    value: width,
                });
            }
        }
        Ok(())
    }
}

/// Carrier oscillator whose frequency is pushed around by a modulator.
///
/// ```text
/// frequency ─┬────────────────────────────► carrier.frequency (Σ)
///            ├─► harmonicity ─► modulator.frequency     ▲
///            └─► modulation_index ─► modulation.in      │
///                modulator.out ─► modulation.gain       │
///                                 modulation.out ───────┘
/// ```
///
/// The frequency signal is the voice's input, the carrier its output.
#[derive(Debug)]
pub struct Voice {
    scheduler: Scheduler,
    frequency: Node,
    harmonicity: Node,
    modulation_index: Node,
    modulation: Node,
    carrier: Node,
    modulator: Node,
    frequency_param: Param,
    harmonicity_param: Param,
    modulation_index_param: Param,
    disposed: bool,
}

impl Voice {
    pub fn new(graph: &mut Graph, config: &VoiceConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &VoiceConfig) -> Result<Self> {
        config.validate()?;

        let mut frequency = graph.add(NodeKind::signal(Unit::Frequency, config.frequency))?;
        let mut harmonicity =
            graph.add(NodeKind::multiply(Unit::Frequency, config.harmonicity))?;
        let mut modulation_index =
            graph.add(NodeKind::multiply(Unit::Frequency, config.modulation_index))?;
        let modulation = graph.add(NodeKind::gain(Unit::Frequency, 0.0))?;
        let carrier = graph.add(NodeKind::oscillator(config.carrier, config.frequency))?;
        let modulator = graph.add(NodeKind::oscillator(config.modulator, config.frequency))?;

        let carrier_frequency = carrier.input(ports::oscillator::FREQUENCY);
        graph.connect(&frequency, carrier_frequency)?;
        graph.chain(&[&frequency, &harmonicity, &modulator])?;
        graph.chain(&[&frequency, &modulation_index, &modulation])?;
        graph.connect(&modulator, modulation.input(ports::gain::GAIN))?;
        graph.connect(&modulation, carrier_frequency)?;

        let frequency_param = take_param(&mut frequency, ports::signal::IN)?;
        let harmonicity_param = take_param(&mut harmonicity, ports::multiply::FACTOR)?;
        let modulation_index_param = take_param(&mut modulation_index, ports::multiply::FACTOR)?;

        debug!(
            frequency = config.frequency,
            harmonicity = config.harmonicity,
            modulation_index = config.modulation_index,
            "built fm voice"
        );
        Ok(Self {
            scheduler: graph.scheduler(),
            frequency,
            harmonicity,
            modulation_index,
            modulation,
            carrier,
            modulator,
            frequency_param,
            harmonicity_param,
            modulation_index_param,
            disposed: false,
        })
    }

    /// Carrier frequency in Hz, used while nothing drives the voice input.
    pub fn frequency(&mut self) -> &mut Param {
        &mut self.frequency_param
    }

    pub fn harmonicity(&mut self) -> &mut Param {
        &mut self.harmonicity_param
    }

    pub fn modulation_index(&mut self) -> &mut Param {
        &mut self.modulation_index_param
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.frequency_param, hz, time)
    }

    pub fn set_harmonicity(&mut self, ratio: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.harmonicity_param, ratio, time)
    }

    pub fn set_modulation_index(&mut self, index: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.modulation_index_param, index, time)
    }

    /// Port that overrides the modulation index when driven, e.g. by an
    /// envelope.
    pub fn modulation_index_input(&self) -> InputRef {
        self.modulation_index.input(ports::multiply::FACTOR)
    }

    pub fn carrier(&self) -> NodeId {
        self.carrier.id()
    }

    pub fn modulator(&self) -> NodeId {
        self.modulator.id()
    }

    /// Every node of the voice, sources first.
    pub fn nodes(&self) -> [NodeId; 6] {
        [
            self.frequency.id(),
            self.harmonicity.id(),
            self.modulation_index.id(),
            self.modulator.id(),
            self.modulation.id(),
            self.carrier.id(),
        ]
    }

    /// Both oscillators, for starting in lock-step with other sources.
    pub fn oscillators(&self) -> [NodeId; 2] {
        [self.carrier.id(), self.modulator.id()]
    }

    /// Start carrier and modulator on the same sample.
    pub fn start(&mut self, graph: &mut Graph, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        graph.start_all(&self.oscillators(), time)
    }

    pub fn stop(&mut self, graph: &mut Graph, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        graph.stop_all(&self.oscillators(), time)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Connectable for Voice {
    fn output_ref(&self) -> OutputRef {
        self.carrier.output(ports::oscillator::OUT)
    }

    fn input_ref(&self) -> InputRef {
        self.frequency.input(ports::signal::IN)
    }
}

impl Disposable for Voice {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        for node in [
            &mut self.carrier,
            &mut self.modulation,
            &mut self.modulator,
            &mut self.modulation_index,
            &mut self.harmonicity,
            &mut self.frequency,
        ] {
            node.dispose(graph)?;
        }
        self.frequency_param.retire();
        self.harmonicity_param.retire();
        self.modulation_index_param.retire();
        self.disposed = true;
        debug!("disposed fm voice");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphProcessor;
    use approx::assert_relative_eq;

    fn graph() -> (Graph, GraphProcessor) {
        Graph::new(48_000.0).unwrap()
    }

    #[test]
    fn modulator_follows_harmonicity() {
        let (mut graph, mut processor) = graph();
        let voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap();

        let mut out = [0.0; 64];
        processor.process(&mut out);
        assert_eq!(
            processor.input_value(voice.modulator(), ports::oscillator::FREQUENCY),
            Some(440.0)
        );
        // Oscillators are silent until started: no deviation yet.
        assert_eq!(
            processor.input_value(voice.carrier(), ports::oscillator::FREQUENCY),
            Some(220.0)
        );
    }

    #[test]
    fn parameter_changes_reach_the_graph() {
        let (mut graph, mut processor) = graph();
        let mut voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap();

        voice.set_frequency(100.0, None).unwrap();
        voice.set_harmonicity(1.5, None).unwrap();

        let mut out = [0.0; 64];
        processor.process(&mut out);
        assert_relative_eq!(
            processor
                .input_value(voice.modulator(), ports::oscillator::FREQUENCY)
                .unwrap(),
            150.0
        );
        assert_eq!(voice.frequency().value(), 100.0);
    }

    #[test]
    fn started_modulator_deviates_carrier() {
        let (mut graph, mut processor) = graph();
        let mut voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap();
        let destination = graph.destination();
        graph.connect(&voice, destination).unwrap();
        voice.start(&mut graph, None).unwrap();

        let mut out = [0.0; 64];
        processor.process(&mut out);
        let carrier = processor
            .input_value(voice.carrier(), ports::oscillator::FREQUENCY)
            .unwrap();
        let modulator = processor.output_value(voice.modulator(), 0).unwrap();
        assert_relative_eq!(carrier, 220.0 + 2_200.0 * modulator, max_relative = 1e-5);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn rejects_non_positive_harmonicity() {
        let (mut graph, _processor) = graph();
        let err = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 0.0, 10.0)).unwrap_err();
        assert_eq!(
            err,
            Error::Config(ConfigError::NonPositive {
                field: "harmonicity",
                value: 0.0
            })
        );
    }

    #[test]
    fn dispose_removes_every_node() {
        let (mut graph, _processor) = graph();
        let before = graph.node_count();
        let mut voice = Voice::new(&mut graph, &VoiceConfig::sine(220.0, 2.0, 10.0)).unwrap();
        let nodes = voice.nodes();

        voice.dispose(&mut graph).unwrap();
        voice.dispose(&mut graph).unwrap();
        assert_eq!(graph.node_count(), before);
        assert_eq!(graph.edges().count(), 0);
        assert!(nodes.iter().all(|&n| !graph.contains(n)));
        graph.check_invariants().unwrap();
        assert_eq!(voice.set_frequency(300.0, None), Err(Error::Disposed));
    }
}
