//! Several FM voices sharing one frequency control.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::automation::{Param, Scheduler, Unit};
use crate::dsp::modulate::{db_to_gain, scale_range};
use crate::error::{ConfigError, Error, Result};
use crate::graph::{
    ports, Connectable, Disposable, Graph, InputRef, Node, NodeId, NodeKind, OutputRef,
    ScaleRange,
};

use super::take_param;
use super::voice::{Voice, VoiceConfig};

/// One voice of a [`Layer`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerVoice {
    pub voice: VoiceConfig,
    /// Multiplier of the layer frequency.
    pub ratio: f32,
    pub gain_db: f32,
    /// Whether the voice reaches the layer output.
    pub routed: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    pub frequency: f32,
    pub voices: Vec<LayerVoice>,
}

impl LayerConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.voices.is_empty() {
            return Err(ConfigError::EmptyLayer);
        }
        finite("frequency", self.frequency)?;
        for layer in &self.voices {
            layer.voice.validate()?;
            finite("gain_db", layer.gain_db)?;
            ratio(layer.ratio)?;
        }
        Ok(())
    }
}

fn ratio(value: f32) -> std::result::Result<(), ConfigError> {
    finite("ratio", value)?;
    if value <= 0.0 {
        return Err(ConfigError::NonPositive {
            field: "ratio",
            value,
        });
    }
    Ok(())
}

fn finite(field: &'static str, value: f32) -> std::result::Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

#[derive(Debug)]
struct LayerPart {
    ratio: Node,
    voice: Voice,
    amp: Node,
    level: Node,
}

/// N voices at fixed ratios of one frequency, mixed at static gains.
///
/// ```text
/// frequency ─┬─► × ratio₀ ─► voice₀ ─► amp₀ ─► level₀ ─┐
///            ├─► × ratio₁ ─► voice₁ ─► amp₁ ─► level₁ ─┼─► mix (Σ)
///            └─► ...                                   ┘
/// ```
///
/// Each `amp` stage has unity gain until something drives its gain port,
/// which is where per-voice envelopes plug in.
#[derive(Debug)]
pub struct Layer {
    scheduler: Scheduler,
    frequency: Node,
    frequency_param: Param,
    parts: Vec<LayerPart>,
    mix: Node,
    disposed: bool,
}

impl Layer {
    pub fn new(graph: &mut Graph, config: &LayerConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &LayerConfig) -> Result<Self> {
        config.validate()?;

        let mut frequency = graph.add(NodeKind::signal(Unit::Frequency, config.frequency))?;
        let mix = graph.add(NodeKind::gain(Unit::Audio, 1.0))?;

        let mut parts = Vec::with_capacity(config.voices.len());
        for layer in &config.voices {
            let ratio = graph.add(NodeKind::multiply(Unit::Frequency, layer.ratio))?;
            let voice = Voice::new(graph, &layer.voice)?;
            let amp = graph.add(NodeKind::gain(Unit::Audio, 1.0))?;
            let level = graph.add(NodeKind::gain(Unit::Audio, db_to_gain(layer.gain_db)))?;

            graph.chain(&[&frequency, &ratio, &voice, &amp, &level])?;
            if layer.routed {
                graph.connect(&level, &mix)?;
            }
            parts.push(LayerPart {
                ratio,
                voice,
                amp,
                level,
            });
        }
        let frequency_param = take_param(&mut frequency, ports::signal::IN)?;

        debug!(voices = parts.len(), "built voice layer");
        Ok(Self {
            scheduler: graph.scheduler(),
            frequency,
            frequency_param,
            parts,
            mix,
            disposed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.parts.get(index).map(|p| &p.voice)
    }

    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.parts.get_mut(index).map(|p| &mut p.voice)
    }

    /// Gain port of the stage right after voice `index`.
    pub fn amp_input(&self, index: usize) -> Option<InputRef> {
        self.parts
            .get(index)
            .map(|p| p.amp.input(ports::gain::GAIN))
    }

    /// Ratio multiplier of voice `index`.
    pub fn ratio_node(&self, index: usize) -> Option<NodeId> {
        self.parts.get(index).map(|p| p.ratio.id())
    }

    pub fn frequency(&mut self) -> &mut Param {
        &mut self.frequency_param
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.frequency_param, hz, time)
    }

    pub fn oscillators(&self) -> Vec<NodeId> {
        self.parts
            .iter()
            .flat_map(|p| p.voice.oscillators())
            .collect()
    }

    /// Start every oscillator of every voice on the same sample.
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

impl Connectable for Layer {
    fn output_ref(&self) -> OutputRef {
        self.mix.output(ports::gain::OUT)
    }

    fn input_ref(&self) -> InputRef {
        self.frequency.input(ports::signal::IN)
    }
}

impl Disposable for Layer {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        for part in &mut self.parts {
            part.level.dispose(graph)?;
            part.amp.dispose(graph)?;
            part.voice.dispose(graph)?;
            part.ratio.dispose(graph)?;
        }
        self.mix.dispose(graph)?;
        self.frequency.dispose(graph)?;
        self.frequency_param.retire();
        self.disposed = true;
        debug!("disposed voice layer");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Partials whose ratios morph between two tables.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, PartialEq)]
pub struct PartialBankConfig {
    pub frequency: f32,
    /// 0 selects the harmonic table, 1 the inharmonic one.
    pub inharmonicity: f32,
    pub harmonic: Vec<f32>,
    pub inharmonic: Vec<f32>,
    /// Template for every partial. Its frequency is ignored.
    pub voice: VoiceConfig,
    /// Gain applied to the sum of all partials.
    pub gain_db: f32,
}

impl PartialBankConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.harmonic.len() != self.inharmonic.len() {
            return Err(ConfigError::RatioTables {
                harmonic: self.harmonic.len(),
                inharmonic: self.inharmonic.len(),
            });
        }
        if self.harmonic.is_empty() {
            return Err(ConfigError::EmptyLayer);
        }
        finite("frequency", self.frequency)?;
        finite("inharmonicity", self.inharmonicity)?;
        finite("gain_db", self.gain_db)?;
        for &value in self.harmonic.iter().chain(&self.inharmonic) {
            ratio(value)?;
        }
        self.voice.validate()
    }
}

#[derive(Debug)]
struct Partial {
    scale: Node,
    multiply: Node,
    voice: Voice,
    harmonic: f32,
    inharmonic: f32,
}

/// A bank of FM voices whose frequency ratios slide between a harmonic and
/// an inharmonic table under one control.
///
/// ```text
/// inharmonicity ─► scale(0..1 → hᵢ..iᵢ) ─► multiply.in
///     frequency ───────────────────────► multiply.factor
///                                        multiply.out ─► voiceᵢ ─► mix (Σ)
/// ```
#[derive(Debug)]
pub struct PartialBank {
    scheduler: Scheduler,
    inharmonicity: Node,
    frequency: Node,
    inharmonicity_param: Param,
    frequency_param: Param,
    partials: Vec<Partial>,
    mix: Node,
    disposed: bool,
}

impl PartialBank {
    pub fn new(graph: &mut Graph, config: &PartialBankConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &PartialBankConfig) -> Result<Self> {
        config.validate()?;

        let mut inharmonicity =
            graph.add(NodeKind::signal(Unit::Number, config.inharmonicity))?;
        let mut frequency = graph.add(NodeKind::signal(Unit::Frequency, config.frequency))?;
        let mix = graph.add(NodeKind::gain(Unit::Audio, db_to_gain(config.gain_db)))?;

        let mut partials = Vec::with_capacity(config.harmonic.len());
        for (&harmonic, &inharmonic) in config.harmonic.iter().zip(&config.inharmonic) {
            let scale = graph.add(NodeKind::Scale(ScaleRange::unit(harmonic, inharmonic)))?;
            let multiply = graph.add(NodeKind::multiply(Unit::Frequency, 1.0))?;
            let voice = Voice::new(
                graph,
                &VoiceConfig {
                    frequency: config.frequency * harmonic,
                    ..config.voice
                },
            )?;

            graph.chain(&[&inharmonicity, &scale, &multiply, &voice, &mix])?;
            graph.connect(&frequency, multiply.input(ports::multiply::FACTOR))?;
            partials.push(Partial {
                scale,
                multiply,
                voice,
                harmonic,
                inharmonic,
            });
        }

        let inharmonicity_param = take_param(&mut inharmonicity, ports::signal::IN)?;
        let frequency_param = take_param(&mut frequency, ports::signal::IN)?;

        debug!(partials = partials.len(), "built partial bank");
        Ok(Self {
            scheduler: graph.scheduler(),
            inharmonicity,
            frequency,
            inharmonicity_param,
            frequency_param,
            partials,
            mix,
            disposed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Frequency ratio of partial `index` at the given inharmonicity.
    pub fn ratio(&self, index: usize, inharmonicity: f32) -> Option<f32> {
        self.partials
            .get(index)
            .map(|p| scale_range(inharmonicity, 0.0, 1.0, p.harmonic, p.inharmonic))
    }

    /// Scale stage of partial `index`; its output is the partial's ratio.
    pub fn scale_node(&self, index: usize) -> Option<NodeId> {
        self.partials.get(index).map(|p| p.scale.id())
    }

    /// Multiply stage of partial `index`; its output is the partial's
    /// frequency.
    pub fn multiply_node(&self, index: usize) -> Option<NodeId> {
        self.partials.get(index).map(|p| p.multiply.id())
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.partials.get(index).map(|p| &p.voice)
    }

    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.partials.get_mut(index).map(|p| &mut p.voice)
    }

    pub fn inharmonicity(&mut self) -> &mut Param {
        &mut self.inharmonicity_param
    }

    pub fn frequency(&mut self) -> &mut Param {
        &mut self.frequency_param
    }

    pub fn set_inharmonicity(&mut self, value: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.inharmonicity_param, value, time)
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler
            .set_value_at(&mut self.frequency_param, hz, time)
    }

    pub fn oscillators(&self) -> Vec<NodeId> {
        self.partials
            .iter()
            .flat_map(|p| p.voice.oscillators())
            .collect()
    }

    pub fn start(&mut self, graph: &mut Graph, time: Option<f64>) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        graph.start_all(&self.oscillators(), time)
    }

    pub fn stop(&mut self, graph: &mut Graph, time: Option<f64>) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        graph.stop_all(&self.oscillators(), time)
    }
}

impl Connectable for PartialBank {
    fn output_ref(&self) -> OutputRef {
        self.mix.output(ports::gain::OUT)
    }

    fn input_ref(&self) -> InputRef {
        self.frequency.input(ports::signal::IN)
    }
}

impl Disposable for PartialBank {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        for partial in &mut self.partials {
            partial.voice.dispose(graph)?;
            partial.multiply.dispose(graph)?;
            partial.scale.dispose(graph)?;
        }
        self.mix.dispose(graph)?;
        self.frequency.dispose(graph)?;
        self.inharmonicity.dispose(graph)?;
        self.inharmonicity_param.retire();
        self.frequency_param.retire();
        self.disposed = true;
        debug!("disposed partial bank");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::OscillatorWaveform;
    use crate::graph::GraphProcessor;
    use approx::assert_relative_eq;

    fn graph() -> (Graph, GraphProcessor) {
        Graph::new(48_000.0).unwrap()
    }

    fn bank_config() -> PartialBankConfig {
        PartialBankConfig {
            frequency: 200.0,
            inharmonicity: 0.0,
            harmonic: vec![1.0, 1.5, 2.025],
            inharmonic: vec![1.0, 1.483, 1.932],
            voice: VoiceConfig {
                carrier: OscillatorWaveform::Square,
                modulator: OscillatorWaveform::Pulse { width: 0.75 },
                harmonicity: 1.5,
                modulation_index: 10.0,
                frequency: 200.0,
            },
            gain_db: -10.0,
        }
    }

    #[test]
    fn layer_voices_follow_their_ratio() {
        let (mut graph, mut processor) = graph();
        let layer_voice = |ratio| LayerVoice {
            voice: VoiceConfig::sine(440.0, 2.0, 1.0),
            ratio,
            gain_db: 0.0,
            routed: true,
        };
        let mut layer = Layer::new(
            &mut graph,
            &LayerConfig {
                frequency: 100.0,
                voices: vec![layer_voice(3.0), layer_voice(15.01)],
            },
        )
        .unwrap();
        layer.set_frequency(200.0, None).unwrap();

        let mut out = [0.0; 32];
        processor.process(&mut out);
        let carrier = |i: usize| {
            processor
                .input_value(layer.voice(i).unwrap().carrier(), 0)
                .unwrap()
        };
        assert_relative_eq!(carrier(0), 600.0);
        assert_relative_eq!(carrier(1), 3_002.0, max_relative = 1e-6);
    }

    #[test]
    fn empty_layer_is_rejected() {
        let (mut graph, _processor) = graph();
        let err = Layer::new(
            &mut graph,
            &LayerConfig {
                frequency: 100.0,
                voices: vec![],
            },
        )
        .unwrap_err();
        assert_eq!(err, Error::Config(ConfigError::EmptyLayer));
    }

    #[test]
    fn bank_ratios_morph_between_tables() {
        let (mut graph, mut processor) = graph();
        let mut bank = PartialBank::new(&mut graph, &bank_config()).unwrap();
        let mut out = [0.0; 16];

        processor.process(&mut out);
        for (i, expected) in [1.0, 1.5, 2.025].into_iter().enumerate() {
            assert_eq!(
                processor.output_value(bank.scale_node(i).unwrap(), 0),
                Some(expected)
            );
        }

        bank.set_inharmonicity(1.0, None).unwrap();
        processor.process(&mut out);
        for (i, expected) in [1.0, 1.483, 1.932].into_iter().enumerate() {
            assert_eq!(
                processor.output_value(bank.scale_node(i).unwrap(), 0),
                Some(expected)
            );
            assert_relative_eq!(
                processor
                    .output_value(bank.multiply_node(i).unwrap(), 0)
                    .unwrap(),
                200.0 * expected
            );
        }

        bank.set_inharmonicity(0.5, None).unwrap();
        processor.process(&mut out);
        assert_relative_eq!(
            processor
                .output_value(bank.scale_node(1).unwrap(), 0)
                .unwrap(),
            bank.ratio(1, 0.5).unwrap()
        );
        assert_relative_eq!(bank.ratio(1, 0.5).unwrap(), 1.4915, max_relative = 1e-6);
    }

    #[test]
    fn mismatched_tables_are_rejected() {
        let (mut graph, _processor) = graph();
        let mut config = bank_config();
        config.inharmonic.pop();
        assert_eq!(
            PartialBank::new(&mut graph, &config).unwrap_err(),
            Error::Config(ConfigError::RatioTables {
                harmonic: 3,
                inharmonic: 2
            })
        );
    }

    #[test]
    fn non_positive_bank_ratios_are_rejected() {
        let (mut graph, _processor) = graph();
        let mut config = bank_config();
        config.harmonic[1] = 0.0;
        assert_eq!(
            PartialBank::new(&mut graph, &config).unwrap_err(),
            Error::Config(ConfigError::NonPositive {
                field: "ratio",
                value: 0.0
            })
        );

        let mut config = bank_config();
        config.inharmonic[2] = -1.5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "ratio",
                value: -1.5
            })
        );
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn disposing_composites_leaves_empty_graph() {
        let (mut graph, _processor) = graph();
        let mut bank = PartialBank::new(&mut graph, &bank_config()).unwrap();
        let mut layer = Layer::new(
            &mut graph,
            &LayerConfig {
                frequency: 100.0,
                voices: vec![LayerVoice {
                    voice: VoiceConfig::sine(100.0, 1.0, 1.0),
                    ratio: 1.0,
                    gain_db: -30.0,
                    routed: false,
                }],
            },
        )
        .unwrap();

        bank.dispose(&mut graph).unwrap();
        layer.dispose(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edges().count(), 0);
        assert_eq!(layer.start(&mut graph, None), Err(Error::Disposed));
    }
}
