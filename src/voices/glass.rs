//! Glass voice.
//!
//! Five FM voices at spread-out ratios of one pitch, each with its own
//! amplitude and modulation envelope. Only three of the five are heard;
//! the other two exist to be routed in when experimenting.
//!
//! # How It Works
//!
//! 1. A voice layer multiplies the played frequency by 3, 6, 15.01, 5
//!    and 1
//! 2. Each voice has its own harmonicity, mostly just off an integer, so
//!    the partials beat slowly against each other
//! 3. A modulation envelope swells and dies on every voice, scaled to a
//!    per-voice peak index: the tone starts pure, brightens, then clears
//! 4. Every envelope is stretched to the note length, so short and long
//!    notes keep the same contour
//!
//! # Variations
//!
//! - Route voices 1 and 3 = denser, more chorus-like
//! - Raise the modulation peaks = harsher, more metallic
//! - Drop the 15.01 ratio = softer, less "wet finger on a rim"

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automation::{Param, Scheduler, Unit};
use crate::envelope::{check_duration, velocity_or_full, AdsrConfig, Envelope, Triggerable};
use crate::error::{ConfigError, Error, GraphError, Result};
use crate::graph::{ports, Connectable, Disposable, Graph, InputRef, Node, NodeKind, OutputRef};
use crate::synth::{Layer, LayerConfig, LayerVoice, VoiceConfig};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlassVoice {
    pub ratio: f32,
    pub harmonicity: f32,
    /// Modulation index at the top of the modulation envelope.
    pub modulation_peak: f32,
    pub envelope: AdsrConfig,
    pub routed: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, PartialEq)]
pub struct GlassConfig {
    pub frequency: f32,
    pub volume_db: f32,
    pub voices: Vec<GlassVoice>,
    /// Shared shape of every modulation envelope.
    pub modulation_envelope: AdsrConfig,
}

impl GlassConfig {
    pub fn classic() -> Self {
        let one = AdsrConfig::linear(0.2, 0.0, 1.0, 0.2);
        let two = AdsrConfig::linear(0.1, 0.0, 1.0, 0.5);
        let three = AdsrConfig::linear(0.4, 0.0, 0.7, 0.4);
        let voice = |ratio, harmonicity, modulation_peak, envelope, routed| GlassVoice {
            ratio,
            harmonicity,
            modulation_peak,
            envelope,
            routed,
        };
        Self {
            frequency: 440.0,
            volume_db: -30.0,
            voices: vec![
                voice(3.0, 1.977, 1.0, one, true),
                voice(6.0, 0.5, 4.0, two, false),
                voice(15.01, 4.99, 1.0, two, true),
                voice(5.0, 2.01, 2.0, two, false),
                voice(1.0, 6.99, 1.0, three, true),
            ],
            modulation_envelope: AdsrConfig::linear(0.5, 0.5, 0.0, 0.0),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.modulation_envelope.validate()?;
        for voice in &self.voices {
            voice.envelope.validate()?;
            if !voice.modulation_peak.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: "modulation_peak",
                    value: voice.modulation_peak,
                });
            }
        }
        self.layer().validate()
    }

    fn layer(&self) -> LayerConfig {
        LayerConfig {
            frequency: self.frequency,
            voices: self
                .voices
                .iter()
                .map(|v| LayerVoice {
                    voice: VoiceConfig::sine(self.frequency * v.ratio, v.harmonicity, 0.0),
                    ratio: v.ratio,
                    gain_db: self.volume_db,
                    routed: v.routed,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct GlassPart {
    shape: AdsrConfig,
    amplitude: Envelope,
    modulation: Envelope,
    depth: Node,
}

/// Layered FM voices with per-voice amplitude and modulation envelopes.
///
/// Velocity sets the output level at the trigger time; the envelopes
/// themselves always peak at 1.
#[derive(Debug)]
pub struct Glass {
    scheduler: Scheduler,
    layer: Layer,
    parts: Vec<GlassPart>,
    modulation_shape: AdsrConfig,
    output: Node,
    disposed: bool,
}

impl Glass {
    pub fn new(graph: &mut Graph, config: &GlassConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &GlassConfig) -> Result<Self> {
        config.validate()?;

        let mut layer = Layer::new(graph, &config.layer())?;
        let output = graph.add(NodeKind::gain(Unit::Audio, 1.0))?;
        graph.connect(&layer, &output)?;

        let mut parts = Vec::with_capacity(config.voices.len());
        for (i, voice) in config.voices.iter().enumerate() {
            let missing = || GraphError::UnknownInput {
                node: i,
                port: ports::gain::GAIN,
            };
            let amp_input = layer.amp_input(i).ok_or_else(missing)?;
            let index_input = layer
                .voice(i)
                .map(|v| v.modulation_index_input())
                .ok_or_else(missing)?;

            let amplitude = Envelope::new(graph, voice.envelope)?;
            graph.connect(&amplitude, amp_input)?;

            let modulation = Envelope::new(graph, config.modulation_envelope)?;
            let depth = graph.add(NodeKind::multiply(Unit::Number, voice.modulation_peak))?;
            graph.chain(&[&modulation, &depth])?;
            graph.connect(&depth, index_input)?;

            parts.push(GlassPart {
                shape: voice.envelope,
                amplitude,
                modulation,
                depth,
            });
        }
        layer.start(graph, None)?;

        info!(
            frequency = config.frequency,
            voices = parts.len(),
            "created glass"
        );
        Ok(Self {
            scheduler: graph.scheduler(),
            layer,
            parts,
            modulation_shape: config.modulation_envelope,
            output,
            disposed: false,
        })
    }

    pub fn layer(&mut self) -> &mut Layer {
        &mut self.layer
    }

    pub fn amplitude_envelope(&self, index: usize) -> Option<&Envelope> {
        self.parts.get(index).map(|p| &p.amplitude)
    }

    pub fn modulation_envelope(&self, index: usize) -> Option<&Envelope> {
        self.parts.get(index).map(|p| &p.modulation)
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        self.layer.set_frequency(hz, time)
    }

    /// Output level, set here from the velocity of each attack.
    pub fn level(&mut self) -> Result<&mut Param> {
        let port = ports::gain::GAIN;
        let node = self.output.id().index();
        Ok(self
            .output
            .param_mut(port)
            .ok_or(GraphError::UnknownInput { node, port })?)
    }

    /// Attack every envelope with its unstretched shape.
    pub fn attack(&mut self, time: Option<f64>, velocity: Option<f32>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;
        self.reshape(None)?;
        self.start_note(time, velocity)
    }

    fn start_note(&mut self, time: f64, velocity: Option<f32>) -> Result<()> {
        let level = velocity_or_full(velocity);
        let scheduler = self.scheduler.clone();
        scheduler.set_value_at(self.level()?, level, time)?;
        for part in &mut self.parts {
            part.amplitude.trigger_attack(Some(time))?;
            part.modulation.trigger_attack(Some(time))?;
        }
        Ok(())
    }

    /// Install the configured shapes, stretched by `duration` when given.
    fn reshape(&mut self, duration: Option<f64>) -> Result<()> {
        let stretch = |shape: AdsrConfig| match duration {
            Some(d) => shape.scaled(d),
            None => shape,
        };
        for part in &mut self.parts {
            part.amplitude.set_shape(stretch(part.shape))?;
            part.modulation.set_shape(stretch(self.modulation_shape))?;
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Triggerable for Glass {
    fn trigger_attack(&mut self, time: Option<f64>) -> Result<()> {
        self.attack(time, None)
    }

    fn trigger_release(&mut self, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;
        for part in &mut self.parts {
            part.amplitude.trigger_release(Some(time))?;
            part.modulation.trigger_release(Some(time))?;
        }
        Ok(())
    }

    /// Every stage time of every envelope is multiplied by `duration`.
    fn trigger_attack_release(
        &mut self,
        duration: f64,
        time: Option<f64>,
        velocity: Option<f32>,
    ) -> Result<()> {
        self.ensure_live()?;
        let duration = check_duration(duration)?;
        let time = self.scheduler.resolve(time)?;
        self.reshape(Some(duration))?;
        self.start_note(time, velocity)?;
        self.trigger_release(Some(time + duration))
    }
}

impl Connectable for Glass {
    fn output_ref(&self) -> OutputRef {
        self.output.output(ports::gain::OUT)
    }

    /// Frequency control of the layer.
    fn input_ref(&self) -> InputRef {
        self.layer.input_ref()
    }
}

impl Disposable for Glass {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        for part in &mut self.parts {
            part.amplitude.dispose(graph)?;
            part.modulation.dispose(graph)?;
            part.depth.dispose(graph)?;
        }
        self.output.dispose(graph)?;
        self.layer.dispose(graph)?;
        self.disposed = true;
        info!("disposed glass");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}
