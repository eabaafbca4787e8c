//! Bell voice.
//!
//! A single FM pair tuned to a non-integer ratio. Frequency modulation at
//! a harmonicity of 1.4 puts sidebands between the harmonics, which the
//! ear hears as struck metal rather than a string or a pipe.
//!
//! # How It Works
//!
//! 1. A sine modulator runs at 1.4 × the carrier frequency
//! 2. A high modulation index (10) spreads energy over many sidebands
//! 3. An amplitude envelope with a fast attack and full sustain gates the
//!    carrier
//! 4. The release lets the tone ring out
//!
//! # Variations
//!
//! - Integer harmonicity (2, 3) = organ-like, in tune
//! - Lower modulation index = softer, rounder, closer to a glockenspiel
//! - Longer release = church bell

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automation::Unit;
use crate::dsp::modulate::db_to_gain;
use crate::envelope::{AdsrConfig, Envelope, Triggerable};
use crate::error::{ConfigError, Error, Result};
use crate::graph::{ports, Connectable, Disposable, Graph, InputRef, Node, NodeKind, OutputRef};
use crate::synth::{Voice, VoiceConfig};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BellConfig {
    pub voice: VoiceConfig,
    pub envelope: AdsrConfig,
    pub volume_db: f32,
}

impl BellConfig {
    pub fn classic() -> Self {
        Self {
            voice: VoiceConfig::sine(440.0, 1.4, 10.0),
            envelope: AdsrConfig::linear(0.01, 0.0, 1.0, 0.5),
            volume_db: -10.0,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.voice.validate()?;
        self.envelope.validate()?;
        if !self.volume_db.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "volume_db",
                value: self.volume_db,
            });
        }
        Ok(())
    }
}

/// FM voice behind an amplitude envelope.
#[derive(Debug)]
pub struct Bell {
    voice: Voice,
    envelope: Envelope,
    volume: Node,
    disposed: bool,
}

impl Bell {
    pub fn new(graph: &mut Graph, config: &BellConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &BellConfig) -> Result<Self> {
        config.validate()?;

        let mut voice = Voice::new(graph, &config.voice)?;
        let envelope = Envelope::amplitude(graph, config.envelope)?;
        let volume = graph.add(NodeKind::gain(Unit::Audio, db_to_gain(config.volume_db)))?;
        graph.chain(&[&voice, &envelope, &volume])?;
        voice.start(graph, None)?;

        info!(frequency = config.voice.frequency, "created bell");
        Ok(Self {
            voice,
            envelope,
            volume,
            disposed: false,
        })
    }

    pub fn voice(&mut self) -> &mut Voice {
        &mut self.voice
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        self.voice.set_frequency(hz, time)
    }

    /// Strike with a velocity in `[0, 1]`.
    pub fn attack(&mut self, time: Option<f64>, velocity: Option<f32>) -> Result<()> {
        self.ensure_live()?;
        self.envelope.attack(time, velocity)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Triggerable for Bell {
    fn trigger_attack(&mut self, time: Option<f64>) -> Result<()> {
        self.attack(time, None)
    }

    fn trigger_release(&mut self, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        self.envelope.trigger_release(time)
    }

    fn trigger_attack_release(
        &mut self,
        duration: f64,
        time: Option<f64>,
        velocity: Option<f32>,
    ) -> Result<()> {
        self.ensure_live()?;
        self.envelope
            .trigger_attack_release(duration, time, velocity)
    }
}

impl Connectable for Bell {
    fn output_ref(&self) -> OutputRef {
        self.volume.output(ports::gain::OUT)
    }

    /// Frequency control of the voice.
    fn input_ref(&self) -> InputRef {
        self.voice.input_ref()
    }
}

impl Disposable for Bell {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.volume.dispose(graph)?;
        self.envelope.dispose(graph)?;
        self.voice.dispose(graph)?;
        self.disposed = true;
        info!("disposed bell");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}
