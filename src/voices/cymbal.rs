//! Cymbal voice.
//!
//! Six FM partials at fixed ratios of a base frequency, filtered into a
//! short bright *strike* and a longer *body*. The partial ratios come from
//! measurements of an analog drum machine's metal circuit.
//!
//! # How It Works
//!
//! 1. A partial bank holds six square-wave carriers, each frequency
//!    modulated by a 75% pulse
//! 2. `inharmonicity` slides every partial between a harmonic ratio table
//!    (0) and the measured inharmonic one (1)
//! 3. The summed partials feed both components in parallel
//! 4. Each component is band-pass → amplitude envelope → high-pass, with
//!    the high-pass cutoff and resonance following the band-pass through
//!    fixed multipliers
//! 5. Sustain is zero: every hit decays on its own, a release chokes it
//!
//! # Variations
//!
//! - Inharmonicity at 0 = pitched, gong-like ring
//! - Shorter body decay = closed hat
//! - Lower strike cutoff = trashy china
//! - Small body release and an early `trigger_release` = choked crash

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::automation::{Param, Ramp, Scheduler, Unit};
use crate::dsp::filter::FilterResponse;
use crate::dsp::modulate::db_to_gain;
use crate::dsp::oscillator::OscillatorWaveform;
use crate::envelope::{check_duration, AdsrConfig, Envelope, Triggerable};
use crate::error::{ConfigError, Error, GraphError, Result};
use crate::graph::{
    ports, Connectable, Disposable, Graph, InputRef, Node, NodeKind, OutputRef,
};
use crate::synth::{take_param, PartialBank, PartialBankConfig, VoiceConfig};

/// Measured ratios of the six partials.
pub const INHARMONIC_RATIOS: [f32; 6] = [1.0, 1.483, 1.932, 2.546, 2.630, 3.897];

/// Ratios that make the cymbal sound pitched.
pub const HARMONIC_RATIOS: [f32; 6] = [1.0, 1.5, 2.025, 2.975, 4.0, 6.0];

/// High-pass cutoff and resonance over band-pass cutoff and resonance.
const STRIKE_SCALARS: (f32, f32) = (1.886, 0.533);
const BODY_SCALARS: (f32, f32) = (1.643, 0.333);

/// Gain of each partial before the filters.
const PARTIAL_GAIN_DB: f32 = -10.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CymbalComponentConfig {
    pub volume_db: f32,
    /// Band-pass centre in Hz.
    pub cutoff: f32,
    pub resonance: f32,
    pub attack: f64,
    pub decay: f64,
    pub release: f64,
}

impl CymbalComponentConfig {
    /// Amplitude envelope: exponential rise, no sustain.
    fn envelope(&self) -> AdsrConfig {
        AdsrConfig {
            attack_curve: Ramp::Exponential,
            ..AdsrConfig::exponential(self.attack, self.decay, 0.0, self.release)
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.volume_db.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "volume_db",
                value: self.volume_db,
            });
        }
        for (field, value) in [("cutoff", self.cutoff), ("resonance", self.resonance)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        self.envelope().validate()
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CymbalConfig {
    pub frequency: f32,
    pub inharmonicity: f32,
    pub strike: CymbalComponentConfig,
    pub body: CymbalComponentConfig,
}

impl CymbalConfig {
    /// 200 Hz, fully harmonic, short bright strike over a 1.5 s body.
    pub fn classic() -> Self {
        Self {
            frequency: 200.0,
            inharmonicity: 0.0,
            strike: CymbalComponentConfig {
                volume_db: 0.0,
                cutoff: 3_500.0,
                resonance: 6.0,
                attack: 0.01,
                decay: 0.25,
                release: 0.0,
            },
            body: CymbalComponentConfig {
                volume_db: 0.0,
                cutoff: 7_000.0,
                resonance: 6.0,
                attack: 0.01,
                decay: 1.5,
                release: 0.3,
            },
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.strike.validate()?;
        self.body.validate()?;
        self.bank().validate()
    }

    fn bank(&self) -> PartialBankConfig {
        PartialBankConfig {
            frequency: self.frequency,
            inharmonicity: self.inharmonicity,
            harmonic: HARMONIC_RATIOS.to_vec(),
            inharmonic: INHARMONIC_RATIOS.to_vec(),
            voice: VoiceConfig {
                carrier: OscillatorWaveform::Square,
                modulator: OscillatorWaveform::Pulse { width: 0.75 },
                harmonicity: 1.5,
                modulation_index: 10.0,
                frequency: self.frequency,
            },
            gain_db: PARTIAL_GAIN_DB,
        }
    }
}

/// One filtered, enveloped branch of the cymbal.
#[derive(Debug)]
pub struct CymbalComponent {
    scheduler: Scheduler,
    bandpass: Node,
    envelope: Envelope,
    highpass: Node,
    volume: Node,
    cutoff_signal: Node,
    resonance_signal: Node,
    cutoff_scale: Node,
    resonance_scale: Node,
    cutoff: Param,
    resonance: Param,
}

impl CymbalComponent {
    fn new(
        graph: &mut Graph,
        config: &CymbalComponentConfig,
        (cutoff_scalar, resonance_scalar): (f32, f32),
    ) -> Result<Self> {
        let bandpass = graph.add(NodeKind::filter(
            FilterResponse::BandPass,
            config.cutoff,
            config.resonance,
        ))?;
        let envelope = Envelope::amplitude(graph, config.envelope())?;
        let highpass = graph.add(NodeKind::filter(
            FilterResponse::HighPass,
            config.cutoff * cutoff_scalar,
            config.resonance * resonance_scalar,
        ))?;
        let volume = graph.add(NodeKind::gain(Unit::Audio, db_to_gain(config.volume_db)))?;
        graph.chain(&[&bandpass, &envelope, &highpass, &volume])?;

        let mut cutoff_signal = graph.add(NodeKind::signal(Unit::Frequency, config.cutoff))?;
        let mut resonance_signal = graph.add(NodeKind::signal(Unit::Number, config.resonance))?;
        let cutoff_scale = graph.add(NodeKind::multiply(Unit::Frequency, cutoff_scalar))?;
        let resonance_scale = graph.add(NodeKind::multiply(Unit::Number, resonance_scalar))?;

        graph.connect(&cutoff_signal, bandpass.input(ports::filter::CUTOFF))?;
        graph.connect(&cutoff_signal, &cutoff_scale)?;
        graph.connect(&cutoff_scale, highpass.input(ports::filter::CUTOFF))?;
        graph.connect(&resonance_signal, bandpass.input(ports::filter::RESONANCE))?;
        graph.connect(&resonance_signal, &resonance_scale)?;
        graph.connect(&resonance_scale, highpass.input(ports::filter::RESONANCE))?;

        let cutoff = take_param(&mut cutoff_signal, ports::signal::IN)?;
        let resonance = take_param(&mut resonance_signal, ports::signal::IN)?;

        Ok(Self {
            scheduler: graph.scheduler(),
            bandpass,
            envelope,
            highpass,
            volume,
            cutoff_signal,
            resonance_signal,
            cutoff_scale,
            resonance_scale,
            cutoff,
            resonance,
        })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    /// Band-pass cutoff in Hz. The high-pass follows it.
    pub fn cutoff(&mut self) -> &mut Param {
        &mut self.cutoff
    }

    pub fn resonance(&mut self) -> &mut Param {
        &mut self.resonance
    }

    pub fn set_cutoff(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.scheduler.set_value_at(&mut self.cutoff, hz, time)
    }

    pub fn set_volume_db(&mut self, db: f32, time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        let port = ports::gain::GAIN;
        let id = self.volume.id().index();
        let gain = self
            .volume
            .param_mut(port)
            .ok_or(GraphError::UnknownInput { node: id, port })?;
        self.scheduler.set_value_at(gain, db_to_gain(db), time)
    }

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        self.envelope.dispose(graph)?;
        for node in [
            &mut self.bandpass,
            &mut self.highpass,
            &mut self.volume,
            &mut self.cutoff_signal,
            &mut self.resonance_signal,
            &mut self.cutoff_scale,
            &mut self.resonance_scale,
        ] {
            node.dispose(graph)?;
        }
        self.cutoff.retire();
        self.resonance.retire();
        Ok(())
    }
}

/// Metallic percussion: a partial bank through strike and body filters.
///
/// The oscillators run from construction on; only the envelopes are
/// triggered.
#[derive(Debug)]
pub struct Cymbal {
    scheduler: Scheduler,
    bank: PartialBank,
    strike: CymbalComponent,
    body: CymbalComponent,
    output: Node,
    disposed: bool,
}

impl Cymbal {
    pub fn new(graph: &mut Graph, config: &CymbalConfig) -> Result<Self> {
        graph.build(|graph| Self::wire(graph, config))
    }

    fn wire(graph: &mut Graph, config: &CymbalConfig) -> Result<Self> {
        config.validate()?;

        let mut bank = PartialBank::new(graph, &config.bank())?;
        let strike = CymbalComponent::new(graph, &config.strike, STRIKE_SCALARS)?;
        let body = CymbalComponent::new(graph, &config.body, BODY_SCALARS)?;
        let output = graph.add(NodeKind::gain(Unit::Audio, 1.0))?;

        for component in [&strike, &body] {
            graph.connect(&bank, &component.bandpass)?;
            graph.connect(&component.volume, &output)?;
        }
        bank.start(graph, None)?;

        info!(
            frequency = config.frequency,
            inharmonicity = config.inharmonicity,
            "created cymbal"
        );
        Ok(Self {
            scheduler: graph.scheduler(),
            bank,
            strike,
            body,
            output,
            disposed: false,
        })
    }

    pub fn strike(&mut self) -> &mut CymbalComponent {
        &mut self.strike
    }

    pub fn body(&mut self) -> &mut CymbalComponent {
        &mut self.body
    }

    pub fn bank(&self) -> &PartialBank {
        &self.bank
    }

    pub fn inharmonicity(&mut self) -> &mut Param {
        self.bank.inharmonicity()
    }

    pub fn frequency(&mut self) -> &mut Param {
        self.bank.frequency()
    }

    pub fn set_inharmonicity(&mut self, value: f32, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        self.bank.set_inharmonicity(value, time)
    }

    pub fn set_frequency(&mut self, hz: f32, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        self.bank.set_frequency(hz, time)
    }

    /// Hit the cymbal. Velocity scales both components.
    pub fn attack(&mut self, time: Option<f64>, velocity: Option<f32>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;
        self.body.envelope.attack(Some(time), velocity)?;
        self.strike.envelope.attack(Some(time), velocity)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Triggerable for Cymbal {
    fn trigger_attack(&mut self, time: Option<f64>) -> Result<()> {
        self.attack(time, None)
    }

    /// Choke both components.
    fn trigger_release(&mut self, time: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;
        self.strike.envelope.trigger_release(Some(time))?;
        self.body.envelope.trigger_release(Some(time))
    }

    fn trigger_attack_release(
        &mut self,
        duration: f64,
        time: Option<f64>,
        velocity: Option<f32>,
    ) -> Result<()> {
        self.ensure_live()?;
        let duration = check_duration(duration)?;
        let time = self.scheduler.resolve(time)?;
        self.attack(Some(time), velocity)?;
        self.trigger_release(Some(time + duration))
    }
}

impl Connectable for Cymbal {
    fn output_ref(&self) -> OutputRef {
        self.output.output(ports::gain::OUT)
    }

    /// The cymbal has no audio input; this is its frequency control.
    fn input_ref(&self) -> InputRef {
        self.bank.input_ref()
    }
}

impl Disposable for Cymbal {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.output.dispose(graph)?;
        self.strike.dispose(graph)?;
        self.body.dispose(graph)?;
        self.bank.dispose(graph)?;
        self.disposed = true;
        info!("disposed cymbal");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}
