#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::automation::{Breakpoint, Curve, Ramp};
use crate::error::ConfigError;

/// Attack, decay, sustain, release. Times in seconds, sustain as a fraction
/// of the peak.
///
/// The decay segment uses `release_curve`, so an exponential envelope
/// falls the same way in both of its downward phases.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrConfig {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f32,
    pub release: f64,
    pub attack_curve: Ramp,
    pub release_curve: Ramp,
}

impl AdsrConfig {
    /// Straight-line segments throughout.
    pub fn linear(attack: f64, decay: f64, sustain: f32, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
            attack_curve: Ramp::Linear,
            release_curve: Ramp::Linear,
        }
    }

    /// Exponential segments throughout.
    pub fn exponential(attack: f64, decay: f64, sustain: f32, release: f64) -> Self {
        Self {
            attack_curve: Ramp::Exponential,
            release_curve: Ramp::Exponential,
            ..Self::linear(attack, decay, sustain, release)
        }
    }

    /// Copy with every stage time multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            attack: self.attack * factor,
            decay: self.decay * factor,
            release: self.release * factor,
            ..*self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeTime { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.sustain) {
            return Err(ConfigError::SustainRange(self.sustain));
        }
        Ok(())
    }
}

/// Literal `(value, time)` breakpoints, times relative to the trigger.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, PartialEq)]
pub struct LineConfig {
    pub points: Vec<(f32, f64)>,
}

impl LineConfig {
    pub fn new(points: Vec<(f32, f64)>) -> Self {
        Self { points }
    }

    /// The points as a curve: first point held, the rest joined by `ramp`.
    pub(crate) fn curve(&self, ramp: Ramp) -> Result<Curve, ConfigError> {
        let points = self
            .points
            .iter()
            .enumerate()
            .map(|(i, &(value, offset))| Breakpoint {
                value,
                offset,
                ramp: if i == 0 { Ramp::Hold } else { ramp },
            })
            .collect();
        Curve::new(points).map_err(ConfigError::Line)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.curve(Ramp::Linear).map(|_| ())
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeShape {
    Adsr(AdsrConfig),
    Line(LineConfig),
}

impl EnvelopeShape {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EnvelopeShape::Adsr(adsr) => adsr.validate(),
            EnvelopeShape::Line(line) => line.validate(),
        }
    }
}

impl From<AdsrConfig> for EnvelopeShape {
    fn from(adsr: AdsrConfig) -> Self {
        EnvelopeShape::Adsr(adsr)
    }
}

impl From<LineConfig> for EnvelopeShape {
    fn from(line: LineConfig) -> Self {
        EnvelopeShape::Line(line)
    }
}
