use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Naive Oscillators
=================

Reference waveforms for FM voices. These are not band-limited: the saw,
square and pulse alias audibly at high frequencies. That is acceptable for
a modulation core whose job is routing and automation, and any graph node
can be swapped for a better kernel.

Waveforms, with phase in [0, 1):

  Sine       sin(2π · phase)             pure tone, the classic FM operator
  Saw        2 · phase - 1               all harmonics
  Square     +1 for phase < 0.5, else -1 odd harmonics
  Triangle   4 · |phase - 0.5| - 1       odd harmonics, soft
  Pulse(w)   +1 for phase < w, else -1   square with a movable edge

Frequency is read per sample, so a frequency input driven by a modulator
produces true frequency modulation. The frequency may swing negative under
deep modulation; the phase simply runs backwards.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscillatorWaveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Pulse { width: f32 },
}

impl OscillatorWaveform {
    #[inline]
    fn shape(self, phase: f32) -> f32 {
        match self {
            OscillatorWaveform::Sine => (TAU * phase).sin(),
            OscillatorWaveform::Saw => 2.0 * phase - 1.0,
            OscillatorWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorWaveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
            OscillatorWaveform::Pulse { width } => {
                if phase < width {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let value = self.waveform.shape(self.phase);
        self.phase = (self.phase + frequency / sample_rate).rem_euclid(1.0);
        value
    }

    /// Fill `out`, reading one frequency per sample.
    pub fn render(&mut self, out: &mut [f32], frequency: &[f32], sample_rate: f32) {
        for (sample, &freq) in out.iter_mut().zip(frequency) {
            *sample = self.next_sample(freq, sample_rate);
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
