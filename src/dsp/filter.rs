use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type              | constructed by       | passes          | rejects      |
| ----------------- | -------------------- | --------------- | ------------ |
| low-pass          | LPF                  | below cutoff    | above cutoff |
| high-pass         | HPF                  | above cutoff    | below cutoff |
| band-pass         | LPF ∘ HPF (series)   | around cutoff   | outside      |
| notch / band-stop | LPF + HPF (parallel) | outside         | around       |

Resonance is expressed as Q. The damping term of the state-variable core is
k = 1 / Q, so Q = 0.707 is flat (Butterworth) and larger values ring. The
band-pass output is scaled by k to keep unity gain at the cutoff whatever
the Q, the way a constant-peak biquad band-pass behaves.
*/

/// Lowest Q the filter accepts; smaller values are clamped.
pub const MIN_Q: f32 = 0.05;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResponse {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    pub cutoff_hz: f32,
    pub q: f32,
    response: FilterResponse,
}

impl SVFilter {
    pub fn new(response: FilterResponse, cutoff_hz: f32, q: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            q,
            response,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self::new(FilterResponse::LowPass, cutoff_hz, 0.707)
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        Self::new(FilterResponse::HighPass, cutoff_hz, 0.707)
    }

    pub fn bandpass(cutoff_hz: f32) -> Self {
        Self::new(FilterResponse::BandPass, cutoff_hz, 0.707)
    }

    pub fn response(&self) -> FilterResponse {
        self.response
    }

    #[inline]
    fn compute_g(&self, sample_rate: f32) -> f32 {
        // Keep the prewarped frequency below Nyquist so tan() stays finite.
        let cutoff = self.cutoff_hz.clamp(10.0, sample_rate * 0.49);
        let wd = TAU * cutoff;
        let wa = (2.0 * sample_rate) * (wd / (2.0 * sample_rate)).tan();
        wa / (2.0 * sample_rate)
    }

    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    /// Filter `buffer` in place with the current cutoff and Q.
    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let g = self.compute_g(sample_rate);
        let k = 1.0 / self.q.max(MIN_Q);

        for sample in buffer.iter_mut() {
            let outputs = self.next_sample(*sample, k, g);

            *sample = match self.response {
                FilterResponse::LowPass => outputs.lowpass,
                FilterResponse::HighPass => outputs.highpass,
                FilterResponse::BandPass => k * outputs.bandpass,
                FilterResponse::Notch => outputs.notch,
            }
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff;
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::OscillatorBlock;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        let skip = buffer.len().min(256);
        buffer
            .get(skip..)
            .unwrap_or(buffer)
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        let mut osc = OscillatorBlock::sine();
        let mut buffer = vec![0.0f32; len];
        osc.render(&mut buffer, &vec![freq; len], SAMPLE_RATE);
        buffer
    }

    #[test]
    fn test_lowpass_basic() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = vec![1.0; 512];

        filter.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer[511] > 0.99, "dc should pass, got {}", buffer[511]);
    }

    #[test]
    fn test_highpass_basic() {
        let mut filter = SVFilter::highpass(500.0);
        let mut buffer = vec![1.0; 512];

        filter.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer[511].abs() < 0.01, "dc should be blocked, got {}", buffer[511]);
    }

    #[test]
    fn test_lowpass_filters_high_freq() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = sine(5_000.0, 1024); // 10x cutoff

        filter.render(&mut buffer, SAMPLE_RATE);

        let peak = peak_after_transient(&buffer);
        assert!(
            peak < 0.3,
            "Expected high freq attenuation, got peak: {}",
            peak
        );
    }

    #[test]
    fn test_bandpass_unity_at_cutoff() {
        let cutoff = 1_000.0;
        let mut filter = SVFilter::new(FilterResponse::BandPass, cutoff, 6.0);

        let mut pass = sine(cutoff, 4096);
        filter.render(&mut pass, SAMPLE_RATE);
        let pass_peak = peak_after_transient(&pass[2048..]);

        filter.reset();
        let mut off = sine(200.0, 4096);
        filter.render(&mut off, SAMPLE_RATE);
        let off_peak = peak_after_transient(&off[2048..]);

        assert!(
            (pass_peak - 1.0).abs() < 0.1,
            "expected unity gain at cutoff, got {}",
            pass_peak
        );
        assert!(
            pass_peak > off_peak * 4.0,
            "expected bandpass to emphasize cutoff freq, got pass_peak={}, off_peak={}",
            pass_peak,
            off_peak
        );
    }

    #[test]
    fn test_set_cutoff_affects_filtering() {
        let test_freq = 1_000.0;

        let mut filter = SVFilter::lowpass(200.0);
        let mut low = sine(test_freq, 1024);
        filter.render(&mut low, SAMPLE_RATE);
        let peak_low_cutoff = peak_after_transient(&low);

        filter.reset();
        filter.set_cutoff(5_000.0);
        let mut high = sine(test_freq, 1024);
        filter.render(&mut high, SAMPLE_RATE);
        let peak_high_cutoff = peak_after_transient(&high);

        assert!(
            peak_high_cutoff > peak_low_cutoff * 2.0,
            "High cutoff should pass more signal: high={}, low={}",
            peak_high_cutoff,
            peak_low_cutoff
        );
    }

    #[test]
    fn test_q_affects_peak() {
        let cutoff = 1_000.0;

        let mut filter = SVFilter::lowpass(cutoff);
        filter.set_q(0.5);
        let mut flat = sine(cutoff, 2048);
        filter.render(&mut flat, SAMPLE_RATE);
        let peak_low_q = peak_after_transient(&flat);

        filter.reset();
        filter.set_q(4.0);
        let mut resonant = sine(cutoff, 2048);
        filter.render(&mut resonant, SAMPLE_RATE);
        let peak_high_q = peak_after_transient(&resonant);

        assert!(
            peak_high_q > peak_low_q * 2.0,
            "Higher Q should boost signal at cutoff: high_q={}, low_q={}",
            peak_high_q,
            peak_low_q
        );
    }

    #[test]
    fn test_cutoff_above_nyquist_stays_finite() {
        let mut filter = SVFilter::highpass(40_000.0);
        let mut buffer = sine(440.0, 256);
        filter.render(&mut buffer, SAMPLE_RATE);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
