//! Built-in node kinds and their kernels.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::automation::{ParamProcessor, Unit};
use crate::dsp::filter::{FilterResponse, SVFilter};
use crate::dsp::modulate::{block_average, scale_range};
use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use crate::error::ConfigError;

use super::node::{Inputs, Outputs, Processor, RenderCtx};
use super::port::{ports, PortSpec};

/// Linear remap from one range onto another.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub in_low: f32,
    pub in_high: f32,
    pub out_low: f32,
    pub out_high: f32,
}

impl ScaleRange {
    /// Map `0..1` onto `low..high`.
    pub fn unit(low: f32, high: f32) -> Self {
        Self {
            in_low: 0.0,
            in_high: 1.0,
            out_low: low,
            out_high: high,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("in_low", self.in_low),
            ("in_high", self.in_high),
            ("out_low", self.out_low),
            ("out_high", self.out_high),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.in_low == self.in_high {
            return Err(ConfigError::EmptyScaleRange {
                low: self.in_low,
                high: self.in_high,
            });
        }
        Ok(())
    }
}

/// What to build when adding a node to the graph.
pub enum NodeKind {
    /// Automatable source. Passes its input through; while nothing drives
    /// the input it outputs its own parameter.
    Signal { unit: Unit, value: f32 },
    /// `out = in × factor`. The factor is a parameter and may itself be
    /// driven by another signal.
    Multiply { unit: Unit, factor: f32 },
    /// Linear range remap.
    Scale(ScaleRange),
    /// `out = in × gain` with summing ports on both sides: a mixer and a
    /// modulation-depth stage.
    Gain { unit: Unit, gain: f32 },
    Oscillator {
        waveform: OscillatorWaveform,
        frequency: f32,
    },
    Filter {
        response: FilterResponse,
        cutoff: f32,
        resonance: f32,
    },
    /// A signal node whose parameter is owned elsewhere, e.g. by an
    /// envelope.
    Automated(ParamProcessor),
    /// Caller-supplied kernel and port layout.
    Custom {
        ports: PortSpec,
        processor: Box<dyn Processor>,
    },
}

impl NodeKind {
    pub fn signal(unit: Unit, value: f32) -> Self {
        NodeKind::Signal { unit, value }
    }

    pub fn multiply(unit: Unit, factor: f32) -> Self {
        NodeKind::Multiply { unit, factor }
    }

    pub fn gain(unit: Unit, gain: f32) -> Self {
        NodeKind::Gain { unit, gain }
    }

    pub fn oscillator(waveform: OscillatorWaveform, frequency: f32) -> Self {
        NodeKind::Oscillator {
            waveform,
            frequency,
        }
    }

    pub fn filter(response: FilterResponse, cutoff: f32, resonance: f32) -> Self {
        NodeKind::Filter {
            response,
            cutoff,
            resonance,
        }
    }

    /// Port layout, kernel, and the externally owned parameter if any.
    pub(crate) fn into_parts(
        self,
    ) -> Result<(PortSpec, Box<dyn Processor>, Option<ParamProcessor>), ConfigError> {
        let parts: (PortSpec, Box<dyn Processor>, Option<ParamProcessor>) = match self {
            NodeKind::Signal { unit, value } => (
                PortSpec::new()
                    .input("in", unit, false, finite("value", value)?)
                    .output("out", unit),
                boxed(Passthrough),
                None,
            ),
            NodeKind::Multiply { unit, factor } => (
                PortSpec::new()
                    .input("in", unit, false, 0.0)
                    .input("factor", Unit::Number, false, finite("factor", factor)?)
                    .output("out", unit),
                boxed(Product),
                None,
            ),
            NodeKind::Scale(range) => {
                range.validate()?;
                (
                    PortSpec::new()
                        .input("in", Unit::Number, false, range.in_low)
                        .output("out", Unit::Number),
                    boxed(Scale { range }),
                    None,
                )
            }
            NodeKind::Gain { unit, gain } => (
                PortSpec::new()
                    .input("in", unit, true, 0.0)
                    .input("gain", Unit::Number, true, finite("gain", gain)?)
                    .output("out", unit),
                boxed(Product),
                None,
            ),
            NodeKind::Oscillator {
                waveform,
                frequency,
            } => (
                PortSpec::new()
                    .input("frequency", Unit::Frequency, true, finite("frequency", frequency)?)
                    .output("out", Unit::Audio),
                boxed(Oscillator::new(waveform)),
                None,
            ),
            NodeKind::Filter {
                response,
                cutoff,
                resonance,
            } => (
                PortSpec::new()
                    .input("in", Unit::Audio, true, 0.0)
                    .input("cutoff", Unit::Frequency, false, positive("cutoff", cutoff)?)
                    .input("resonance", Unit::Number, false, positive("resonance", resonance)?)
                    .output("out", Unit::Audio),
                boxed(Filter::new(response)),
                None,
            ),
            NodeKind::Automated(param) => (
                PortSpec::new()
                    .input("in", param.unit(), false, 0.0)
                    .output("out", param.unit()),
                boxed(Passthrough),
                Some(param),
            ),
            NodeKind::Custom { ports, processor } => (ports, processor, None),
        };
        Ok(parts)
    }
}

fn boxed<P: Processor + 'static>(processor: P) -> Box<dyn Processor> {
    Box::new(processor)
}

fn finite(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn positive(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

/// Copies input 0 to output 0.
pub(crate) struct Passthrough;

impl Processor for Passthrough {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, _ctx: &RenderCtx) {
        outputs
            .get_mut(ports::signal::OUT)
            .copy_from_slice(inputs.get(ports::signal::IN));
    }
}

/// Multiplies input 0 by input 1, sample by sample.
struct Product;

impl Processor for Product {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, _ctx: &RenderCtx) {
        let signal = inputs.get(ports::multiply::IN);
        let factor = inputs.get(ports::multiply::FACTOR);
        let out = outputs.get_mut(ports::multiply::OUT);
        for ((o, &s), &f) in out.iter_mut().zip(signal).zip(factor) {
            *o = s * f;
        }
    }
}

struct Scale {
    range: ScaleRange,
}

impl Processor for Scale {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, _ctx: &RenderCtx) {
        let r = self.range;
        let out = outputs.get_mut(ports::scale::OUT);
        for (o, &x) in out.iter_mut().zip(inputs.get(ports::scale::IN)) {
            *o = scale_range(x, r.in_low, r.in_high, r.out_low, r.out_high);
        }
    }
}

/// Oscillator gated by start/stop times. Silent until started.
struct Oscillator {
    osc: OscillatorBlock,
    start: Option<f64>,
    stop: Option<f64>,
}

impl Oscillator {
    fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            osc: OscillatorBlock::new(waveform),
            start: None,
            stop: None,
        }
    }

    #[inline]
    fn running(&self, t: f64) -> bool {
        self.start.is_some_and(|s| t >= s) && self.stop.map_or(true, |s| t < s)
    }
}

impl Processor for Oscillator {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, ctx: &RenderCtx) {
        let frequency = inputs.get(ports::oscillator::FREQUENCY);
        let out = outputs.get_mut(ports::oscillator::OUT);

        for (i, (o, &freq)) in out.iter_mut().zip(frequency).enumerate() {
            *o = if self.running(ctx.time_at(i)) {
                self.osc.next_sample(freq, ctx.sample_rate)
            } else {
                0.0
            };
        }
    }

    fn start(&mut self, time: f64) {
        if !self.running(time) {
            self.osc.reset();
        }
        self.start = Some(time);
        self.stop = None;
    }

    fn stop(&mut self, time: f64) {
        self.stop = Some(time);
    }
}

/// State-variable filter with block-rate cutoff and Q.
struct Filter {
    svf: SVFilter,
}

impl Filter {
    fn new(response: FilterResponse) -> Self {
        Self {
            svf: SVFilter::new(response, 1_000.0, 0.707),
        }
    }
}

impl Processor for Filter {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, ctx: &RenderCtx) {
        self.svf
            .set_cutoff(block_average(inputs.get(ports::filter::CUTOFF)));
        self.svf
            .set_q(block_average(inputs.get(ports::filter::RESONANCE)));

        let out = outputs.get_mut(ports::filter::OUT);
        out.copy_from_slice(inputs.get(ports::filter::IN));
        self.svf.render(out, ctx.sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kernel: &mut dyn Processor, inputs: Vec<Vec<f32>>, frame: u64) -> Vec<f32> {
        let len = inputs[0].len();
        let mut outs = vec![vec![0.0; len]];
        let ctx = RenderCtx::new(4.0, frame);
        kernel.process(&Inputs::new(&inputs, len), &mut Outputs::new(&mut outs, len), &ctx);
        outs.remove(0)
    }

    #[test]
    fn product_multiplies_per_sample() {
        let out = run(&mut Product, vec![vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 0.5]], 0);
        assert_eq!(out, vec![2.0, 4.0, 1.5]);
    }

    #[test]
    fn scale_maps_unit_range() {
        let mut scale = Scale {
            range: ScaleRange::unit(1.5, 1.483),
        };
        let out = run(&mut scale, vec![vec![0.0, 1.0]], 0);
        assert_eq!(out, vec![1.5, 1.483]);
    }

    #[test]
    fn oscillator_is_silent_until_started() {
        let mut osc = Oscillator::new(OscillatorWaveform::Square);
        let out = run(&mut osc, vec![vec![1.0; 4]], 0);
        assert_eq!(out, vec![0.0; 4]);

        // 4 Hz sample rate: frames 4..8 span 1.0s..2.0s.
        osc.start(1.5);
        let out = run(&mut osc, vec![vec![1.0; 4]], 4);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 1.0]);

        osc.stop(2.25);
        let out = run(&mut osc, vec![vec![1.0; 4]], 8);
        assert_eq!(out, vec![-1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn scale_range_rejects_empty_input() {
        let range = ScaleRange {
            in_low: 1.0,
            in_high: 1.0,
            out_low: 0.0,
            out_high: 1.0,
        };
        assert!(matches!(
            range.validate(),
            Err(ConfigError::EmptyScaleRange { .. })
        ));
    }
}
