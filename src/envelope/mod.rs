//! Triggerable envelopes that write breakpoint curves onto a parameter.

/*
Envelopes as Scheduled Curves
=============================

An envelope here does no per-sample work of its own. Each trigger turns
the envelope's shape into a curve of breakpoints and hands it to the
automation scheduler, which installs it on the envelope's parameter. The
graph renders that parameter like any other signal.

Two Shapes
----------

  ADSR   attack, decay, sustain, release. The attack starts from whatever
         value the parameter has at the trigger time, so a retrigger in
         the middle of a release never clicks.

           peak ┐    ╱╲
                │   ╱  ╲________
        sustain │  ╱            ╲
                │ ╱              ╲
              0 └╱────────────────╲──→ time
                 attack decay      release

  Line   a literal list of (value, time) points. On attack the first point
         is held and the rest are joined by exponential ramps. Release is
         pure cancellation: the value freezes wherever it is.


Attack + Release in One Call
----------------------------

`trigger_attack_release(duration, ..)` fits the attack into the note:
every breakpoint offset is multiplied by `duration`. A line envelope uses
linear ramps in this form and never releases. An ADSR envelope also
schedules its release at `time + duration`, lasting `release · duration`.


Exponential Segments and Zero
-----------------------------

An exponential ramp can never reach or leave zero. Ramps that would are
rewritten:

    to zero     ramp to MIN_EXPONENTIAL_VALUE, then step to 0
    from zero   linear ramp instead


Velocity
--------

Velocity in [0, 1] scales every value of the attack, but only for
amplitude envelopes. Other envelopes ignore it.
*/

mod config;

pub use config::{AdsrConfig, EnvelopeShape, LineConfig};

use tracing::debug;

use crate::automation::{
    Breakpoint, Curve, Event, Param, Ramp, Scheduler, Unit, MIN_EXPONENTIAL_VALUE,
};
use crate::error::{Error, Result};
use crate::graph::{ports, Connectable, Disposable, Graph, InputRef, Node, NodeKind, OutputRef};

/// Components that respond to note-style triggers.
pub trait Triggerable {
    /// Start the attack at `time`, or now.
    fn trigger_attack(&mut self, time: Option<f64>) -> Result<()>;

    /// Start the release at `time`, or now.
    fn trigger_release(&mut self, time: Option<f64>) -> Result<()>;

    /// Attack at `time` fitted into `duration` seconds, followed by the
    /// release where the component has one.
    fn trigger_attack_release(
        &mut self,
        duration: f64,
        time: Option<f64>,
        velocity: Option<f32>,
    ) -> Result<()>;
}

/// Reject durations a note cannot have.
pub(crate) fn check_duration(duration: f64) -> Result<f64> {
    if duration.is_finite() && duration > 0.0 {
        Ok(duration)
    } else {
        Err(Error::InvalidDuration(duration))
    }
}

/// Velocity clamped into `[0, 1]`, 1 when absent.
pub(crate) fn velocity_or_full(velocity: Option<f32>) -> f32 {
    match velocity {
        Some(v) if v.is_nan() => 1.0,
        Some(v) => v.clamp(0.0, 1.0),
        None => 1.0,
    }
}

/// A parameter driven by an ADSR or line shape, living in a graph.
///
/// The plain form outputs the envelope itself. The amplitude form is a
/// gain stage whose gain follows the envelope: audio goes in and comes out
/// shaped.
#[derive(Debug)]
pub struct Envelope {
    shape: EnvelopeShape,
    scheduler: Scheduler,
    param: Param,
    node: Node,
    vca: Option<Node>,
    disposed: bool,
}

impl Envelope {
    /// Envelope whose output is the envelope value.
    pub fn new(graph: &mut Graph, shape: impl Into<EnvelopeShape>) -> Result<Self> {
        Self::build(graph, shape.into(), false)
    }

    /// Gain stage whose gain follows the envelope. Velocity applies.
    pub fn amplitude(graph: &mut Graph, shape: impl Into<EnvelopeShape>) -> Result<Self> {
        Self::build(graph, shape.into(), true)
    }

    fn build(graph: &mut Graph, shape: EnvelopeShape, amplitude: bool) -> Result<Self> {
        shape.validate()?;

        let (param, processor) = Param::new(Unit::Gain, 0.0);
        let (node, vca) = graph.build(|graph| {
            let node = graph.add(NodeKind::Automated(processor))?;
            if !amplitude {
                return Ok((node, None));
            }
            let vca = graph.add(NodeKind::gain(Unit::Audio, 0.0))?;
            graph.connect(&node, vca.input(ports::gain::GAIN))?;
            Ok((node, Some(vca)))
        })?;

        debug!(param = ?param.id(), amplitude, "created envelope");
        Ok(Self {
            shape,
            scheduler: graph.scheduler(),
            param,
            node,
            vca,
            disposed: false,
        })
    }

    pub fn shape(&self) -> &EnvelopeShape {
        &self.shape
    }

    pub fn is_amplitude(&self) -> bool {
        self.vca.is_some()
    }

    /// Replace the shape used by later triggers. Scheduled automation is
    /// left as it is.
    pub fn set_shape(&mut self, shape: impl Into<EnvelopeShape>) -> Result<()> {
        self.ensure_live()?;
        let shape = shape.into();
        shape.validate()?;
        self.shape = shape;
        Ok(())
    }

    /// Current value of the envelope.
    pub fn value(&self) -> Result<f32> {
        self.value_at(self.scheduler.now())
    }

    /// Value the envelope will have at `time`, as scheduled so far.
    pub fn value_at(&self, time: f64) -> Result<f32> {
        self.ensure_live()?;
        self.scheduler.value_at(&self.param, time)
    }

    /// Scheduled breakpoints, oldest first.
    pub fn events(&self) -> &[Event] {
        self.param.events()
    }

    /// Attack with a velocity. Velocity only matters for amplitude
    /// envelopes.
    pub fn attack(&mut self, time: Option<f64>, velocity: Option<f32>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;
        let peak = self.peak(velocity);

        let curve = match &self.shape {
            EnvelopeShape::Adsr(adsr) => {
                let start = self.param.value_at(time.max(self.scheduler.now()));
                adsr_attack(adsr, start, peak)?
            }
            EnvelopeShape::Line(line) => LineConfig::new(
                line.points
                    .iter()
                    .map(|&(value, offset)| ((value * peak).max(MIN_EXPONENTIAL_VALUE), offset))
                    .collect(),
            )
            .curve(Ramp::Exponential)?,
        };
        self.scheduler.schedule_curve(&mut self.param, &curve, time)
    }

    fn release(&mut self, time: Option<f64>, release: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        let time = self.scheduler.resolve(time)?;

        match &self.shape {
            EnvelopeShape::Line(_) => self.scheduler.cancel_from(&mut self.param, time),
            EnvelopeShape::Adsr(adsr) => {
                let from = self.param.value_at(time.max(self.scheduler.now()));
                let curve = adsr_release(adsr, release.unwrap_or(adsr.release), from)?;
                self.scheduler.schedule_curve(&mut self.param, &curve, time)
            }
        }
    }

    fn peak(&self, velocity: Option<f32>) -> f32 {
        if self.vca.is_some() {
            velocity_or_full(velocity)
        } else {
            1.0
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Triggerable for Envelope {
    fn trigger_attack(&mut self, time: Option<f64>) -> Result<()> {
        self.attack(time, None)
    }

    fn trigger_release(&mut self, time: Option<f64>) -> Result<()> {
        self.release(time, None)
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
        let peak = self.peak(velocity);

        match &self.shape {
            EnvelopeShape::Line(line) => {
                let curve = line.curve(Ramp::Linear)?.scaled(duration, peak)?;
                self.scheduler.schedule_curve(&mut self.param, &curve, time)
            }
            EnvelopeShape::Adsr(adsr) => {
                let scaled = adsr.scaled(duration);
                let start = self.param.value_at(time.max(self.scheduler.now()));
                let attack = adsr_attack(&scaled, start, peak)?;
                self.scheduler.schedule_curve(&mut self.param, &attack, time)?;
                self.release(Some(time + duration), Some(scaled.release))
            }
        }
    }
}

impl Connectable for Envelope {
    fn output_ref(&self) -> OutputRef {
        match &self.vca {
            Some(vca) => vca.output(ports::gain::OUT),
            None => self.node.output(ports::signal::OUT),
        }
    }

    fn input_ref(&self) -> InputRef {
        match &self.vca {
            Some(vca) => vca.input(ports::gain::IN),
            None => self.node.input(ports::signal::IN),
        }
    }
}

impl Disposable for Envelope {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.param.detach()?;
        if let Some(vca) = &mut self.vca {
            vca.dispose(graph)?;
        }
        self.node.dispose(graph)?;
        self.disposed = true;
        debug!(param = ?self.param.id(), "disposed envelope");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Attack and decay from `start`, peaking at `peak`.
fn adsr_attack(adsr: &AdsrConfig, start: f32, peak: f32) -> Result<Curve> {
    let start = if adsr.attack_curve == Ramp::Exponential {
        start.max(MIN_EXPONENTIAL_VALUE)
    } else {
        start
    };
    let mut points = vec![Breakpoint::hold(start, 0.0)];
    push_segment(&mut points, adsr.attack_curve, peak, adsr.attack);
    push_segment(
        &mut points,
        adsr.release_curve,
        adsr.sustain * peak,
        adsr.attack + adsr.decay,
    );
    Ok(Curve::new(points)?)
}

/// Fall from `from` to zero over `release` seconds.
fn adsr_release(adsr: &AdsrConfig, release: f64, from: f32) -> Result<Curve> {
    if release <= 0.0 {
        return Ok(Curve::new(vec![Breakpoint::hold(0.0, 0.0)])?);
    }
    let mut points = vec![Breakpoint::hold(from, 0.0)];
    push_segment(&mut points, adsr.release_curve, 0.0, release);
    Ok(Curve::new(points)?)
}

/// Append a segment, rewriting exponential ramps that touch zero.
fn push_segment(points: &mut Vec<Breakpoint>, ramp: Ramp, value: f32, offset: f64) {
    let from = points.last().map_or(value, |p| p.value);
    match ramp {
        Ramp::Exponential if from <= 0.0 => points.push(Breakpoint::linear(value, offset)),
        Ramp::Exponential if value <= 0.0 => {
            points.push(Breakpoint::exponential(MIN_EXPONENTIAL_VALUE, offset));
            points.push(Breakpoint::hold(value, offset));
        }
        ramp => points.push(Breakpoint {
            value,
            offset,
            ramp,
        }),
    }
}
