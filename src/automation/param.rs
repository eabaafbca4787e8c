//! Automatable parameters and their realtime counterparts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use rtrb::{Consumer, Producer, RingBuffer};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::frame_time;
use crate::error::{Error, Result};

use super::timeline::{AutomationCommand, Event, Timeline};

/// Commands a parameter can have in flight before the processor drains them.
pub const PARAM_QUEUE_SIZE: usize = 512;

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(u64);

impl ParamId {
    fn next() -> Self {
        Self(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a value means. Ports carry a unit and only connect to a compatible
/// one; `Number` is the generic kind produced and accepted by conversion
/// stages such as scale and the factor side of a multiply.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Audio,
    Frequency,
    Gain,
    Ratio,
    Number,
}

impl Unit {
    /// Whether an input of this unit may be driven by a `source` output.
    pub fn accepts(self, source: Unit) -> bool {
        self == source || self == Unit::Number || source == Unit::Number
    }
}

/// Control-plane handle of a parameter.
///
/// Holds the sending end of the command queue and a mirror of the timeline
/// the processor is following, so queries never touch the audio thread.
pub struct Param {
    id: ParamId,
    unit: Unit,
    tx: Producer<AutomationCommand>,
    mirror: Timeline,
    value: Arc<AtomicF32>,
    detached: bool,
}

/// Realtime half of a parameter. Owned by whatever renders it, usually a
/// node input inside the graph processor.
pub struct ParamProcessor {
    id: ParamId,
    unit: Unit,
    rx: Consumer<AutomationCommand>,
    timeline: Timeline,
    value: Arc<AtomicF32>,
    last: f32,
    detached: bool,
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Param")
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("value", &self.value())
            .field("events", &self.mirror.events().len())
            .field("detached", &self.detached)
            .finish()
    }
}

impl Param {
    /// Create a parameter resting at `initial`.
    pub fn new(unit: Unit, initial: f32) -> (Param, ParamProcessor) {
        let id = ParamId::next();
        let (tx, rx) = RingBuffer::<AutomationCommand>::new(PARAM_QUEUE_SIZE);
        let value = Arc::new(AtomicF32::new(initial));

        let param = Param {
            id,
            unit,
            tx,
            mirror: Timeline::new(initial),
            value: Arc::clone(&value),
            detached: false,
        };
        let processor = ParamProcessor {
            id,
            unit,
            rx,
            timeline: Timeline::new(initial),
            value,
            last: initial,
            detached: false,
        };

        (param, processor)
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Last value the processor rendered.
    pub fn value(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Value the timeline produces at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        self.mirror.value_at(t)
    }

    /// Scheduled events, oldest first.
    pub fn events(&self) -> &[Event] {
        self.mirror.events()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Apply `commands` to the mirror and hand them to the processor as one
    /// chunk. Either every command is accepted or none is.
    pub(crate) fn submit(&mut self, now: f64, commands: &[AutomationCommand]) -> Result<()> {
        if self.detached {
            return Err(Error::Disposed);
        }

        let mut staged = self.mirror.clone();
        staged.prune_before(now);
        for &command in commands {
            staged.apply(command)?;
        }

        let chunk = self.tx.write_chunk_uninit(commands.len()).map_err(|_| {
            warn!(param = ?self.id, "automation queue full");
            Error::QueueFull
        })?;
        chunk.fill_from_iter(commands.iter().copied());

        self.mirror = staged;
        Ok(())
    }

    /// Stop the processor following the timeline; it keeps its last value.
    pub(crate) fn detach(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.tx
            .push(AutomationCommand::Detach)
            .map_err(|_| Error::QueueFull)?;
        self.mirror.apply(AutomationCommand::Detach)?;
        self.detached = true;
        Ok(())
    }

    /// Mark as detached without telling the processor, for when the
    /// processor is being dropped along with its node.
    pub(crate) fn retire(&mut self) {
        self.detached = true;
    }
}

impl ParamProcessor {
    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Render one value per frame, starting at `frame`.
    pub fn process(&mut self, out: &mut [f32], frame: u64, sample_rate: f32) {
        self.timeline.prune_before(frame_time(frame, sample_rate));
        self.drain();

        if self.detached || self.timeline.is_empty() {
            out.fill(self.timeline.value_at(frame_time(frame, sample_rate)));
        } else {
            for (i, sample) in out.iter_mut().enumerate() {
                *sample = self
                    .timeline
                    .value_at(frame_time(frame + i as u64, sample_rate));
            }
        }

        if let Some(&last) = out.last() {
            self.last = last;
            self.value.store(last, Ordering::Relaxed);
        }
    }

    fn drain(&mut self) {
        while let Ok(command) = self.rx.pop() {
            match command {
                AutomationCommand::Detach => {
                    self.timeline.reset(self.last);
                    self.detached = true;
                }
                // Capacity was checked against the mirror before sending.
                command => {
                    let _ = self.timeline.apply(command);
                }
            }
        }
    }
}
