use crate::clock::frame_time;
use crate::error::Result;

use super::port::{InputRef, OutputRef};

/// Context passed to node kernels during rendering
///
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - frame: Transport frame of the first sample in the block
pub struct RenderCtx {
    pub sample_rate: f32,
    pub frame: u64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, frame: u64) -> Self {
        Self { sample_rate, frame }
    }

    /// Absolute time of the first sample in the block.
    pub fn time(&self) -> f64 {
        frame_time(self.frame, self.sample_rate)
    }

    /// Absolute time of sample `offset` in the block.
    pub fn time_at(&self, offset: usize) -> f64 {
        frame_time(self.frame + offset as u64, self.sample_rate)
    }
}

/// Read-only view of a node's input buffers for one block.
pub struct Inputs<'a> {
    bufs: &'a [Vec<f32>],
    len: usize,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(bufs: &'a [Vec<f32>], len: usize) -> Self {
        Self { bufs, len }
    }

    /// Samples arriving at input `port`; empty if the port does not exist.
    pub fn get(&self, port: usize) -> &[f32] {
        match self.bufs.get(port) {
            Some(buf) => &buf[..self.len],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Writable view of a node's output buffers for one block.
pub struct Outputs<'a> {
    bufs: &'a mut [Vec<f32>],
    len: usize,
}

impl<'a> Outputs<'a> {
    pub(crate) fn new(bufs: &'a mut [Vec<f32>], len: usize) -> Self {
        Self { bufs, len }
    }

    /// Buffer for output `port`; empty if the port does not exist.
    pub fn get_mut(&mut self, port: usize) -> &mut [f32] {
        let len = self.len;
        match self.bufs.get_mut(port) {
            Some(buf) => &mut buf[..len],
            None => &mut [],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Kernel of a graph node. Runs on the processing thread: no locks, no
/// allocation, no I/O.
pub trait Processor: Send {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, ctx: &RenderCtx);

    /// Begin producing output at `time`.
    ///
    /// Default implementation does nothing (always-on nodes).
    fn start(&mut self, _time: f64) {
        // Default: do nothing
    }

    /// Stop producing output at `time`.
    ///
    /// Default implementation does nothing (always-on nodes).
    fn stop(&mut self, _time: f64) {
        // Default: do nothing
    }
}

/// Allow boxed kernels to be used as kernels (for dynamic dispatch)
impl Processor for Box<dyn Processor> {
    fn process(&mut self, inputs: &Inputs<'_>, outputs: &mut Outputs<'_>, ctx: &RenderCtx) {
        (**self).process(inputs, outputs, ctx)
    }

    fn start(&mut self, time: f64) {
        (**self).start(time)
    }

    fn stop(&mut self, time: f64) {
        (**self).stop(time)
    }
}

/// Arena handle of a node. The generation changes when a slot is reused,
/// so a handle to a disposed node never aliases its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn output(self, port: usize) -> OutputRef {
        OutputRef { node: self, port }
    }

    pub fn input(self, port: usize) -> InputRef {
        InputRef { node: self, port }
    }
}

/// Anything with a default output and a default input in the graph.
pub trait Connectable {
    fn output_ref(&self) -> OutputRef;
    fn input_ref(&self) -> InputRef;
}

impl Connectable for NodeId {
    fn output_ref(&self) -> OutputRef {
        self.output(0)
    }

    fn input_ref(&self) -> InputRef {
        self.input(0)
    }
}

/// Scoped resources released against some owning context.
///
/// Disposal is total and idempotent: a second call does nothing. Any other
/// operation on a disposed component fails with `Error::Disposed`.
pub trait Disposable {
    type Context;

    fn dispose(&mut self, ctx: &mut Self::Context) -> Result<()>;

    fn is_disposed(&self) -> bool;
}
