//! Realtime side of the graph.

use std::ops::Range;

use rtrb::{Consumer, Producer};

use crate::automation::ParamProcessor;
use crate::clock::TransportClock;
use crate::MAX_BLOCK_SIZE;

use super::node::{Inputs, NodeId, Outputs, Processor, RenderCtx};

/// Arena slot of the node every graph is created with.
pub(crate) const DESTINATION: usize = 0;

/// A node as the processor sees it: kernel, input parameters and
/// preallocated port buffers.
pub(crate) struct NodeProcessor {
    kernel: Box<dyn Processor>,
    params: Vec<Option<ParamProcessor>>,
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
}

impl NodeProcessor {
    pub(crate) fn new(
        kernel: Box<dyn Processor>,
        params: Vec<Option<ParamProcessor>>,
        outputs: usize,
    ) -> Self {
        Self {
            kernel,
            inputs: params.iter().map(|_| vec![0.0; MAX_BLOCK_SIZE]).collect(),
            params,
            outputs: (0..outputs).map(|_| vec![0.0; MAX_BLOCK_SIZE]).collect(),
        }
    }

    /// Fill the input buffers: the port's own parameter when undriven,
    /// otherwise the sum of everything routed into it.
    fn gather(
        &mut self,
        len: usize,
        frame: u64,
        sample_rate: f32,
        driven: u32,
        routes: &[Route],
        nodes: &[Option<Box<NodeProcessor>>],
    ) {
        for (port, (buf, param)) in self.inputs.iter_mut().zip(&mut self.params).enumerate() {
            let buf = &mut buf[..len];
            // Driven parameters still render so they keep draining commands.
            match param {
                Some(param) => param.process(buf, frame, sample_rate),
                None => buf.fill(0.0),
            }
            if driven & (1 << port) != 0 {
                buf.fill(0.0);
            }
        }

        for route in routes {
            let Some(source) = nodes.get(route.source).and_then(|n| n.as_deref()) else {
                continue;
            };
            let (Some(dst), Some(src)) = (
                self.inputs.get_mut(route.input),
                source.outputs.get(route.output),
            ) else {
                continue;
            };
            for (d, &s) in dst[..len].iter_mut().zip(&src[..len]) {
                *d += s;
            }
        }
    }

    fn run(&mut self, len: usize, ctx: &RenderCtx) {
        let inputs = Inputs::new(&self.inputs, len);
        let mut outputs = Outputs::new(&mut self.outputs, len);
        self.kernel.process(&inputs, &mut outputs, ctx);
    }
}

/// One incoming edge, resolved to arena indices.
pub(crate) struct Route {
    pub source: usize,
    pub output: usize,
    pub input: usize,
}

pub(crate) struct Step {
    pub node: usize,
    pub routes: Range<usize>,
    /// Bit `n` set when input `n` has at least one incoming edge.
    pub driven: u32,
}

/// Immutable render order. Replaced wholesale, never edited in place.
pub(crate) struct Topology {
    pub steps: Vec<Step>,
    pub routes: Vec<Route>,
}

pub(crate) enum GraphCommand {
    Insert { index: usize, node: Box<NodeProcessor> },
    Remove { index: usize },
    Topology(Box<Topology>),
    Start { index: usize, time: f64 },
    Stop { index: usize, time: f64 },
}

/// Allocations retired by the processor, freed on the control thread.
pub(crate) enum Garbage {
    Node(#[allow(dead_code)] Box<NodeProcessor>),
    Topology(#[allow(dead_code)] Box<Topology>),
}

/// Renders the graph. Lives on the processing thread.
pub struct GraphProcessor {
    nodes: Vec<Option<Box<NodeProcessor>>>,
    topology: Box<Topology>,
    rx: Consumer<GraphCommand>,
    garbage: Producer<Garbage>,
    clock: TransportClock,
    sample_rate: f32,
    last_len: usize,
}

impl GraphProcessor {
    pub(crate) fn new(
        nodes: Vec<Option<Box<NodeProcessor>>>,
        topology: Box<Topology>,
        rx: Consumer<GraphCommand>,
        garbage: Producer<Garbage>,
        clock: TransportClock,
    ) -> Self {
        let sample_rate = clock.sample_rate();
        Self {
            nodes,
            topology,
            rx,
            garbage,
            clock,
            sample_rate,
            last_len: 0,
        }
    }

    /// Render the destination's input into `out`, in chunks of at most
    /// `MAX_BLOCK_SIZE` frames. Pending control changes apply at the start
    /// of each chunk.
    pub fn process(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.drain();

            let len = chunk.len();
            let frame = self.clock.frame();
            self.render(len, frame);

            match self.nodes.get(DESTINATION).and_then(|n| n.as_deref()) {
                Some(destination) => chunk.copy_from_slice(&destination.outputs[0][..len]),
                None => chunk.fill(0.0),
            }

            self.last_len = len;
            self.clock.advance(len as u64);
        }
    }

    /// Transport frame of the next sample to render.
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Last sample that reached input `port` of `node` in the previous block.
    pub fn input_value(&self, node: NodeId, port: usize) -> Option<f32> {
        let node = self.nodes.get(node.index())?.as_deref()?;
        node.inputs.get(port)?.get(self.last_len.checked_sub(1)?).copied()
    }

    /// Last sample `node` wrote to output `port` in the previous block.
    pub fn output_value(&self, node: NodeId, port: usize) -> Option<f32> {
        let node = self.nodes.get(node.index())?.as_deref()?;
        node.outputs.get(port)?.get(self.last_len.checked_sub(1)?).copied()
    }

    fn render(&mut self, len: usize, frame: u64) {
        let ctx = RenderCtx::new(self.sample_rate, frame);
        let Self {
            nodes, topology, ..
        } = self;

        for step in &topology.steps {
            let Some(mut node) = nodes.get_mut(step.node).and_then(Option::take) else {
                continue;
            };
            node.gather(
                len,
                frame,
                ctx.sample_rate,
                step.driven,
                &topology.routes[step.routes.clone()],
                nodes,
            );
            node.run(len, &ctx);
            nodes[step.node] = Some(node);
        }
    }

    fn drain(&mut self) {
        while let Ok(command) = self.rx.pop() {
            match command {
                GraphCommand::Insert { index, node } => {
                    if let Some(slot) = self.nodes.get_mut(index) {
                        if let Some(old) = slot.replace(node) {
                            self.retire(Garbage::Node(old));
                        }
                    }
                }
                GraphCommand::Remove { index } => {
                    if let Some(old) = self.nodes.get_mut(index).and_then(Option::take) {
                        self.retire(Garbage::Node(old));
                    }
                }
                GraphCommand::Topology(topology) => {
                    let old = std::mem::replace(&mut self.topology, topology);
                    self.retire(Garbage::Topology(old));
                }
                GraphCommand::Start { index, time } => {
                    if let Some(node) = self.nodes.get_mut(index).and_then(|n| n.as_deref_mut()) {
                        node.kernel.start(time);
                    }
                }
                GraphCommand::Stop { index, time } => {
                    if let Some(node) = self.nodes.get_mut(index).and_then(|n| n.as_deref_mut()) {
                        node.kernel.stop(time);
                    }
                }
            }
        }
    }

    fn retire(&mut self, garbage: Garbage) {
        // A full return queue means the control thread stopped collecting;
        // the allocation is freed here instead.
        let _ = self.garbage.push(garbage);
    }
}
