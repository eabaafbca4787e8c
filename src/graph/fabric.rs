//! Control side of the graph: node arena, edges and topology.

use std::collections::VecDeque;
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::automation::{Param, ParamProcessor, Scheduler, Unit};
use crate::clock::TransportClock;
use crate::error::{ConfigError, Error, GraphError, Result};

use super::kernel::{NodeKind, Passthrough};
use super::node::{Connectable, Disposable, NodeId};
use super::port::{InputDef, InputRef, OutputDef, OutputRef, PortSpec, MAX_PORTS};
use super::processor::{
    Garbage, GraphCommand, GraphProcessor, NodeProcessor, Route, Step, Topology, DESTINATION,
};

/// Most nodes alive in one graph, the destination included.
pub const MAX_NODES: usize = 512;

/// Capacity of the command queue to the processor.
pub const GRAPH_QUEUE_SIZE: usize = 4096;

struct Slot {
    generation: u32,
    ports: Option<PortSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: OutputRef,
    to: InputRef,
}

/// A node added to a graph, together with the parameters behind its input
/// ports.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    params: Vec<Option<Param>>,
    disposed: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn param(&self, port: usize) -> Option<&Param> {
        self.params.get(port)?.as_ref()
    }

    pub fn param_mut(&mut self, port: usize) -> Option<&mut Param> {
        self.params.get_mut(port)?.as_mut()
    }

    /// Move the parameter of `port` out, e.g. to expose it on a composite.
    pub fn take_param(&mut self, port: usize) -> Option<Param> {
        self.params.get_mut(port)?.take()
    }

    pub fn output(&self, port: usize) -> OutputRef {
        self.id.output(port)
    }

    pub fn input(&self, port: usize) -> InputRef {
        self.id.input(port)
    }
}

impl Connectable for Node {
    fn output_ref(&self) -> OutputRef {
        self.id.output(0)
    }

    fn input_ref(&self) -> InputRef {
        self.id.input(0)
    }
}

impl Disposable for Node {
    type Context = Graph;

    fn dispose(&mut self, graph: &mut Graph) -> Result<()> {
        graph.remove(self)
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Owns the graph structure. Every change is validated here and reaches
/// the processor as a new topology snapshot.
pub struct Graph {
    sample_rate: f32,
    scheduler: Scheduler,
    slots: Vec<Slot>,
    free: Vec<usize>,
    edges: Vec<Edge>,
    tx: Producer<GraphCommand>,
    garbage: Consumer<Garbage>,
    destination: NodeId,
    /// Nodes added by the `build` calls in progress, outermost first.
    journal: Vec<NodeId>,
    building: usize,
}

impl Graph {
    pub fn new(sample_rate: f32) -> Result<(Graph, GraphProcessor)> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::SampleRate(sample_rate).into());
        }

        let clock = TransportClock::new(sample_rate);
        let (tx, rx) = RingBuffer::new(GRAPH_QUEUE_SIZE);
        let (garbage_tx, garbage_rx) = RingBuffer::new(GRAPH_QUEUE_SIZE);

        let ports = PortSpec::new()
            .input("in", Unit::Audio, true, 0.0)
            .output("out", Unit::Audio);
        let destination = NodeProcessor::new(Box::new(Passthrough), vec![None], 1);

        let mut nodes: Vec<Option<Box<NodeProcessor>>> = (0..MAX_NODES).map(|_| None).collect();
        nodes[DESTINATION] = Some(Box::new(destination));
        let topology = Topology {
            steps: vec![Step {
                node: DESTINATION,
                routes: 0..0,
                driven: 0,
            }],
            routes: Vec::new(),
        };

        let graph = Graph {
            sample_rate,
            scheduler: Scheduler::new(Arc::new(clock.clone())),
            slots: vec![Slot {
                generation: 0,
                ports: Some(ports),
            }],
            free: Vec::new(),
            edges: Vec::new(),
            tx,
            garbage: garbage_rx,
            destination: NodeId {
                index: DESTINATION as u32,
                generation: 0,
            },
            journal: Vec::new(),
            building: 0,
        };
        let processor = GraphProcessor::new(nodes, Box::new(topology), rx, garbage_tx, clock);

        debug!(sample_rate, "created graph");
        Ok((graph, processor))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Current transport time in seconds.
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Scheduler bound to this graph's transport clock.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// The node whose input is the graph's output.
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.slots
            .get(node.index())
            .is_some_and(|s| s.generation == node.generation && s.ports.is_some())
    }

    /// Live nodes, the destination included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.ports.is_some()).count()
    }

    pub fn edges(&self) -> impl Iterator<Item = (OutputRef, InputRef)> + '_ {
        self.edges.iter().map(|e| (e.from, e.to))
    }

    pub fn ports(&self, node: NodeId) -> Result<&PortSpec> {
        Ok(self.spec(node)?)
    }

    /// Add a node. Every input port gets its own parameter, except the
    /// first port of an `Automated` node, which uses the supplied one.
    pub fn add(&mut self, kind: NodeKind) -> Result<Node> {
        self.collect_garbage();
        let (spec, kernel, mut external) = kind.into_parts()?;
        let most = spec.inputs.len().max(spec.outputs.len());
        if most > MAX_PORTS {
            return Err(GraphError::TooManyPorts(most).into());
        }
        self.reserve(2)?;

        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < MAX_NODES => {
                self.slots.push(Slot {
                    generation: 0,
                    ports: None,
                });
                self.slots.len() - 1
            }
            None => return Err(GraphError::Capacity(MAX_NODES).into()),
        };

        let (params, processors): (Vec<Option<Param>>, Vec<Option<ParamProcessor>>) = spec
            .inputs
            .iter()
            .enumerate()
            .map(|(port, def)| {
                if port == 0 {
                    if let Some(processor) = external.take() {
                        return (None, Some(processor));
                    }
                }
                let (param, processor) = Param::new(def.unit, def.default);
                (Some(param), Some(processor))
            })
            .unzip();
        let outputs = spec.outputs.len();

        let slot = &mut self.slots[index];
        slot.ports = Some(spec);
        let id = NodeId {
            index: index as u32,
            generation: slot.generation,
        };

        let node = Box::new(NodeProcessor::new(kernel, processors, outputs));
        let topology = self.topology()?;
        self.send([
            GraphCommand::Insert { index, node },
            GraphCommand::Topology(Box::new(topology)),
        ])?;

        if self.building > 0 {
            self.journal.push(id);
        }
        debug!(node = index, generation = id.generation, "added node");
        Ok(Node {
            id,
            params,
            disposed: false,
        })
    }

    /// Connect an output to an input. Connecting the same pair twice is a
    /// no-op.
    pub fn connect(&mut self, from: impl Into<OutputRef>, to: impl Into<InputRef>) -> Result<()> {
        self.collect_garbage();
        self.reserve(1)?;
        let (from, to) = (from.into(), to.into());
        if self.link(from, to)? {
            self.commit()?;
            debug!(
                from = from.node.index(),
                output = from.port,
                to = to.node.index(),
                input = to.port,
                "connected"
            );
        }
        Ok(())
    }

    /// Connect each component's output to the next one's input. All or
    /// nothing: on failure no edge of the chain remains.
    pub fn chain(&mut self, components: &[&dyn Connectable]) -> Result<()> {
        self.collect_garbage();
        self.reserve(1)?;
        let mark = self.edges.len();
        for pair in components.windows(2) {
            if let Err(err) = self.link(pair[0].output_ref(), pair[1].input_ref()) {
                self.edges.truncate(mark);
                return Err(err.into());
            }
        }
        if self.edges.len() > mark {
            self.commit()?;
            debug!(links = self.edges.len() - mark, "chained");
        }
        Ok(())
    }

    pub fn disconnect(&mut self, from: impl Into<OutputRef>, to: impl Into<InputRef>) -> Result<()> {
        self.collect_garbage();
        let edge = Edge {
            from: from.into(),
            to: to.into(),
        };
        self.spec(edge.from.node)?;
        self.spec(edge.to.node)?;
        let Some(position) = self.edges.iter().position(|e| *e == edge) else {
            return Ok(());
        };
        self.reserve(1)?;
        self.edges.remove(position);
        self.commit()
    }

    /// Dispose a node: every edge touching it goes, then the node itself.
    /// Disposing twice does nothing.
    pub fn remove(&mut self, node: &mut Node) -> Result<()> {
        if node.disposed {
            return Ok(());
        }
        if !self.contains(node.id) {
            node.disposed = true;
            return Ok(());
        }
        self.collect_garbage();
        self.reserve(2)?;

        let index = node.id.index();
        let id = node.id;
        let before = self.edges.len();
        self.edges.retain(|e| e.from.node != id && e.to.node != id);

        let slot = &mut self.slots[index];
        slot.ports = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);

        let topology = self.topology()?;
        self.send([
            GraphCommand::Topology(Box::new(topology)),
            GraphCommand::Remove { index },
        ])?;

        for param in node.params.iter_mut().flatten() {
            param.retire();
        }
        node.disposed = true;
        self.check_invariants()?;

        debug!(
            node = index,
            edges = before - self.edges.len(),
            "disposed node"
        );
        Ok(())
    }

    /// Run `build` as one unit. If it fails, every node it added is removed
    /// and the edges are put back the way they were. Calls nest.
    pub fn build<T>(&mut self, build: impl FnOnce(&mut Graph) -> Result<T>) -> Result<T> {
        let mark = self.journal.len();
        let edges = self.edges.clone();
        self.building += 1;
        let result = build(self);
        self.building -= 1;

        match &result {
            Err(err) => {
                let added: Vec<NodeId> = self.journal.drain(mark..).collect();
                self.edges = edges;
                self.discard(&added);
                debug!(nodes = added.len(), %err, "rolled back construction");
            }
            Ok(_) if self.building == 0 => self.journal.clear(),
            Ok(_) => {}
        }
        result
    }

    /// Start a node's source at `time`, or now.
    pub fn start(&mut self, node: NodeId, time: Option<f64>) -> Result<()> {
        self.start_all(&[node], time)
    }

    pub fn stop(&mut self, node: NodeId, time: Option<f64>) -> Result<()> {
        self.stop_all(&[node], time)
    }

    /// Start several nodes at the same instant. The requests reach the
    /// processor together, so they begin on the same sample.
    pub fn start_all(&mut self, nodes: &[NodeId], time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.transport(nodes, |index| GraphCommand::Start { index, time })
    }

    pub fn stop_all(&mut self, nodes: &[NodeId], time: Option<f64>) -> Result<()> {
        let time = self.scheduler.resolve(time)?;
        self.transport(nodes, |index| GraphCommand::Stop { index, time })
    }

    /// Free whatever the processor handed back.
    pub fn collect_garbage(&mut self) -> usize {
        let mut freed = 0;
        while let Ok(garbage) = self.garbage.pop() {
            drop(garbage);
            freed += 1;
        }
        freed
    }

    /// Every edge joins two live nodes.
    pub fn check_invariants(&self) -> std::result::Result<(), GraphError> {
        for edge in &self.edges {
            for node in [edge.from.node, edge.to.node] {
                if !self.contains(node) {
                    return Err(GraphError::DanglingEdge(node.index()));
                }
            }
        }
        Ok(())
    }

    fn transport(&mut self, nodes: &[NodeId], command: impl Fn(usize) -> GraphCommand) -> Result<()> {
        self.collect_garbage();
        for &node in nodes {
            self.spec(node)?;
        }
        self.reserve(nodes.len())?;
        self.send(nodes.iter().map(|node| command(node.index())))
    }

    fn spec(&self, node: NodeId) -> std::result::Result<&PortSpec, GraphError> {
        self.slots
            .get(node.index())
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.ports.as_ref())
            .ok_or(GraphError::DisposedNode(node.index()))
    }

    fn output_def(&self, output: OutputRef) -> std::result::Result<OutputDef, GraphError> {
        self.spec(output.node)?
            .outputs
            .get(output.port)
            .copied()
            .ok_or(GraphError::UnknownOutput {
                node: output.node.index(),
                port: output.port,
            })
    }

    fn input_def(&self, input: InputRef) -> std::result::Result<InputDef, GraphError> {
        self.spec(input.node)?
            .inputs
            .get(input.port)
            .copied()
            .ok_or(GraphError::UnknownInput {
                node: input.node.index(),
                port: input.port,
            })
    }

    /// Validate an edge and record it. `Ok(false)` when it already exists.
    fn link(&mut self, from: OutputRef, to: InputRef) -> std::result::Result<bool, GraphError> {
        let output = self.output_def(from)?;
        let input = self.input_def(to)?;

        if !input.unit.accepts(output.unit) {
            return Err(GraphError::IncompatiblePorts {
                output: output.unit,
                input: input.unit,
            });
        }

        let edge = Edge { from, to };
        if self.edges.contains(&edge) {
            return Ok(false);
        }
        if !input.summing && self.edges.iter().any(|e| e.to == to) {
            return Err(GraphError::FanIn {
                node: to.node.index(),
                port: to.port,
            });
        }
        if from.node == to.node || self.reaches(to.node.index(), from.node.index()) {
            return Err(GraphError::Cycle);
        }

        self.edges.push(edge);
        Ok(true)
    }

    /// Whether `target` is downstream of `start`.
    fn reaches(&self, start: usize, target: usize) -> bool {
        let mut seen = vec![false; self.slots.len()];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.from.node.index() == node)
                    .map(|e| e.to.node.index()),
            );
        }
        false
    }

    /// Render order over all live nodes, sources first.
    fn topology(&self) -> std::result::Result<Topology, GraphError> {
        let live = self.node_count();
        let mut indegree = vec![0usize; self.slots.len()];
        for edge in &self.edges {
            indegree[edge.to.node.index()] += 1;
        }

        let mut ready: VecDeque<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(index, slot)| slot.ports.is_some() && indegree[*index] == 0)
            .map(|(index, _)| index)
            .collect();

        let mut order = Vec::with_capacity(live);
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for edge in self.edges.iter().filter(|e| e.from.node.index() == node) {
                let target = edge.to.node.index();
                indegree[target] -= 1;
                if indegree[target] == 0 {
                    ready.push_back(target);
                }
            }
        }
        if order.len() != live {
            return Err(GraphError::Cycle);
        }

        let mut steps = Vec::with_capacity(order.len());
        let mut routes = Vec::with_capacity(self.edges.len());
        for node in order {
            let begin = routes.len();
            let mut driven = 0u32;
            for edge in self.edges.iter().filter(|e| e.to.node.index() == node) {
                routes.push(Route {
                    source: edge.from.node.index(),
                    output: edge.from.port,
                    input: edge.to.port,
                });
                driven |= 1 << edge.to.port;
            }
            steps.push(Step {
                node,
                routes: begin..routes.len(),
                driven,
            });
        }
        Ok(Topology { steps, routes })
    }

    /// Drop nodes nobody holds a handle to, with every edge touching them.
    fn discard(&mut self, nodes: &[NodeId]) {
        let live: Vec<NodeId> = nodes.iter().copied().filter(|&n| self.contains(n)).collect();
        if live.is_empty() {
            return;
        }
        self.edges
            .retain(|e| !live.contains(&e.from.node) && !live.contains(&e.to.node));
        for node in &live {
            let slot = &mut self.slots[node.index()];
            slot.ports = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index());
        }

        // The processor drops a stale node when its slot is reused, so a
        // full queue here only delays freeing it.
        let sent = self.topology().map_err(Error::from).and_then(|topology| {
            let mut commands = vec![GraphCommand::Topology(Box::new(topology))];
            commands.extend(live.iter().map(|n| GraphCommand::Remove { index: n.index() }));
            self.reserve(commands.len())?;
            self.send(commands)
        });
        if let Err(err) = sent {
            warn!(%err, "could not send rollback to the processor");
        }
    }

    fn commit(&mut self) -> Result<()> {
        let topology = self.topology()?;
        self.send([GraphCommand::Topology(Box::new(topology))])
    }

    fn reserve(&self, commands: usize) -> Result<()> {
        if self.tx.slots() < commands {
            warn!(commands, free = self.tx.slots(), "graph command queue full");
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    fn send<I>(&mut self, commands: I) -> Result<()>
    where
        I: IntoIterator<Item = GraphCommand>,
        I::IntoIter: ExactSizeIterator,
    {
        let commands = commands.into_iter();
        let chunk = self
            .tx
            .write_chunk_uninit(commands.len())
            .map_err(|_| Error::QueueFull)?;
        chunk.fill_from_iter(commands);
        Ok(())
    }
}
