//! Routing fabric for audio and control signals.
//!
//! The control thread owns a [`Graph`]: it adds nodes, connects typed ports
//! and disposes nodes, validating every change before it happens. The
//! processing thread owns the matching [`GraphProcessor`], which renders
//! immutable topology snapshots and never allocates or locks.

/// Control-side arena, edges and topology.
pub mod fabric;
/// Built-in node kinds and their kernels.
pub mod kernel;
/// Kernel trait, node handles and the composition traits.
pub mod node;
/// Port layouts and endpoint references.
pub mod port;
/// Realtime renderer.
pub mod processor;

pub use fabric::{Graph, Node, GRAPH_QUEUE_SIZE, MAX_NODES};
pub use kernel::{NodeKind, ScaleRange};
pub use node::{Connectable, Disposable, Inputs, NodeId, Outputs, Processor, RenderCtx};
pub use port::{ports, InputDef, InputRef, OutputDef, OutputRef, PortSpec, MAX_PORTS};
pub use processor::GraphProcessor;
