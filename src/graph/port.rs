//! Port declarations and typed endpoint references.

use crate::automation::Unit;

use super::node::{Connectable, NodeId};

/// Most ports a node may declare on either side.
pub const MAX_PORTS: usize = 8;

/// Declaration of one input port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputDef {
    pub name: &'static str,
    pub unit: Unit,
    /// Whether several outputs may drive this input at once. Their signals
    /// are added.
    pub summing: bool,
    /// Value of the port's own parameter, used while nothing drives it.
    pub default: f32,
}

/// Declaration of one output port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputDef {
    pub name: &'static str,
    pub unit: Unit,
}

/// Full port layout of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortSpec {
    pub inputs: Vec<InputDef>,
    pub outputs: Vec<OutputDef>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, name: &'static str, unit: Unit, summing: bool, default: f32) -> Self {
        self.inputs.push(InputDef {
            name,
            unit,
            summing,
            default,
        });
        self
    }

    pub fn output(mut self, name: &'static str, unit: Unit) -> Self {
        self.outputs.push(OutputDef { name, unit });
        self
    }
}

/// An output port of a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub port: usize,
}

/// An input port of a specific node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub node: NodeId,
    pub port: usize,
}

impl From<NodeId> for OutputRef {
    fn from(node: NodeId) -> Self {
        node.output(0)
    }
}

impl From<NodeId> for InputRef {
    fn from(node: NodeId) -> Self {
        node.input(0)
    }
}

impl<T: Connectable + ?Sized> From<&T> for OutputRef {
    fn from(component: &T) -> Self {
        component.output_ref()
    }
}

impl<T: Connectable + ?Sized> From<&T> for InputRef {
    fn from(component: &T) -> Self {
        component.input_ref()
    }
}

/// Port indices of the built-in node kinds.
pub mod ports {
    pub mod signal {
        pub const IN: usize = 0;
        pub const OUT: usize = 0;
    }

    pub mod multiply {
        pub const IN: usize = 0;
        pub const FACTOR: usize = 1;
        pub const OUT: usize = 0;
    }

    pub mod scale {
        pub const IN: usize = 0;
        pub const OUT: usize = 0;
    }

    pub mod gain {
        pub const IN: usize = 0;
        pub const GAIN: usize = 1;
        pub const OUT: usize = 0;
    }

    pub mod oscillator {
        pub const FREQUENCY: usize = 0;
        pub const OUT: usize = 0;
    }

    pub mod filter {
        pub const IN: usize = 0;
        pub const CUTOFF: usize = 1;
        pub const RESONANCE: usize = 2;
        pub const OUT: usize = 0;
    }
}
