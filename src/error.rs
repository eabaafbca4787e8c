//! Control-plane error types.
//!
//! Every error here is raised synchronously, before a change is handed to
//! the processing thread. The processing thread never fails.

use thiserror::Error;

use crate::automation::Unit;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid curve: {0}")]
    InvalidCurve(#[from] CurveError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("operation on a disposed component")]
    Disposed,

    #[error("command queue is full; the processor is not draining")]
    QueueFull,

    #[error("duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("time must be finite, got {0}")]
    InvalidTime(f64),
}

/// Rejections raised while validating a breakpoint curve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("curve has no breakpoints")]
    Empty,

    #[error("breakpoint {index} has value {value}, exponential segments need positive endpoints")]
    NonPositiveExponential { index: usize, value: f32 },

    #[error("breakpoint {index} is not finite")]
    NonFinite { index: usize },

    #[error("breakpoint {index} has a negative time offset")]
    NegativeOffset { index: usize },

    #[error("breakpoint {index} is earlier than the breakpoint before it")]
    OutOfOrder { index: usize },

    #[error("timeline would hold {len} events, capacity is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("cannot connect a {output:?} output to a {input:?} input")]
    IncompatiblePorts { output: Unit, input: Unit },

    #[error("input {port} of node {node} is not a summing port and is already connected")]
    FanIn { node: usize, port: usize },

    #[error("node {0} has been disposed")]
    DisposedNode(usize),

    #[error("node {node} has no input port {port}")]
    UnknownInput { node: usize, port: usize },

    #[error("node {node} has no output port {port}")]
    UnknownOutput { node: usize, port: usize },

    #[error("connection would create a cycle")]
    Cycle,

    #[error("graph is full ({0} nodes)")]
    Capacity(usize),

    #[error("node declares {0} ports on one side, at most {max} are supported", max = crate::graph::MAX_PORTS)]
    TooManyPorts(usize),

    #[error("edge touches disposed node {0}")]
    DanglingEdge(usize),
}

/// Configuration rejected at construction time. Nothing defaults silently.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be finite and non-negative, got {value}")]
    NegativeTime { field: &'static str, value: f64 },

    #[error("{field} must be finite and positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("sustain must be within 0..=1, got {0}")]
    SustainRange(f32),

    #[error("invalid line envelope: {0}")]
    Line(CurveError),

    #[error("scale input range is empty ({low}..{high})")]
    EmptyScaleRange { low: f32, high: f32 },

    #[error("ratio tables differ in length: {harmonic} harmonic, {inharmonic} inharmonic")]
    RatioTables { harmonic: usize, inharmonic: usize },

    #[error("a layer needs at least one voice")]
    EmptyLayer,

    #[error("sample rate must be positive and finite, got {0}")]
    SampleRate(f32),
}
