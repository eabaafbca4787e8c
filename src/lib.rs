pub mod automation; // Parameters, timelines and the automation scheduler
pub mod clock;
pub mod dsp;
pub mod envelope;
pub mod error;
pub mod graph; // Routing fabric: nodes, ports, edges
pub mod synth; // FM voices and voice layering
pub mod voices;

pub use error::{Error, Result};

/// Largest block the graph processor renders in one pass. Larger output
/// buffers are split into chunks of this size.
pub const MAX_BLOCK_SIZE: usize = 2048;
