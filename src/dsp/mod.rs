//! Sample-level kernels used by the built-in graph nodes.

pub mod filter;
pub mod modulate;
pub mod oscillator;
