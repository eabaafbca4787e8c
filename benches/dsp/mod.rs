//! Benchmarks for low-level DSP primitives.

mod automation;
mod filter;
mod graph;
mod oscillator;

pub use automation::bench_automation;
pub use filter::bench_filter;
pub use graph::bench_graph;
pub use oscillator::bench_oscillator;
