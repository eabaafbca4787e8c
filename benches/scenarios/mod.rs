//! Benchmarks for complete instruments.

mod voices;

pub use voices::bench_voices;
