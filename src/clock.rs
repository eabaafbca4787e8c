//! Time sources for the scheduler.
//!
//! Parameters never read wall-clock time. The scheduler asks an injected
//! [`Clock`] for "now", which lets tests drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;

/// A monotonic source of transport time, in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Absolute time of a frame index.
///
/// The processor and the control-plane mirror both go through this, so a
/// timeline query at `frame_time(n)` sees exactly what frame `n` rendered.
#[inline]
pub fn frame_time(frame: u64, sample_rate: f32) -> f64 {
    frame as f64 / sample_rate as f64
}

/// Clock advanced by the graph processor as it renders.
#[derive(Debug, Clone)]
pub struct TransportClock {
    frames: Arc<AtomicU64>,
    sample_rate: f32,
}

impl TransportClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Release);
    }
}

impl Clock for TransportClock {
    fn now(&self) -> f64 {
        frame_time(self.frame(), self.sample_rate)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    seconds: AtomicF64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: AtomicF64::new(start),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds, Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.seconds.fetch_add(seconds, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_clock_counts_frames() {
        let clock = TransportClock::new(48_000.0);
        let shared = clock.clone();
        clock.advance(24_000);
        assert_eq!(shared.frame(), 24_000);
        assert_eq!(shared.now(), 0.5);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.25);
        clock.set(0.0);
        assert_eq!(clock.now(), 0.0);
    }
}
