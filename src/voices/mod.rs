//! Pre-built instruments made of FM voices, envelopes and filters.
//!
//! Each instrument adds its nodes to a [`Graph`](crate::graph::Graph) and
//! exposes note-style triggers. Use these as starting points for your own
//! sounds, or study them to learn how different timbres are built.
//!
//! # Example
//!
//! ```no_run
//! use saavy_fm::envelope::Triggerable;
//! use saavy_fm::graph::Graph;
//! use saavy_fm::voices::{Bell, BellConfig, Cymbal, CymbalConfig};
//!
//! let (mut graph, mut processor) = Graph::new(48_000.0)?;
//! let destination = graph.destination();
//!
//! let mut bell = Bell::new(&mut graph, &BellConfig::classic())?;
//! graph.connect(&bell, destination)?;
//! bell.trigger_attack_release(0.5, None, None)?;
//!
//! let mut cymbal = Cymbal::new(&mut graph, &CymbalConfig::classic())?;
//! graph.connect(&cymbal, destination)?;
//! cymbal.trigger_attack(None)?;
//!
//! let mut block = [0.0f32; 512];
//! processor.process(&mut block);
//! # Ok::<(), saavy_fm::Error>(())
//! ```

mod bell;
mod cymbal;
mod glass;

pub use bell::{Bell, BellConfig};
pub use cymbal::{
    Cymbal, CymbalComponent, CymbalComponentConfig, CymbalConfig, HARMONIC_RATIOS,
    INHARMONIC_RATIOS,
};
pub use glass::{Glass, GlassConfig, GlassVoice};
