//! Parameter automation: curves, timelines and the scheduler that installs
//! them.

pub mod curve;
pub mod param;
pub mod scheduler;
pub mod timeline;

pub use curve::{Breakpoint, Curve, Ramp, MIN_EXPONENTIAL_VALUE};
pub use param::{Param, ParamId, ParamProcessor, Unit};
pub use scheduler::Scheduler;
pub use timeline::{Event, Timeline};
