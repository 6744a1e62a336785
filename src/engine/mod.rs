//! Discovery and scheduling: the per-session engine, its debouncer, and the
//! control loop that drives it.

pub mod control;
pub mod cycle;
pub mod debounce;

pub use control::{Command, ControlHandle, ControlLoop};
pub use cycle::{CycleReport, Engine, Trigger};
pub use debounce::Debouncer;
