//! Per-user pomodoro timer core: session state, registry, and interval worker.

pub mod registry;
pub mod session;
pub mod worker;

pub use registry::SessionRegistry;
pub use session::{Durations, Phase, Session};
pub use worker::IntervalWorker;

/// Smallest accepted interval length, in minutes.
pub const MIN_INTERVAL_MINUTES: u64 = 1;

/// Largest accepted interval length, in minutes.
pub const MAX_INTERVAL_MINUTES: u64 = 90;
