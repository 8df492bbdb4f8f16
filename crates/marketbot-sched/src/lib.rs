//! Re-entrancy-guarded periodic task primitive.
//!
//! Each periodic concern of the bot (purchase loop, inventory counting,
//! average-price refresh, balance refresh, keep-alive) runs as one
//! `PeriodicTask` with its own cadence. Ticks never overlap: a tick that
//! fires while the previous tick's work is still in flight is skipped.

pub mod task;

pub use task::{IntervalHandle, PeriodicTask};
