//! # pepbench-process
//!
//! Process execution primitives for the benchmark engine:
//!
//! - [`ProcessHost`]: run a command on an emulated endpoint, foreground
//!   with a hard deadline or background with later termination;
//! - [`watch_lines`]: ordered per-line delivery from a process stream;
//! - [`ReadinessGate`]: race-free startup synchronization on a log
//!   line;
//! - [`terminate`]: SIGTERM/SIGKILL primitives.
//!
//! The benchmark runner composes these; nothing in this crate knows
//! about scenarios, transports, or measurements.

pub mod host;
pub mod readiness;
pub mod terminate;
pub mod watcher;

pub use host::{
    BackgroundProcess, LineCallback, LocalProcessHost, ProcessHost, RunOptions, RunStatus,
};
pub use readiness::ReadinessGate;
pub use watcher::{watch_lines, WatchEnd};
