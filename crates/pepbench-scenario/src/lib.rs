//! # pepbench-scenario
//!
//! Network scenario descriptions for the PEP split benchmark.
//!
//! A [`Scenario`] is an immutable description of a two-segment path:
//! per-segment delay, loss, and bandwidth, plus the congestion-control
//! algorithm under test. Derived path estimates (RTT, end-to-end loss,
//! bottleneck bandwidth) are computed on demand and never cached, so
//! they cannot go stale relative to the stored fields.

pub mod scenario;
pub mod source;
pub mod strategy;

pub use scenario::Scenario;
pub use source::ScenarioSet;
pub use strategy::Strategy;
