//! # pepbench-common
//!
//! Shared types and error taxonomy for the PEP split benchmark engine.
//!
//! This crate provides the foundation the other pepbench crates build
//! on: the infrastructure error type and the scenario identifier
//! newtype. Measurement-level failures (no result, ambiguous result,
//! idle timeout) are deliberately not errors. They are reported as
//! typed outcomes by `pepbench-runner`, since every benchmark run
//! must produce exactly one outcome record.

pub mod errors;
pub mod types;

pub use errors::{BenchError, BenchResult};
pub use types::ScenarioId;
