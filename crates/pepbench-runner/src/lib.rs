//! # pepbench-runner
//!
//! The benchmark execution and result-extraction engine.
//!
//! One [`BenchmarkRunner`] drives one [`RunRequest`] to completion:
//! start the transport's server on its endpoint, synchronize on its
//! readiness line, run the client under a hard deadline, and classify
//! the client's output into exactly one [`Outcome`]. Transports plug
//! in through the [`Transport`] capability trait; processes run
//! through the `pepbench-process` host seam.

pub mod extract;
pub mod outcome;
pub mod request;
pub mod runner;
pub mod transport;

pub use extract::{ExtractorMarkers, ResultExtractor};
pub use outcome::{FailureReason, Outcome, OutcomeRecord};
pub use request::RunRequest;
pub use runner::{BenchmarkRunner, RunnerState};
pub use transport::{QuicheTransport, Transport};
