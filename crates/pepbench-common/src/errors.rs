//! Error types for the benchmark engine.
//!
//! These cover infrastructure faults only: failing to spawn or stop a
//! process, a server that never became ready, bad configuration, I/O.
//! A run that completed but produced no usable measurement is not an
//! error; it is classified into an `Outcome` by the runner.

use thiserror::Error;

/// Result type alias for benchmark operations.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Infrastructure error type for benchmark operations.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A process could not be spawned on an endpoint.
    #[error("Spawn failed on {endpoint}: {reason}")]
    SpawnFailed { endpoint: String, reason: String },

    /// A server process did not signal readiness within the bound.
    #[error("Server startup timed out after {bound_seconds}s")]
    StartupTimeout { bound_seconds: f64 },

    /// A process could not be terminated.
    #[error("Stop failed for pid {pid}: {reason}")]
    StopFailed { pid: u32, reason: String },

    /// Invalid configuration or scenario data.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A coordination channel closed before the expected signal.
    #[error("Internal channel closed: {context}")]
    ChannelClosed { context: String },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn spawn_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn startup_timeout(bound_seconds: f64) -> Self {
        Self::StartupTimeout { bound_seconds }
    }

    pub fn stop_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn channel_closed(context: impl Into<String>) -> Self {
        Self::ChannelClosed {
            context: context.into(),
        }
    }
}
