//! Startup synchronization on a readiness log line.
//!
//! A server launched in the background signals readiness by printing a
//! known marker (for example `listening`). The log-consuming task and
//! the waiting task run concurrently, so the signal must be stored,
//! not just broadcast: a marker observed before the waiter suspends
//! must still be seen. A `tokio::sync::watch` channel keeps the flag
//! and the wakeup in one primitive, so a notification cannot be lost
//! between the check and the wait.

use crate::host::LineCallback;
use pepbench_common::{BenchError, BenchResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// One-shot readiness flag shared between a line callback and a waiter.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Record that the readiness condition has been observed.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn mark_ready(&self) {
        self.tx.send_replace(true);
    }

    /// Whether readiness has already been observed.
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Build a line callback that marks the gate ready on the first
    /// line satisfying `predicate`.
    ///
    /// The predicate must be a pure function of a single line; it is
    /// never handed partial lines.
    pub fn line_callback(
        &self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> LineCallback {
        let gate = self.clone();
        Arc::new(move |line: &str| {
            if !gate.is_ready() && predicate(line) {
                debug!(line, "Readiness line observed");
                gate.mark_ready();
            }
        })
    }

    /// Block until the gate is ready or `timeout` elapses.
    ///
    /// Returns [`BenchError::StartupTimeout`] on expiry; the caller
    /// must treat the server as not-ready and tear it down.
    pub async fn wait_ready(&self, timeout: Duration) -> BenchResult<()> {
        let mut rx = self.tx.subscribe();
        let result = match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(BenchError::channel_closed("readiness gate")),
            Err(_) => Err(BenchError::startup_timeout(timeout.as_secs_f64())),
        };
        result
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_ready_before_wait_is_not_lost() {
        let gate = ReadinessGate::new();
        gate.mark_ready();
        // The waiter starts after the signal and must still observe it.
        gate.wait_ready(Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn test_ready_during_wait() {
        let gate = ReadinessGate::new();
        let signaller = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signaller.mark_ready();
        });
        gate.wait_ready(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_never_ready() {
        let gate = ReadinessGate::new();
        let start = Instant::now();
        let err = gate.wait_ready(Duration::from_secs(3)).await.unwrap_err();
        assert!(matches!(err, BenchError::StartupTimeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_line_callback_predicate() {
        let gate = ReadinessGate::new();
        let callback = gate.line_callback(|line| line.to_lowercase().contains("listening"));

        callback("starting up...");
        assert!(!gate.is_ready());

        callback("Listening on 10.0.0.2:4433");
        assert!(gate.is_ready());

        gate.wait_ready(Duration::from_millis(10)).await.unwrap();
    }
}
