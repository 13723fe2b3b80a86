//! The immutable description of one benchmark run.

use pepbench_scenario::{Scenario, Strategy};
use std::time::Duration;

/// Everything one benchmark run needs, fixed before execution.
///
/// Constructed once per (scenario, strategy) pair with the PEP flag
/// already resolved (the adaptive strategy consults the policy before
/// building the request), and consumed by exactly one
/// [`crate::BenchmarkRunner::execute`] call.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub scenario: Scenario,
    pub strategy: Strategy,
    /// Resolved split flag for this run.
    pub pep_enabled: bool,
    /// Object size requested from the server, in bytes.
    pub transfer_bytes: u64,
    /// Endpoint name the server runs on.
    pub server_endpoint: String,
    /// Endpoint name the client runs on.
    pub client_endpoint: String,
    /// Server address as reachable from the client endpoint.
    pub server_addr: String,
    /// Bound on the server readiness wait.
    pub startup_timeout: Duration,
    /// Hard wall-clock bound on the client run.
    pub run_timeout: Duration,
}

impl RunRequest {
    /// Label identifying this run in logs and scratch paths.
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}",
            self.scenario.id, self.scenario.congestion_control, self.strategy
        )
    }
}
