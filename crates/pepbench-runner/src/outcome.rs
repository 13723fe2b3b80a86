//! Typed outcomes and the downstream record shape.

use crate::request::RunRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run failed without a usable measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The server never signalled readiness within the startup bound.
    ServerStartTimeout,
    /// The client reported its own idle timeout. Distinct from the
    /// orchestration deadline: it means the connection went silent,
    /// not that the transfer was too slow for the bound.
    IdleTimeout,
    /// The client finished but no measurement could be extracted.
    NoResult,
    /// More than one measurement was extracted. This signals a
    /// parsing-pattern or protocol bug and is surfaced, never masked
    /// by picking one value.
    AmbiguousResult,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ServerStartTimeout => write!(f, "server_start_timeout"),
            FailureReason::IdleTimeout => write!(f, "idle_timeout"),
            FailureReason::NoResult => write!(f, "no_result"),
            FailureReason::AmbiguousResult => write!(f, "ambiguous_result"),
        }
    }
}

/// The result of one benchmark run. Produced exactly once per
/// [`RunRequest`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The transfer completed and produced one measurement.
    Success {
        status_code: u16,
        elapsed_seconds: f64,
    },
    /// The orchestration deadline expired and the client was
    /// terminated.
    Timeout { bound_seconds: f64 },
    /// The run completed without a usable measurement.
    Failure { reason: FailureReason },
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Timeout { .. } => "timeout",
            Outcome::Failure { .. } => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Flat per-run record for the outcome sink.
///
/// Downstream aggregation (JSON persistence, tables) consumes this
/// shape verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub scenario_id: String,
    pub strategy: String,
    pub pep_enabled: bool,
    pub congestion_control: String,
    pub outcome_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(request: &RunRequest, outcome: &Outcome) -> Self {
        let (status_code, elapsed_seconds, failure_reason) = match outcome {
            Outcome::Success {
                status_code,
                elapsed_seconds,
            } => (Some(*status_code), Some(*elapsed_seconds), None),
            Outcome::Timeout { .. } => (None, None, None),
            Outcome::Failure { reason } => (None, None, Some(reason.to_string())),
        };

        Self {
            scenario_id: request.scenario.id.to_string(),
            strategy: request.strategy.to_string(),
            pep_enabled: request.pep_enabled,
            congestion_control: request.scenario.congestion_control.clone(),
            outcome_kind: outcome.kind().to_string(),
            status_code,
            elapsed_seconds,
            failure_reason,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pepbench_common::ScenarioId;
    use pepbench_scenario::{Scenario, Strategy};
    use std::time::Duration;

    fn request() -> RunRequest {
        RunRequest {
            scenario: Scenario {
                id: ScenarioId::from("s1"),
                delay1_ms: 10.0,
                delay2_ms: 10.0,
                loss1_pct: 0.0,
                loss2_pct: 0.0,
                bw1_mbps: 10.0,
                bw2_mbps: 10.0,
                congestion_control: "cubic".to_string(),
            },
            strategy: Strategy::NoSplit,
            pep_enabled: false,
            transfer_bytes: 1000,
            server_endpoint: "server".to_string(),
            client_endpoint: "client".to_string(),
            server_addr: "10.0.0.2:4433".to_string(),
            startup_timeout: Duration::from_secs(10),
            run_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_success_record() {
        let outcome = Outcome::Success {
            status_code: 200,
            elapsed_seconds: 1.234,
        };
        let record = OutcomeRecord::new(&request(), &outcome);
        assert_eq!(record.scenario_id, "s1");
        assert_eq!(record.strategy, "no_split");
        assert_eq!(record.outcome_kind, "success");
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.elapsed_seconds, Some(1.234));
        assert_eq!(record.failure_reason, None);
    }

    #[test]
    fn test_failure_record() {
        let outcome = Outcome::Failure {
            reason: FailureReason::AmbiguousResult,
        };
        let record = OutcomeRecord::new(&request(), &outcome);
        assert_eq!(record.outcome_kind, "failure");
        assert_eq!(record.failure_reason.as_deref(), Some("ambiguous_result"));
        assert_eq!(record.status_code, None);
    }

    #[test]
    fn test_record_serializes_without_empty_fields() {
        let outcome = Outcome::Timeout {
            bound_seconds: 60.0,
        };
        let record = OutcomeRecord::new(&request(), &outcome);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome_kind"], "timeout");
        assert!(json.get("status_code").is_none());
        assert!(json.get("failure_reason").is_none());
    }
}
