//! The network scenario value type.

use pepbench_common::{BenchError, BenchResult, ScenarioId};
use serde::{Deserialize, Serialize};

/// A fixed description of one two-segment network scenario.
///
/// Segment 1 is the path between the client and the relay, segment 2
/// the path between the relay and the server. All numeric fields must
/// be non-negative; [`Scenario::validate`] enforces this when a
/// scenario is loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub delay1_ms: f64,
    pub delay2_ms: f64,
    pub loss1_pct: f64,
    pub loss2_pct: f64,
    pub bw1_mbps: f64,
    pub bw2_mbps: f64,
    pub congestion_control: String,
}

impl Scenario {
    /// Round-trip-time estimate in milliseconds: `2 * (delay1 + delay2)`.
    pub fn rtt_ms(&self) -> f64 {
        2.0 * (self.delay1_ms + self.delay2_ms)
    }

    /// End-to-end loss estimate in percent: `loss1 + loss2`.
    pub fn loss_pct(&self) -> f64 {
        self.loss1_pct + self.loss2_pct
    }

    /// Bottleneck bandwidth estimate in Mbps: `min(bw1, bw2)`.
    pub fn bottleneck_bw_mbps(&self) -> f64 {
        self.bw1_mbps.min(self.bw2_mbps)
    }

    /// Validate the stored fields.
    ///
    /// Rejects an empty id, an empty congestion-control name, and any
    /// negative numeric field.
    pub fn validate(&self) -> BenchResult<()> {
        if self.id.is_empty() {
            return Err(BenchError::configuration("scenario id must not be empty"));
        }
        if self.congestion_control.is_empty() {
            return Err(BenchError::configuration(format!(
                "scenario '{}': congestion_control must not be empty",
                self.id
            )));
        }

        let numeric = [
            ("delay1_ms", self.delay1_ms),
            ("delay2_ms", self.delay2_ms),
            ("loss1_pct", self.loss1_pct),
            ("loss2_pct", self.loss2_pct),
            ("bw1_mbps", self.bw1_mbps),
            ("bw2_mbps", self.bw2_mbps),
        ];
        for (name, value) in numeric {
            if !value.is_finite() || value < 0.0 {
                return Err(BenchError::configuration(format!(
                    "scenario '{}': {} must be a non-negative number, got {}",
                    self.id, name, value
                )));
            }
        }

        Ok(())
    }
}
