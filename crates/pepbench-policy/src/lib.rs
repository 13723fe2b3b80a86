//! # pepbench-policy
//!
//! The adaptive split decision: a pure function from scenario
//! parameters to a split/no-split choice.
//!
//! The policy never talks to processes and holds no mutable state, so
//! identical inputs always produce identical decisions. This is what
//! makes the adaptive strategy's results reproducible across batches.

use pepbench_scenario::Scenario;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunable thresholds and weights for the split policy.
///
/// Defaults match the reference experiment configuration. Parameters
/// are fixed at construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyParameters {
    /// RTT at or above which the path counts as high-latency (ms).
    pub rtt_high_ms: f64,
    /// Loss at or above which the path counts as visibly lossy (%).
    pub loss_nontrivial_pct: f64,
    /// Linear-score threshold for the fallback rule.
    pub score_threshold: f64,
    /// Weight applied to RTT in the linear score.
    pub rtt_weight: f64,
    /// Weight applied to loss in the linear score.
    pub loss_weight: f64,
}

impl Default for PolicyParameters {
    fn default() -> Self {
        Self {
            rtt_high_ms: 50.0,
            loss_nontrivial_pct: 1.0,
            score_threshold: 80.0,
            rtt_weight: 1.0,
            loss_weight: 5.0,
        }
    }
}

/// Rule-based adaptive split policy.
///
/// Decision order:
/// 1. high RTT *and* nontrivial loss: split;
/// 2. RTT below half the high threshold *and* loss below half the
///    nontrivial threshold: no split;
/// 3. otherwise: split iff the linear score
///    `rtt_weight * rtt + loss_weight * loss` reaches the threshold.
#[derive(Debug, Clone)]
pub struct AdaptiveSplitPolicy {
    params: PolicyParameters,
}

impl AdaptiveSplitPolicy {
    pub fn new(params: PolicyParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PolicyParameters {
        &self.params
    }

    /// Linear score for the fallback rule.
    pub fn score(&self, scenario: &Scenario) -> f64 {
        self.params.rtt_weight * scenario.rtt_ms() + self.params.loss_weight * scenario.loss_pct()
    }

    /// Decide whether connection splitting should be enabled for the
    /// given scenario.
    pub fn decide(&self, scenario: &Scenario) -> bool {
        let rtt = scenario.rtt_ms();
        let loss = scenario.loss_pct();

        if rtt >= self.params.rtt_high_ms && loss >= self.params.loss_nontrivial_pct {
            debug!(scenario = %scenario.id, rtt, loss, "Split forced: high RTT with nontrivial loss");
            return true;
        }

        if rtt < self.params.rtt_high_ms / 2.0 && loss < self.params.loss_nontrivial_pct / 2.0 {
            debug!(scenario = %scenario.id, rtt, loss, "Split suppressed: clean short path");
            return false;
        }

        let score = self.score(scenario);
        let split = score >= self.params.score_threshold;
        debug!(
            scenario = %scenario.id,
            score,
            threshold = self.params.score_threshold,
            split,
            "Split decided by score"
        );
        split
    }
}

impl Default for AdaptiveSplitPolicy {
    fn default() -> Self {
        Self::new(PolicyParameters::default())
    }
}
