//! Scenario-file loading.
//!
//! Scenarios are listed in a YAML file:
//!
//! ```yaml
//! scenarios:
//!   - id: good_short_rtt
//!     delay1_ms: 5
//!     delay2_ms: 5
//!     loss1_pct: 0
//!     loss2_pct: 0
//!     bw1_mbps: 50
//!     bw2_mbps: 50
//!     congestion_control: cubic
//! ```

use crate::Scenario;
use pepbench_common::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// The set of scenarios for one benchmark batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Load and validate a scenario set from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BenchResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::configuration(format!(
                "failed to read scenario file {}: {}",
                path.display(),
                e
            ))
        })?;
        let set = Self::parse(&content)?;
        info!(
            path = %path.display(),
            scenarios = set.scenarios.len(),
            "Loaded scenario file"
        );
        Ok(set)
    }

    /// Parse and validate a scenario set from YAML text.
    pub fn parse(content: &str) -> BenchResult<Self> {
        let set: ScenarioSet = serde_yaml::from_str(content)
            .map_err(|e| BenchError::configuration(format!("invalid scenario file: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> BenchResult<()> {
        if self.scenarios.is_empty() {
            return Err(BenchError::configuration(
                "scenario file contains no scenarios",
            ));
        }
        for scenario in &self.scenarios {
            scenario.validate()?;
        }

        // Duplicate ids would make outcome records indistinguishable.
        let mut ids: Vec<&str> = self.scenarios.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        for pair in ids.windows(2) {
            if pair[0] == pair[1] {
                return Err(BenchError::configuration(format!(
                    "duplicate scenario id '{}'",
                    pair[0]
                )));
            }
        }

        Ok(())
    }
}
