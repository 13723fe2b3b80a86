//! The experiment strategy: how the PEP flag is chosen for a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The experiment variant run for each scenario.
///
/// `NoSplit` and `AlwaysSplit` map to a fixed PEP flag; `AdaptiveSplit`
/// defers to the split policy's per-scenario decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NoSplit,
    AlwaysSplit,
    AdaptiveSplit,
}

impl Strategy {
    /// All strategies, in the order they are run per scenario.
    pub const ALL: [Strategy; 3] = [
        Strategy::NoSplit,
        Strategy::AlwaysSplit,
        Strategy::AdaptiveSplit,
    ];

    /// The fixed PEP flag for this strategy, if it has one.
    ///
    /// Returns `None` for `AdaptiveSplit`, whose flag is resolved by
    /// the policy once per scenario.
    pub fn fixed_pep(&self) -> Option<bool> {
        match self {
            Strategy::NoSplit => Some(false),
            Strategy::AlwaysSplit => Some(true),
            Strategy::AdaptiveSplit => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::NoSplit => write!(f, "no_split"),
            Strategy::AlwaysSplit => write!(f, "always_split"),
            Strategy::AdaptiveSplit => write!(f, "adaptive_split"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_pep() {
        assert_eq!(Strategy::NoSplit.fixed_pep(), Some(false));
        assert_eq!(Strategy::AlwaysSplit.fixed_pep(), Some(true));
        assert_eq!(Strategy::AdaptiveSplit.fixed_pep(), None);
    }

    #[test]
    fn test_display_matches_serde() {
        for strategy in Strategy::ALL {
            let yaml = serde_yaml::to_string(&strategy).unwrap();
            assert_eq!(yaml.trim(), strategy.to_string());
        }
    }
}
