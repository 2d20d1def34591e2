//! Step outcomes and scenario severity

use std::fmt;

use serde::Serialize;

use crate::common::Result;

/// Scenario-wide failure level
///
/// Ordered so that escalation is `max`: a scenario can move from `None` to
/// `SoftFail` to `HardFail`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioSeverity {
    #[default]
    None,
    SoftFail,
    HardFail,
}

impl ScenarioSeverity {
    /// The higher of the two levels
    pub fn escalate(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for ScenarioSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "passed"),
            Self::SoftFail => write!(f, "soft-failed"),
            Self::HardFail => write!(f, "failed"),
        }
    }
}

/// What happened when the walker visited a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    SoftFailed(String),
    HardFailed(String),
    Skipped,
}

impl StepOutcome {
    /// Classify the result of running a node
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) if e.is_soft_failure() => Self::SoftFailed(e.to_string()),
            Err(e) => Self::HardFailed(e.to_string()),
        }
    }

    /// Severity this outcome contributes to its scenario
    pub fn severity(&self) -> ScenarioSeverity {
        match self {
            Self::Passed | Self::Skipped => ScenarioSeverity::None,
            Self::SoftFailed(_) => ScenarioSeverity::SoftFail,
            Self::HardFailed(_) => ScenarioSeverity::HardFail,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::SoftFailed(m) | Self::HardFailed(m) => Some(m),
            Self::Passed | Self::Skipped => None,
        }
    }
}
