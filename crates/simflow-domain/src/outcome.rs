//! Simulation outcomes and exit-code classification.

use serde::{Deserialize, Serialize};

/// Semantic result of one completed simulator run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// Exit code 0.
    Passed,

    /// Exit code 1: a testbench assertion fired.
    AssertionFailure,

    /// Exit code 12: the design hierarchy could not be elaborated.
    ElaborationError,

    /// Exit code 3: the simulator hit an internal error.
    UnexpectedError,

    /// Any other exit code, including signal-derived negative codes.
    UnknownStatus { code: i32 },

    /// The run exceeded its wall-clock budget and was killed.
    TimedOut { limit_secs: u64 },
}

impl SimulationOutcome {
    /// Map a simulator exit code to its outcome.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => SimulationOutcome::Passed,
            1 => SimulationOutcome::AssertionFailure,
            3 => SimulationOutcome::UnexpectedError,
            12 => SimulationOutcome::ElaborationError,
            other => SimulationOutcome::UnknownStatus { code: other },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, SimulationOutcome::Passed)
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            SimulationOutcome::Passed => "passed",
            SimulationOutcome::AssertionFailure => "assertion_failure",
            SimulationOutcome::ElaborationError => "elaboration_error",
            SimulationOutcome::UnexpectedError => "unexpected_error",
            SimulationOutcome::UnknownStatus { .. } => "unknown_status",
            SimulationOutcome::TimedOut { .. } => "timed_out",
        }
    }
}

impl std::fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationOutcome::Passed => write!(f, "test passed"),
            SimulationOutcome::AssertionFailure => write!(f, "assertion failed"),
            SimulationOutcome::ElaborationError => write!(f, "testbench elaboration failed"),
            SimulationOutcome::UnexpectedError => write!(f, "unexpected simulator error"),
            SimulationOutcome::UnknownStatus { code } => {
                write!(f, "unknown simulator return code {}", code)
            }
            SimulationOutcome::TimedOut { limit_secs } => {
                write!(f, "timed out after {}s", limit_secs)
            }
        }
    }
}

/// Classify a simulator exit code. Equivalent to
/// [`SimulationOutcome::from_exit_code`].
pub fn classify(exit_code: i32) -> SimulationOutcome {
    SimulationOutcome::from_exit_code(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_codes() {
        assert_eq!(classify(0), SimulationOutcome::Passed);
        assert_eq!(classify(1), SimulationOutcome::AssertionFailure);
        assert_eq!(classify(3), SimulationOutcome::UnexpectedError);
        assert_eq!(classify(12), SimulationOutcome::ElaborationError);
    }

    #[test]
    fn test_other_codes_carry_exact_value() {
        for code in [2, 4, 11, 13, 127, 255, -1, -9, -15, i32::MIN, i32::MAX] {
            assert_eq!(classify(code), SimulationOutcome::UnknownStatus { code });
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        for code in -20..40 {
            assert_eq!(classify(code), classify(code));
        }
    }

    #[test]
    fn test_only_zero_passes() {
        assert!(classify(0).is_passed());
        assert!(!classify(1).is_passed());
        assert!(!SimulationOutcome::TimedOut { limit_secs: 5 }.is_passed());
    }

    #[test]
    fn test_display_mentions_code() {
        assert!(classify(42).to_string().contains("42"));
        assert_eq!(classify(12).label(), "elaboration_error");
    }

    #[test]
    fn test_serde_tagged_shape() {
        let v = serde_json::to_value(classify(7)).unwrap();
        assert_eq!(v, serde_json::json!({"status": "unknown_status", "code": 7}));

        let v = serde_json::to_value(classify(0)).unwrap();
        assert_eq!(v, serde_json::json!({"status": "passed"}));
    }
}
