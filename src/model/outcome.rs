//! Tri-state result of a remote operation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a remote operation ended.
///
/// `TimedOut` is not a negative result: the operation may still be running
/// on the far side, so somebody has to go and look before anything else
/// touches that VIOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    Failure,
    TimedOut,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::TimedOut => "timed out (manual intervention required)",
        };
        f.write_str(s)
    }
}
