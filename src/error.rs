//! Workflow errors.
//!
//! Only [`Error::HealthToolMissing`] and the plumbing variants end a run.
//! The others are scoped to one VIOS or one pair: they are journaled and
//! carried in the run report while other pairs proceed.

use std::path::PathBuf;

use crate::exec::ExecError;
use crate::model::UpdatePhase;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{vios}: {reason}")]
    InventoryMismatch { vios: String, reason: String },

    #[error("health check tool {} is missing or not executable", .0.display())]
    HealthToolMissing(PathBuf),

    #[error("{pair}: health assessment failed{}", .rate.map(|r| format!(" (pass rate {r}%)")).unwrap_or_default())]
    HealthCheckIneligible { pair: String, rate: Option<u32> },

    #[error("{vios}: inconsistent rootvg mirror layout: {reason}")]
    MirrorLayoutInconsistent { vios: String, reason: String },

    #[error("{vios}: no free disk larger than {required_mb} MB")]
    NoEligibleDisk { vios: String, required_mb: u64 },

    #[error("{vios}: alternate disk copy failed: {reason}")]
    SnapshotFailure { vios: String, reason: String },

    #[error("{vios}: alternate disk copy shows no progress, manual intervention is required")]
    SnapshotTimeout { vios: String },

    #[error("{vios}: SSP cluster {action} failed")]
    SspTransitionFailure { vios: String, action: &'static str },

    #[error("{vios}: updateios {phase} failed, see {}", .log.display())]
    UpdateExecutionFailure {
        vios: String,
        phase: UpdatePhase,
        log: PathBuf,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Whether this error ends the whole run rather than one pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HealthToolMissing(_) | Self::Storage(_) | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = Error::HealthCheckIneligible {
            pair: "vios1-vios2".into(),
            rate: Some(87),
        };
        assert_eq!(e.to_string(), "vios1-vios2: health assessment failed (pass rate 87%)");

        let e = Error::SnapshotTimeout { vios: "vios1".into() };
        assert!(e.to_string().contains("manual intervention"));

        let e = Error::UpdateExecutionFailure {
            vios: "vios1".into(),
            phase: UpdatePhase::Update,
            log: PathBuf::from("/data/vios/updateios_update_vios1.log"),
        };
        assert_eq!(
            e.to_string(),
            "vios1: updateios update failed, see /data/vios/updateios_update_vios1.log"
        );
    }

    #[test]
    fn only_run_level_errors_are_fatal() {
        assert!(Error::HealthToolMissing(PathBuf::from("/x")).is_fatal());
        assert!(!Error::NoEligibleDisk { vios: "v".into(), required_mb: 1 }.is_fatal());
    }
}
