//! Update request types: what `updateios` is asked to do.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `updateios_flags` sub-mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    Install,
    Commit,
    Reject,
    Remove,
    Cleanup,
}

impl UpdateMode {
    /// The `updateios` flag name, without the leading dash.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Commit => "commit",
            Self::Reject => "reject",
            Self::Remove => "remove",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Everything needed to build an `updateios` command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// NIM `lpp_source` resource holding the filesets.
    pub lpp_source: Option<String>,
    pub accept_licenses: bool,
    pub preview: bool,
    pub mode: Option<UpdateMode>,
}

impl UpdateOptions {
    /// Options for the commit pass run ahead of an install.
    pub fn autocommit(&self) -> Self {
        Self {
            lpp_source: None,
            accept_licenses: self.accept_licenses,
            preview: self.preview,
            mode: Some(UpdateMode::Commit),
        }
    }

    /// Whether an install needs pending updates committed first.
    pub fn needs_autocommit(&self) -> bool {
        self.mode == Some(UpdateMode::Install)
    }
}

/// Which `updateios` pass is running; names the per-VIOS output log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    AutoCommit,
    Update,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AutoCommit => "autocommit",
            Self::Update => "update",
        };
        f.write_str(s)
    }
}
