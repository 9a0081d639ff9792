//! Disk candidates for the alternate rootvg copy.

use serde::{Deserialize, Serialize};

/// A free physical volume reported by `lspv -free`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCandidate {
    pub name: String,
    pub pvid: String,

    /// Capacity in megabytes.
    pub size_mb: u64,
}

impl DiskCandidate {
    /// Whether this disk is strictly larger than a rootvg of `required_mb`.
    pub fn fits(&self, required_mb: u64) -> bool {
        self.size_mb > required_mb
    }
}
