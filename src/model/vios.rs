//! VIOS records and pairs: the unit of work of a rolling update.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Everything the workflow learns about one VIOS during a run.
///
/// Identity is the NIM name. Fields fill in progressively: management
/// identifiers from the inventory, UUIDs from health-check discovery,
/// cluster state from the SSP coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViosRecord {
    pub name: String,

    /// Serial of the managing CEC, as `type-model*serial`.
    pub cec_serial: Option<String>,

    /// LPAR id of the VIOS on its CEC.
    pub partition_id: Option<String>,

    pub cec_uuid: Option<String>,
    pub vios_uuid: Option<String>,

    pub ssp_cluster: Option<String>,
    pub cluster_status: ClusterStatus,

    /// Status found by the first query of the run; what a restore aims for.
    pub initial_cluster_status: Option<ClusterStatus>,

    /// Peer status table as last seen from this VIOS.
    pub ssp_peers: BTreeMap<String, PeerStatus>,
}

impl ViosRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether both UUIDs needed by the health assessment are known.
    pub fn has_uuids(&self) -> bool {
        self.cec_uuid.is_some() && self.vios_uuid.is_some()
    }
}

/// Shared storage pool cluster membership of a VIOS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One row of `cluster -status`: a node as seen from some VIOS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub cluster: String,
    pub cluster_state: String,
    pub node_state: String,
}

/// Two VIOS serving the same clients, updated one at a time.
#[derive(Debug, Clone)]
pub struct ViosPair {
    pub members: [ViosRecord; 2],

    /// Cleared when the pair is abandoned.
    pub valid: bool,
}

impl ViosPair {
    pub fn new(first: ViosRecord, second: ViosRecord) -> Self {
        Self {
            members: [first, second],
            valid: true,
        }
    }

    pub fn names(&self) -> [&str; 2] {
        [&self.members[0].name, &self.members[1].name]
    }

    /// Index of the member that is not `index`.
    pub fn other(index: usize) -> usize {
        1 - index
    }
}

impl fmt::Display for ViosPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.names();
        write!(f, "{a}-{b}")
    }
}

/// Management identifiers of a VIOS, as known to NIM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Management {
    pub cec_serial: String,
    pub partition_id: String,
}
