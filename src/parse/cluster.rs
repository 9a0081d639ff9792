//! `ioscli cluster -list && ioscli cluster -status -fmt :` output.
//!
//! Status rows are colon-separated:
//!
//! ```text
//! gdr_ssp3:OK:castor_gdr_vios3:8284-22A0221FD4BV:17:OK:OK
//! ```
//!
//! Fields are cluster name, cluster state, node name, machine serial,
//! partition id, node state, and pool state. The `-list` preamble
//! (`CLUSTER_NAME: gdr_ssp3`) has too few fields and is skipped.

use std::collections::BTreeMap;

use crate::model::PeerStatus;

const NO_CLUSTER: &str = "Cluster does not exist.";

/// What one VIOS reports about its shared storage pool cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterReport {
    /// The VIOS is not running a cluster node.
    NoCluster,

    /// Peer status rows keyed by node name.
    Members(BTreeMap<String, PeerStatus>),
}

impl ClusterReport {
    /// Cluster name from the first peer row.
    pub fn cluster_name(&self) -> Option<&str> {
        match self {
            Self::NoCluster => None,
            Self::Members(peers) => peers.values().next().map(|p| p.cluster.as_str()),
        }
    }
}

/// Parses the combined output. `None` when it is empty.
///
/// A `Cluster does not exist.` line anywhere wins over peer rows.
pub fn parse_cluster_status<S: AsRef<str>>(lines: &[S]) -> Option<ClusterReport> {
    let mut peers = BTreeMap::new();
    let mut seen = false;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        seen = true;
        if line == NO_CLUSTER {
            return Some(ClusterReport::NoCluster);
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 || fields[..6].iter().any(|f| f.trim().is_empty()) {
            continue;
        }
        peers.insert(
            fields[2].to_string(),
            PeerStatus {
                cluster: fields[0].to_string(),
                cluster_state: fields[1].to_string(),
                node_state: fields[5].to_string(),
            },
        );
    }

    seen.then_some(ClusterReport::Members(peers))
}
