//! Shared storage pool cluster membership of a pair.
//!
//! A VIOS that is an SSP node is stopped before its update and started
//! again afterwards. A node cannot rejoin the cluster from itself, so a
//! start is issued from the other member of the pair.

use tracing::debug;

use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::{ClusterStatus, Outcome, ViosPair, ViosRecord};
use crate::parse::cluster::{ClusterReport, parse_cluster_status};

const STATUS: &str = "/usr/ios/cli/ioscli cluster -list && /usr/ios/cli/ioscli cluster -status -fmt :";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspAction {
    Start,
    Stop,
}

impl SspAction {
    fn flag(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    fn target(self) -> ClusterStatus {
        match self {
            Self::Start => ClusterStatus::Up,
            Self::Stop => ClusterStatus::Down,
        }
    }
}

pub struct SspCoordinator<'a> {
    exec: &'a dyn RemoteExecutor,
    journal: Journal<'a>,
}

impl<'a> SspCoordinator<'a> {
    pub fn new(exec: &'a dyn RemoteExecutor, journal: Journal<'a>) -> Self {
        Self { exec, journal }
    }

    /// Refreshes the cluster status and peer table of `record`.
    ///
    /// The cluster name is kept when the node is found down, so it can be
    /// started again. The first answer is also kept as the pre-run status.
    pub fn query(&self, record: &mut ViosRecord) {
        let vios = record.name.clone();
        let report = match self.exec.execute(&vios, STATUS) {
            Ok(out) => parse_cluster_status(&out.stdout),
            Err(e) => {
                debug!(vios = %vios, "{e}");
                None
            }
        };

        match report {
            None => {
                record.cluster_status = ClusterStatus::Unknown;
                self.journal.error(&vios, "failed to get the SSP cluster status");
            }
            Some(ClusterReport::NoCluster) => {
                record.cluster_status = ClusterStatus::Down;
                record.ssp_peers.clear();
                self.journal.info(&vios, "SSP cluster is DOWN");
            }
            Some(report @ ClusterReport::Members(_)) => {
                record.cluster_status = ClusterStatus::Up;
                if let Some(name) = report.cluster_name() {
                    record.ssp_cluster = Some(name.to_string());
                }
                if let ClusterReport::Members(peers) = report {
                    for (node, peer) in &peers {
                        debug!(
                            vios = %vios,
                            node = %node,
                            cluster = %peer.cluster,
                            cluster_state = %peer.cluster_state,
                            node_state = %peer.node_state,
                            "SSP peer"
                        );
                    }
                    record.ssp_peers = peers;
                }
                self.journal.info(
                    &vios,
                    format!(
                        "SSP cluster {} is UP with {} node(s)",
                        record.ssp_cluster.as_deref().unwrap_or("?"),
                        record.ssp_peers.len()
                    ),
                );
            }
        }
        if record.initial_cluster_status.is_none() {
            record.initial_cluster_status = Some(record.cluster_status);
        }
    }

    /// Whether both members agree on the cluster.
    ///
    /// An unknown status is never consistent. Two running nodes must
    /// report the same cluster and the same peer table.
    pub fn consistent(&self, pair: &ViosPair) -> bool {
        let [a, b] = &pair.members;
        let ok = match (a.cluster_status, b.cluster_status) {
            (ClusterStatus::Unknown, _) | (_, ClusterStatus::Unknown) => false,
            (ClusterStatus::Up, ClusterStatus::Up) => {
                a.ssp_cluster == b.ssp_cluster && a.ssp_peers == b.ssp_peers
            }
            _ => true,
        };
        if !ok {
            for m in &pair.members {
                self.journal.warn(
                    &m.name,
                    format!(
                        "SSP status of pair {pair} is inconsistent ({}: {}, {}: {})",
                        a.name, a.cluster_status, b.name, b.cluster_status
                    ),
                );
            }
        }
        ok
    }

    pub fn stop(&self, pair: &mut ViosPair, index: usize) -> Outcome {
        self.transition(SspAction::Stop, pair, index)
    }

    pub fn start(&self, pair: &mut ViosPair, index: usize) -> Outcome {
        self.transition(SspAction::Start, pair, index)
    }

    fn transition(&self, action: SspAction, pair: &mut ViosPair, index: usize) -> Outcome {
        let other = &pair.members[ViosPair::other(index)];
        let member = &pair.members[index];
        let vios = member.name.clone();

        // A pair where neither node was running before the run has nothing
        // to restore. Current status is not enough: a stopped node looks
        // the same as one that never joined.
        let was_down = |r: &ViosRecord| r.initial_cluster_status == Some(ClusterStatus::Down);
        let nothing_to_do = member.cluster_status == action.target()
            || (action == SspAction::Start && was_down(member) && was_down(other));
        if nothing_to_do {
            self.journal
                .info(&vios, format!("nothing to {} as far as SSP is concerned", action.flag()));
            return Outcome::Success;
        }

        let Some(cluster) = member.ssp_cluster.clone().or_else(|| other.ssp_cluster.clone()) else {
            self.journal
                .error(&vios, format!("cannot {} SSP: cluster name unknown", action.flag()));
            return Outcome::Failure;
        };
        let host = match action {
            SspAction::Start => other.name.clone(),
            SspAction::Stop => vios.clone(),
        };
        let command = format!(
            "PATH=$PATH:/usr/bin /usr/sbin/clctrl -{} -n {cluster} -m {vios}",
            action.flag()
        );

        let result = self.exec.execute(&host, &command);
        let record = &mut pair.members[index];
        match result {
            Ok(out) if out.success => {
                record.cluster_status = action.target();
                record.ssp_cluster = Some(cluster.clone());
                self.journal
                    .info(&vios, format!("cluster {cluster} {} succeeded", action.flag()));
                Outcome::Success
            }
            Ok(out) => {
                for line in out.stdout.iter().chain(&out.stderr) {
                    debug!(vios = %vios, "clctrl: {line}");
                }
                self.journal
                    .error(&vios, format!("failed to {} cluster {cluster}", action.flag()));
                self.query(record);
                Outcome::Failure
            }
            Err(e) => {
                self.journal
                    .error(&vios, format!("failed to {} cluster {cluster}: {e}", action.flag()));
                Outcome::Failure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::exec::testing::{ScriptedExecutor, failed, ok};
    use crate::model::Level;
    use crate::storage::Storage;

    const UP: &str = "\
CLUSTER_NAME:    ssp1
gdr_ssp:OK:vios1:8284-22A0221FD4BV:1:OK:OK
gdr_ssp:OK:vios2:8284-22A0221FD4BV:2:OK:OK";

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).unwrap();
        (dir, storage)
    }

    fn pair() -> ViosPair {
        ViosPair::new(ViosRecord::new("vios1"), ViosRecord::new("vios2"))
    }

    fn queried(exec: &ScriptedExecutor, storage: &Storage) -> ViosPair {
        let ssp = SspCoordinator::new(exec, Journal::new(storage));
        let mut pair = pair();
        for m in &mut pair.members {
            ssp.query(m);
        }
        pair
    }

    #[test]
    fn both_up_with_same_table_is_consistent() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on("cluster -status", vec![ok(UP)]);

        let pair = queried(&exec, &storage);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Up);
        assert_eq!(pair.members[0].ssp_cluster.as_deref(), Some("gdr_ssp"));
        assert!(SspCoordinator::new(&exec, Journal::new(&storage)).consistent(&pair));
    }

    #[test]
    fn differing_tables_are_inconsistent() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on_host("vios1", "cluster -status", vec![ok(UP)]);
        exec.on_host(
            "vios2",
            "cluster -status",
            vec![ok("gdr_ssp:OK:vios1:x:1:DOWN:OK\ngdr_ssp:OK:vios2:x:2:OK:OK")],
        );

        let pair = queried(&exec, &storage);
        assert!(!SspCoordinator::new(&exec, Journal::new(&storage)).consistent(&pair));
    }

    #[test]
    fn one_member_in_a_cluster_is_consistent() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on_host("vios1", "cluster -status", vec![ok(UP)]);
        exec.on_host("vios2", "cluster -status", vec![failed("Cluster does not exist.")]);

        let pair = queried(&exec, &storage);
        assert_eq!(pair.members[1].cluster_status, ClusterStatus::Down);
        assert!(SspCoordinator::new(&exec, Journal::new(&storage)).consistent(&pair));
    }

    #[test]
    fn unknown_status_is_inconsistent() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on_host("vios1", "cluster -status", vec![ok(UP)]);

        let pair = queried(&exec, &storage);
        assert_eq!(pair.members[1].cluster_status, ClusterStatus::Unknown);
        assert!(!SspCoordinator::new(&exec, Journal::new(&storage)).consistent(&pair));
    }

    #[test]
    fn start_with_both_down_is_a_silent_noop() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));
        let mut pair = pair();
        for m in &mut pair.members {
            m.cluster_status = ClusterStatus::Down;
            m.initial_cluster_status = Some(ClusterStatus::Down);
            m.ssp_cluster = Some("gdr_ssp".into());
        }

        assert_eq!(ssp.start(&mut pair, 0), Outcome::Success);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn stop_runs_on_the_node_and_start_from_its_partner() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on("clctrl", vec![ok("")]);
        exec.on("cluster -status", vec![ok(UP)]);
        let mut pair = queried(&exec, &storage);
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));

        assert_eq!(ssp.stop(&mut pair, 0), Outcome::Success);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Down);
        assert_eq!(ssp.start(&mut pair, 0), Outcome::Success);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Up);

        let calls = exec.calls_matching("clctrl");
        assert_eq!(
            calls,
            vec![
                ("vios1".to_string(), "PATH=$PATH:/usr/bin /usr/sbin/clctrl -stop -n gdr_ssp -m vios1".to_string()),
                ("vios2".to_string(), "PATH=$PATH:/usr/bin /usr/sbin/clctrl -start -n gdr_ssp -m vios1".to_string()),
            ]
        );
    }

    #[test]
    fn stop_when_already_down_is_a_noop() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));
        let mut pair = pair();
        pair.members[0].cluster_status = ClusterStatus::Down;

        assert_eq!(ssp.stop(&mut pair, 0), Outcome::Success);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn failed_transition_is_journaled_not_raised() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on("clctrl", vec![failed("clctrl: node busy")]);
        exec.on("cluster -status", vec![ok(UP)]);
        let mut pair = queried(&exec, &storage);
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));

        assert_eq!(ssp.stop(&mut pair, 0), Outcome::Failure);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Up);
        let journal = storage.load_journal("vios1").unwrap();
        assert!(journal.iter().any(|e| e.message.contains("failed to stop cluster gdr_ssp")));
    }

    #[test]
    fn node_stopped_by_the_run_is_restarted_when_its_partner_has_no_cluster() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        exec.on_host("vios1", "cluster -status", vec![ok(UP)]);
        exec.on_host("vios2", "cluster -status", vec![failed("Cluster does not exist.")]);
        exec.on("clctrl", vec![ok("")]);
        let mut pair = queried(&exec, &storage);
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));

        assert_eq!(ssp.stop(&mut pair, 0), Outcome::Success);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Down);
        assert_eq!(pair.members[0].initial_cluster_status, Some(ClusterStatus::Up));

        assert_eq!(ssp.start(&mut pair, 0), Outcome::Success);
        assert_eq!(pair.members[0].cluster_status, ClusterStatus::Up);
        let calls = exec.calls_matching("clctrl -start");
        assert_eq!(
            calls,
            vec![("vios2".to_string(), "PATH=$PATH:/usr/bin /usr/sbin/clctrl -start -n gdr_ssp -m vios1".to_string())]
        );
    }

    #[test]
    fn start_without_a_cluster_name_is_an_error() {
        let (_dir, storage) = test_storage();
        let exec = ScriptedExecutor::new();
        let ssp = SspCoordinator::new(&exec, Journal::new(&storage));
        let mut pair = pair();
        pair.members[0].cluster_status = ClusterStatus::Down;
        pair.members[0].initial_cluster_status = Some(ClusterStatus::Up);
        pair.members[1].cluster_status = ClusterStatus::Down;
        pair.members[1].initial_cluster_status = Some(ClusterStatus::Down);

        assert_eq!(ssp.start(&mut pair, 0), Outcome::Failure);
        assert!(exec.calls().is_empty());
        let journal = storage.load_journal("vios1").unwrap();
        assert!(journal.iter().any(|e| e.level == Level::Error && e.message.contains("cluster name unknown")));
    }
}
