//! The rolling update of VIOS pairs.
//!
//! A run validates the requested pairs, discovers health check UUIDs once,
//! then works on every kept pair concurrently. Within a pair the members are
//! handled one after the other so that one of them always serves the
//! clients:
//!
//! ```text
//! SSP query ─► health assessment ─► per member: mirror ─► disk ─► copy
//!           ─► per member: SSP stop ─► updateios ─► SSP start
//! ```
//!
//! Any failure before the update phase abandons the pair: no member is
//! updated without a rollback copy. An SSP node stopped by the run is
//! started again before the worker returns, whatever happened in between.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;

use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::altdisk::{AltDiskCopy, AltinstPolicy, DiskSelector, SelectRequest, Selection};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::health::HealthCheck;
use crate::inventory::Inventory;
use crate::journal::Journal;
use crate::mirror::analyze_rootvg;
use crate::model::{ClusterStatus, Outcome, UpdateMode, UpdateOptions, ViosPair, ViosRecord};
use crate::pair::validate_pairs;
use crate::poll::{CancelFlag, Clock, Poller};
use crate::ssp::SspCoordinator;
use crate::storage::Storage;
use crate::update::UpdateExecutor;

/// What the operator asked for.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Proposed pairs, as given on the command line.
    pub pairs: Vec<Vec<String>>,

    pub update: UpdateOptions,

    /// Operator-chosen target disk per VIOS.
    pub preferred_disks: BTreeMap<String, String>,

    pub altinst_policy: AltinstPolicy,
    pub clean_old_rootvg: bool,

    /// Stop after the health assessment, changing nothing.
    pub check_only: bool,
}

/// Longest NIM resource name `updateios` accepts.
pub const MAX_LPP_SOURCE_LEN: usize = 39;

impl RunRequest {
    /// Rejects update options `nim -o updateios` would refuse.
    pub fn validate(&self) -> Result<()> {
        let source = self.update.lpp_source.as_deref().unwrap_or_default();
        if source.len() > MAX_LPP_SOURCE_LEN {
            return Err(Error::Validation(format!(
                "lpp_source \"{source}\" is longer than {MAX_LPP_SOURCE_LEN} characters"
            )));
        }
        if self.update.mode == Some(UpdateMode::Install) && source.is_empty() {
            return Err(Error::Validation(
                "install mode needs an lpp_source".to_string(),
            ));
        }
        if self.pairs.is_empty() {
            return Err(Error::Validation("no pair to update".to_string()));
        }
        Ok(())
    }
}

/// The last workflow step a VIOS entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Ssp,
    Health,
    Mirror,
    DiskSelection,
    Copy,
    Update,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ssp => "SSP check",
            Self::Health => "health check",
            Self::Mirror => "mirror analysis",
            Self::DiskSelection => "disk selection",
            Self::Copy => "alternate disk copy",
            Self::Update => "update",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViosReport {
    pub vios: String,
    pub phase: Phase,
    pub outcome: Outcome,

    /// Errors met on the way, fatal to the VIOS or not.
    pub errors: Vec<String>,
}

impl ViosReport {
    fn new(vios: &str) -> Self {
        Self {
            vios: vios.to_string(),
            phase: Phase::Ssp,
            outcome: Outcome::Success,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, outcome: Outcome, error: &Error) {
        self.outcome = outcome;
        self.errors.push(error.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub pair: String,
    pub members: [ViosReport; 2],
    pub abandoned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pairs: Vec<PairReport>,
    pub suppressed: Vec<Vec<String>>,

    /// The run was interrupted; `pairs` holds what the workers got to.
    pub cancelled: bool,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled
            && self.suppressed.is_empty()
            && self
                .pairs
                .iter()
                .all(|p| !p.abandoned && p.members.iter().all(|m| m.outcome.is_success()))
    }
}

pub struct Orchestrator<'a> {
    exec: &'a dyn RemoteExecutor,
    inventory: &'a dyn Inventory,
    storage: &'a Storage,
    config: &'a Config,
    clock: &'a dyn Clock,
    cancel: &'a CancelFlag,
}

/// Per-pair state owned by one worker.
struct PairRun<'p> {
    pair: ViosPair,
    reports: [ViosReport; 2],
    stopped: [bool; 2],
    journal: Journal<'p>,
}

impl PairRun<'_> {
    fn name(&self, index: usize) -> String {
        self.pair.members[index].name.clone()
    }

    fn enter(&mut self, index: usize, phase: Phase) {
        self.reports[index].phase = phase;
    }

    /// Marks the pair abandoned; members neither failed nor done are skipped.
    fn abandon(&mut self, reason: &str) {
        self.pair.valid = false;
        for (m, report) in self.pair.members.iter().zip(&mut self.reports) {
            if report.outcome.is_success() && report.phase != Phase::Done {
                report.outcome = Outcome::Failure;
                report.errors.push(format!("skipped: {reason}"));
            }
            self.journal.warn(&m.name, format!("pair {} abandoned: {reason}", self.pair));
        }
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        exec: &'a dyn RemoteExecutor,
        inventory: &'a dyn Inventory,
        storage: &'a Storage,
        config: &'a Config,
        clock: &'a dyn Clock,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            exec,
            inventory,
            storage,
            config,
            clock,
            cancel,
        }
    }

    fn journal(&self) -> Journal<'a> {
        Journal::new(self.storage)
    }

    fn health(&self) -> HealthCheck<'a> {
        HealthCheck::new(
            self.exec,
            self.storage,
            &self.config.master,
            &self.config.hmc,
            &self.config.health_tool,
        )
    }

    /// Runs the whole workflow.
    ///
    /// `Err` only for run-level problems such as a missing health tool.
    /// Pair-level failures and a cancellation are in the report.
    pub fn run(&self, req: &RunRequest) -> Result<RunReport> {
        req.validate()?;
        let run_id = Uuid::new_v4();
        let health = self.health();
        health.check_tool()?;

        let known = self.inventory.known_vios();
        let validation = validate_pairs(&req.pairs, &known, self.journal(), run_id);
        info!(
            %run_id,
            kept = validation.kept.len(),
            suppressed = validation.suppressed.len(),
            "pairs validated"
        );

        let mut records: Vec<ViosRecord> = validation
            .kept
            .iter()
            .flatten()
            .map(|name| self.record(name))
            .collect();
        if !records.is_empty() {
            health.discover(&mut records);
        }

        let mut pairs = Vec::new();
        let mut records = records.into_iter();
        while let (Some(a), Some(b)) = (records.next(), records.next()) {
            pairs.push(ViosPair::new(a, b));
        }

        let reports: Vec<PairReport> = thread::scope(|s| {
            let workers: Vec<_> = pairs
                .into_iter()
                .map(|pair| {
                    let name = pair.to_string();
                    let handle = s.spawn(move || {
                        let _span = info_span!("pair", %pair).entered();
                        self.run_pair(pair, req)
                    });
                    (name, handle)
                })
                .collect();

            workers
                .into_iter()
                .filter_map(|(name, handle)| match handle.join() {
                    Ok(report) => Some(report),
                    Err(_) => {
                        error!(pair = %name, "pair worker panicked");
                        None
                    }
                })
                .collect()
        });

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!(%run_id, finished = reports.len(), "run cancelled");
        }
        Ok(RunReport {
            run_id,
            pairs: reports,
            suppressed: validation.suppressed,
            cancelled,
        })
    }

    fn record(&self, name: &str) -> ViosRecord {
        let mut record = ViosRecord::new(name);
        match self.inventory.management(name) {
            Some(m) => {
                record.cec_serial = Some(m.cec_serial);
                record.partition_id = Some(m.partition_id);
            }
            None => {
                let e = Error::InventoryMismatch {
                    vios: name.to_string(),
                    reason: "no management CEC serial or partition id in NIM".to_string(),
                };
                self.journal().warn(name, e.to_string());
            }
        }
        record
    }

    fn run_pair(&self, pair: ViosPair, req: &RunRequest) -> PairReport {
        let names = pair.names();
        let mut run = PairRun {
            reports: [ViosReport::new(names[0]), ViosReport::new(names[1])],
            pair,
            stopped: [false; 2],
            journal: self.journal(),
        };

        self.prepare_and_update(&mut run, req);
        self.restore_ssp(&mut run);

        for (m, report) in run.pair.members.iter().zip(&run.reports) {
            let message = format!("rolling update finished: {} at {}", report.outcome, report.phase);
            if report.outcome.is_success() {
                run.journal.info(&m.name, message);
            } else {
                run.journal.error(&m.name, message);
            }
        }

        PairReport {
            pair: run.pair.to_string(),
            abandoned: !run.pair.valid,
            members: run.reports,
        }
    }

    fn prepare_and_update(&self, run: &mut PairRun<'_>, req: &RunRequest) {
        let ssp = SspCoordinator::new(self.exec, run.journal);
        for m in &mut run.pair.members {
            ssp.query(m);
        }
        if !ssp.consistent(&run.pair) {
            run.abandon("SSP cluster status is inconsistent");
            return;
        }

        for i in 0..2 {
            run.enter(i, Phase::Health);
        }
        let assessment = self.health().assess(&run.pair);
        if !assessment.eligible {
            let err = Error::HealthCheckIneligible {
                pair: run.pair.to_string(),
                rate: assessment.rate,
            };
            run.abandon(&err.to_string());
            return;
        }
        if req.check_only {
            for i in 0..2 {
                run.enter(i, Phase::Done);
            }
            return;
        }

        for i in 0..2 {
            if let Err(e) = self.snapshot(run, i, req) {
                let outcome = match e {
                    Error::SnapshotTimeout { .. } => Outcome::TimedOut,
                    _ => Outcome::Failure,
                };
                run.reports[i].fail(outcome, &e);
                run.abandon(&format!("{} could not be copied", run.name(i)));
                return;
            }
        }

        for i in 0..2 {
            if self.cancel.is_cancelled() {
                run.abandon("cancelled");
                return;
            }
            run.enter(i, Phase::Update);
            if let Err(e) = self.update_member(run, &ssp, i, req) {
                run.reports[i].fail(Outcome::Failure, &e);
                run.abandon(&format!("{} was not updated", run.name(i)));
                return;
            }
            run.enter(i, Phase::Done);
        }
    }

    /// Mirror analysis, disk selection and alternate disk copy of one member.
    fn snapshot(&self, run: &mut PairRun<'_>, i: usize, req: &RunRequest) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let vios = run.name(i);

        run.enter(i, Phase::Mirror);
        let layout = analyze_rootvg(self.exec, run.journal, &vios)?;

        run.enter(i, Phase::DiskSelection);
        let selector = DiskSelector::new(self.exec, run.journal);
        let selection = selector.select(&SelectRequest {
            vios: &vios,
            altinst_exists: req.altinst_policy == AltinstPolicy::Reuse && selector.has_altinst(&vios),
            clean_old_rootvg: req.clean_old_rootvg,
            preferred: req.preferred_disks.get(&vios).map(String::as_str),
            copy1_partitions: layout.copy1_partitions(),
            policy: req.altinst_policy,
        })?;

        run.enter(i, Phase::Copy);
        let poller = Poller::new(
            self.clock,
            self.cancel,
            self.config.poll_interval(),
            self.config.poll_max_stalled,
        );
        let copy = AltDiskCopy::new(self.exec, run.journal, &self.config.master, poller);
        match copy.run(&vios, &selection, &layout)? {
            Outcome::Success => Ok(()),
            Outcome::Failure => Err(Error::SnapshotFailure {
                vios,
                reason: format!("copy onto {} did not complete", describe(&selection)),
            }),
            Outcome::TimedOut => Err(Error::SnapshotTimeout { vios }),
        }
    }

    /// SSP stop, updateios, SSP start for one member.
    fn update_member(
        &self,
        run: &mut PairRun<'_>,
        ssp: &SspCoordinator<'_>,
        i: usize,
        req: &RunRequest,
    ) -> Result<()> {
        let vios = run.name(i);
        if run.pair.members[i].cluster_status == ClusterStatus::Up {
            if ssp.stop(&mut run.pair, i) != Outcome::Success {
                return Err(Error::SspTransitionFailure {
                    vios,
                    action: "stop",
                });
            }
            run.stopped[i] = true;
        }

        let updater = UpdateExecutor::new(
            self.exec,
            run.journal,
            &self.config.master,
            self.storage.output_dir(),
        );
        let result = updater.update(&vios, &req.update);
        self.start_if_stopped(run, ssp, i);
        result
    }

    fn start_if_stopped(&self, run: &mut PairRun<'_>, ssp: &SspCoordinator<'_>, i: usize) {
        if !run.stopped[i] {
            return;
        }
        if ssp.start(&mut run.pair, i).is_success() {
            run.stopped[i] = false;
        } else {
            let e = Error::SspTransitionFailure {
                vios: run.name(i),
                action: "start",
            };
            warn!("{e}");
            run.reports[i].errors.push(e.to_string());
        }
    }

    /// Starts again any node this run stopped and has not restarted.
    fn restore_ssp(&self, run: &mut PairRun<'_>) {
        let ssp = SspCoordinator::new(self.exec, run.journal);
        for i in 0..2 {
            self.start_if_stopped(run, &ssp, i);
        }
    }
}

fn describe(selection: &Selection) -> &str {
    match selection {
        Selection::Reuse => "the existing altinst_rootvg",
        Selection::Disk(disk) => &disk.name,
    }
}
