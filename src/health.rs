//! Health checks through the external `vioshc.py` tool.
//!
//! Two phases. Discovery runs once per run and maps each VIOS to the CEC
//! and partition UUIDs the tool works with. Assessment runs once per pair
//! and decides whether the pair can lose one member for the update.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::{ViosPair, ViosRecord};
use crate::parse::is_diagnostic;
use crate::parse::vioshc::{parse_discovery, parse_pass_rate};
use crate::storage::Storage;

/// Result of a pair assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub eligible: bool,

    /// Measured pass rate; `None` when the tool printed none or never ran.
    pub rate: Option<u32>,
}

pub struct HealthCheck<'a> {
    exec: &'a dyn RemoteExecutor,
    storage: &'a Storage,
    journal: Journal<'a>,
    master: &'a str,
    hmc: &'a str,
    tool: &'a Path,
}

impl<'a> HealthCheck<'a> {
    pub fn new(
        exec: &'a dyn RemoteExecutor,
        storage: &'a Storage,
        master: &'a str,
        hmc: &'a str,
        tool: &'a Path,
    ) -> Self {
        Self {
            exec,
            storage,
            journal: Journal::new(storage),
            master,
            hmc,
            tool,
        }
    }

    /// Fails unless the tool exists and is executable.
    pub fn check_tool(&self) -> Result<()> {
        let executable = fs::metadata(self.tool)
            .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0);
        if !executable {
            return Err(Error::HealthToolMissing(self.tool.to_path_buf()));
        }
        debug!(tool = %self.tool.display(), "health check tool found");
        Ok(())
    }

    /// Fills in `cec_uuid` and `vios_uuid` for every record.
    ///
    /// Cached UUIDs recorded under the same serial and partition id are
    /// reused; the tool only runs when at least one record is not covered.
    /// Records left without UUIDs fail their pair's assessment.
    pub fn discover(&self, records: &mut [ViosRecord]) {
        for record in records.iter_mut() {
            self.apply_cached(record);
        }
        if records.iter().all(ViosRecord::has_uuids) {
            info!("all UUIDs found in the discovery cache, skipping discovery");
            return;
        }

        let command = format!("{} -i {} -l a -v", self.tool.display(), self.hmc);
        let out = match self.exec.execute(self.master, &command) {
            Ok(out) if out.success => out,
            Ok(out) => {
                for line in out.stdout.iter().chain(&out.stderr) {
                    warn!("vioshc: {line}");
                }
                self.journal_all(records, &format!("health check discovery failed: [{command}]"));
                return;
            }
            Err(e) => {
                self.journal_all(records, &format!("health check discovery failed: {e}"));
                return;
            }
        };

        let discovery = parse_discovery(&out.stdout);
        for line in &discovery.warnings {
            warn!("vioshc: {line}");
        }

        for record in records.iter_mut().filter(|r| !r.has_uuids()) {
            let (Some(serial), Some(partition_id)) =
                (record.cec_serial.clone(), record.partition_id.clone())
            else {
                debug!(vios = %record.name, "no management identifiers, not looked up");
                continue;
            };

            match discovery.systems.iter().find(|ms| ms.cec_serial == serial) {
                Some(ms) => {
                    record.cec_uuid = Some(ms.cec_uuid.clone());
                    self.journal.info(
                        &record.name,
                        format!("retrieved cec_uuid={} for cec_serial={serial}", ms.cec_uuid),
                    );
                }
                None => {
                    self.journal
                        .warn(&record.name, format!("managed system {serial} not found by discovery"));
                    continue;
                }
            }
            match discovery.find(&serial, &partition_id) {
                Some((_, row)) => {
                    record.vios_uuid = Some(row.vios_uuid.clone());
                    self.journal.info(
                        &record.name,
                        format!("retrieved vios_uuid={} for partition id {partition_id}", row.vios_uuid),
                    );
                }
                None => self.journal.warn(
                    &record.name,
                    format!("partition id {partition_id} not found on managed system {serial}"),
                ),
            }

            if let Err(e) = self.storage.save_discovery(record) {
                warn!(vios = %record.name, "failed to cache discovery result: {e}");
            }
        }
    }

    fn apply_cached(&self, record: &mut ViosRecord) {
        match self.storage.load_discovery(&record.name) {
            Ok(Some(cached)) if cached.matches(record) => {
                debug!(vios = %record.name, "using cached UUIDs from {}", cached.discovered_at);
                record.cec_uuid = Some(cached.cec_uuid);
                record.vios_uuid = Some(cached.vios_uuid);
            }
            Ok(_) => {}
            Err(e) => warn!(vios = %record.name, "failed to read discovery cache: {e}"),
        }
    }

    fn journal_all(&self, records: &[ViosRecord], message: &str) {
        for record in records {
            self.journal.error(&record.name, message);
        }
    }

    /// Runs the tool against the pair; eligible only on a clean exit with a
    /// 100% pass rate.
    pub fn assess(&self, pair: &ViosPair) -> Assessment {
        let ineligible = |rate| Assessment {
            eligible: false,
            rate,
        };

        let mut command = String::new();
        for member in &pair.members {
            let (Some(cec_uuid), Some(vios_uuid)) = (&member.cec_uuid, &member.vios_uuid) else {
                for m in &pair.members {
                    self.journal.warn(
                        &m.name,
                        format!("cannot assess pair {pair}: \"{}\" has no discovered UUIDs", member.name),
                    );
                }
                return ineligible(None);
            };
            if command.is_empty() {
                command = format!("{} -i {} -m {cec_uuid}", self.tool.display(), self.hmc);
            }
            command.push_str(&format!(" -U {vios_uuid}"));
        }
        command.push_str(" -v");

        let out = match self.exec.execute(self.master, &command) {
            Ok(out) => out,
            Err(e) => {
                for m in &pair.members {
                    self.journal.error(&m.name, format!("health assessment of {pair} failed: {e}"));
                }
                return ineligible(None);
            }
        };
        for line in out.stdout.iter().chain(&out.stderr).filter(|l| is_diagnostic(l)) {
            warn!(%pair, "vioshc: {line}");
        }

        let rate = parse_pass_rate(&out.stdout);
        if out.success && rate == Some(100) {
            for m in &pair.members {
                self.journal.info(&m.name, format!("health assessment of {pair} passed (100%)"));
            }
            return Assessment {
                eligible: true,
                rate,
            };
        }

        let measured = rate.map_or_else(|| "no pass rate".to_string(), |r| format!("pass rate {r}%"));
        for m in &pair.members {
            self.journal.warn(
                &m.name,
                format!(
                    "health assessment of {pair} failed ({measured}, exit {}), pair not updated",
                    if out.success { "ok" } else { "failed" }
                ),
            );
        }
        ineligible(rate)
    }
}
