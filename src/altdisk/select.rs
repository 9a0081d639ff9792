use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::DiskCandidate;
use crate::parse::lspv::{parse_free_disks, parse_pv_row};
use crate::parse::lsvg::parse_vg_size;

use super::{ALTINST_ROOTVG, OLD_ROOTVG};

/// What to do with an `altinst_rootvg` that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltinstPolicy {
    /// Keep it as this run's copy; no new copy is taken.
    Reuse,

    /// Remove it and take a fresh copy.
    #[default]
    Replace,
}

/// Outcome of disk selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The existing `altinst_rootvg` stands in for a new copy.
    Reuse,

    /// Copy rootvg onto this disk.
    Disk(DiskCandidate),
}

#[derive(Debug, Clone)]
pub struct SelectRequest<'r> {
    pub vios: &'r str,

    /// Whether an `altinst_rootvg` was found on the VIOS.
    pub altinst_exists: bool,

    /// Also remove a leftover `old_rootvg`.
    pub clean_old_rootvg: bool,

    /// Disk requested by the operator.
    pub preferred: Option<&'r str>,

    /// Partitions in rootvg copy 1, from the mirror analysis.
    pub copy1_partitions: u64,

    pub policy: AltinstPolicy,
}

/// Picks the target disk among `candidates`.
///
/// Only disks strictly larger than `required_mb` are eligible. Among them:
/// the preferred disk, else the disk of the previous copy, else the
/// smallest one, the first listed on a tie.
pub fn choose_disk<'c>(
    candidates: &'c [DiskCandidate],
    required_mb: u64,
    preferred: Option<&str>,
    previous: Option<&str>,
) -> Option<&'c DiskCandidate> {
    let eligible: Vec<&DiskCandidate> = candidates.iter().filter(|d| d.fits(required_mb)).collect();
    let named = |name: Option<&str>| {
        name.and_then(|n| eligible.iter().copied().find(|d| d.name == n))
    };

    named(preferred)
        .or_else(|| named(previous))
        .or_else(|| eligible.iter().copied().min_by_key(|d| d.size_mb))
}

pub struct DiskSelector<'a> {
    exec: &'a dyn RemoteExecutor,
    journal: Journal<'a>,
}

impl<'a> DiskSelector<'a> {
    pub fn new(exec: &'a dyn RemoteExecutor, journal: Journal<'a>) -> Self {
        Self { exec, journal }
    }

    /// Whether `vios` has an `altinst_rootvg` on any disk.
    pub fn has_altinst(&self, vios: &str) -> bool {
        !self.vg_disks(vios, ALTINST_ROOTVG).is_empty()
    }

    pub fn select(&self, req: &SelectRequest<'_>) -> Result<Selection> {
        let vios = req.vios;
        if req.policy == AltinstPolicy::Reuse && req.altinst_exists {
            self.journal.info(vios, "reusing the existing altinst_rootvg");
            return Ok(Selection::Reuse);
        }

        let mut vgs = Vec::new();
        if req.clean_old_rootvg {
            vgs.push(OLD_ROOTVG);
        }
        vgs.push(ALTINST_ROOTVG);
        let mut previous = None;
        for vg in vgs {
            let freed = self.remove_vg(vios, vg);
            if vg == ALTINST_ROOTVG {
                previous = freed;
            }
        }

        let size = parse_vg_size(&self.query(vios, "/usr/ios/cli/ioscli lsvg rootvg")?);
        debug!(vios, total_mb = size.total_mb, used_mb = size.used_mb, pp_size_mb = size.pp_size_mb, "rootvg size");
        let required_mb = size.pp_size_mb * req.copy1_partitions;
        if size.used_mb == 0 || required_mb == 0 {
            return Err(self.no_disk(vios, 0, "cannot compute the rootvg size"));
        }

        let candidates = parse_free_disks(&self.query(vios, "/usr/ios/cli/ioscli lspv -free")?);
        if candidates.is_empty() {
            return Err(self.no_disk(vios, required_mb, "no free disk"));
        }

        match choose_disk(&candidates, required_mb, req.preferred, previous.as_deref()) {
            Some(disk) => {
                if req.preferred.is_some_and(|p| p != disk.name) {
                    self.journal.warn(
                        vios,
                        format!("preferred disk is not free or too small for {required_mb} MB"),
                    );
                }
                self.journal.info(
                    vios,
                    format!(
                        "selected {} (pvid {}, {} MB) for the alternate rootvg copy",
                        disk.name, disk.pvid, disk.size_mb
                    ),
                );
                Ok(Selection::Disk(disk.clone()))
            }
            None => Err(self.no_disk(vios, required_mb, "no free disk is large enough")),
        }
    }

    fn no_disk(&self, vios: &str, required_mb: u64, why: &str) -> Error {
        self.journal
            .error(vios, format!("cannot take an alternate rootvg copy: {why}"));
        Error::NoEligibleDisk {
            vios: vios.to_string(),
            required_mb,
        }
    }

    /// Output of a listing command that must succeed.
    fn query(&self, vios: &str, command: &str) -> Result<Vec<String>> {
        let out = self.exec.execute(vios, command)?;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(self.no_disk(vios, 0, &format!("[{command}] failed")))
        }
    }

    /// `(disk, active)` for every disk of `vg`.
    fn vg_disks(&self, vios: &str, vg: &str) -> Vec<(String, bool)> {
        let command = format!("/usr/sbin/lspv | /bin/grep -w {vg}");
        match self.exec.execute(vios, &command) {
            Ok(out) if out.success => out
                .stdout
                .iter()
                .filter_map(|l| parse_pv_row(l))
                .filter(|row| row.vg == vg)
                .map(|row| {
                    debug!(vios, disk = %row.disk, pvid = %row.pvid, vg, active = row.active, "volume group disk");
                    (row.disk, row.active)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Removes `vg` and frees its disk. Returns the freed disk.
    fn remove_vg(&self, vios: &str, vg: &str) -> Option<String> {
        let mut freed = None;
        for (disk, active) in self.vg_disks(vios, vg) {
            if !active {
                // Not an error when the VG is already varied on elsewhere.
                let _ = self.exec.execute(vios, &format!("/usr/sbin/varyonvg {vg}"));
            }
            let exists = self
                .exec
                .execute(vios, &format!("/usr/sbin/lsvg {vg}"))
                .is_ok_and(|o| o.success);
            if !exists {
                continue;
            }

            self.journal.info(vios, format!("removing {vg} from {disk}"));
            let removed = self
                .exec
                .execute(vios, &format!("/usr/sbin/alt_rootvg_op -X {vg}"))
                .is_ok_and(|o| o.success);
            if !removed {
                self.journal.error(vios, format!("failed to remove {vg}"));
                continue;
            }

            let wipe = format!(
                "/etc/chdev -a pv=clear -l {disk}; /usr/bin/dd if=/dev/zero of=/dev/{disk} seek=7 count=1 bs=512"
            );
            if self.exec.execute(vios, &wipe).is_ok_and(|o| o.success) {
                self.journal.info(vios, format!("{disk} cleaned and free"));
                freed = Some(disk);
            } else {
                self.journal.error(vios, format!("failed to clean {disk} after removing {vg}"));
            }
        }
        freed
    }
}
