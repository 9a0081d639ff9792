use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::{MirrorMap, Outcome};
use crate::parse::lsnim::{NimStatus, parse_nim_status};
use crate::poll::{Poll, PollOutcome, Poller};

use super::Selection;

const MIRROR_FAILED: &str = "Failed to mirror the volume group";

/// Where a VIOS is in the alternate disk copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Idle,
    Unmirroring,
    Copying,
    Waiting,
    Remirroring,
    Done,
    Failed,
    TimedOut,
}

impl fmt::Display for CopyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Unmirroring => "unmirroring",
            Self::Copying => "copying",
            Self::Waiting => "waiting",
            Self::Remirroring => "remirroring",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

/// Runs the copy for one VIOS: unmirror, `alt_disk_install`, wait, remirror.
pub struct AltDiskCopy<'a> {
    exec: &'a dyn RemoteExecutor,
    journal: Journal<'a>,
    master: &'a str,
    poller: Poller<'a>,
}

/// State of one VIOS's run, logging every transition.
struct Lifecycle<'j> {
    journal: Journal<'j>,
    vios: &'j str,
    state: CopyState,
}

impl Lifecycle<'_> {
    fn enter(&mut self, next: CopyState) {
        debug!(vios = self.vios, from = %self.state, to = %next, "alt disk copy");
        self.state = next;
    }

    fn fail(&mut self, message: String) -> Outcome {
        self.journal.error(self.vios, message);
        self.enter(CopyState::Failed);
        Outcome::Failure
    }
}

impl<'a> AltDiskCopy<'a> {
    pub fn new(
        exec: &'a dyn RemoteExecutor,
        journal: Journal<'a>,
        master: &'a str,
        poller: Poller<'a>,
    ) -> Self {
        Self {
            exec,
            journal,
            master,
            poller,
        }
    }

    /// Takes the copy described by `selection`.
    ///
    /// `Err` is reserved for a cancelled wait and commands that could not be
    /// launched; everything else is an [`Outcome`]. A timeout leaves rootvg
    /// as it is: the copy may still be running.
    pub fn run(&self, vios: &str, selection: &Selection, layout: &MirrorMap) -> Result<Outcome> {
        let mut life = Lifecycle {
            journal: self.journal,
            vios,
            state: CopyState::Idle,
        };
        let disk = match selection {
            Selection::Reuse => {
                life.enter(CopyState::Done);
                return Ok(Outcome::Success);
            }
            Selection::Disk(disk) => &disk.name,
        };

        let mirrored = layout.is_mirrored();
        if mirrored {
            life.enter(CopyState::Unmirroring);
            let out = self.exec.execute(vios, "/usr/sbin/unmirrorvg rootvg 2>&1")?;
            if !out.success {
                return Ok(life.fail(format!("failed to unmirror rootvg: {}", out.stdout_text())));
            }
            self.journal.info(vios, "rootvg unmirrored");
        }

        life.enter(CopyState::Copying);
        let command = format!(
            "/usr/sbin/nim -o alt_disk_install -a source=rootvg -a disk={disk} -a set_bootlist=no -a boot_client=no {vios}"
        );
        self.journal.info(vios, format!("starting alternate rootvg copy on {disk}"));
        let out = self.exec.execute(self.master, &command)?;
        if !out.success || !out.stderr.is_empty() {
            return Ok(life.fail(format!(
                "[{command}] was rejected: {}",
                out.stderr.join(" ")
            )));
        }

        life.enter(CopyState::Waiting);
        let outcome = match self.wait(vios) {
            PollOutcome::Ready(status) if status.succeeded() => {
                self.journal.info(vios, "alternate rootvg copy succeeded");
                Outcome::Success
            }
            PollOutcome::Ready(status) => {
                self.journal.error(vios, format!("alternate rootvg copy failed: {}", status.info));
                Outcome::Failure
            }
            PollOutcome::TimedOut { stalled, elapsed } => {
                self.journal.error(
                    vios,
                    format!(
                        "alternate rootvg copy shows no progress in {stalled} polls ({} minute(s) in all), manual intervention is required",
                        elapsed.as_secs() / 60
                    ),
                );
                life.enter(CopyState::TimedOut);
                return Ok(Outcome::TimedOut);
            }
            PollOutcome::Cancelled => {
                self.journal.warn(vios, "cancelled while waiting for the alternate rootvg copy");
                return Err(Error::Cancelled);
            }
        };

        if mirrored && !self.remirror(&mut life, layout)? {
            return Ok(Outcome::Failure);
        }

        if outcome.is_success() {
            life.enter(CopyState::Done);
        } else {
            life.enter(CopyState::Failed);
        }
        Ok(outcome)
    }

    /// Polls the NIM client state until the operation is over.
    ///
    /// A change of the `info` attribute is progress; a failed or
    /// unreadable query is not.
    fn wait(&self, vios: &str) -> PollOutcome<NimStatus> {
        let command = format!("/usr/sbin/lsnim -Z -a Cstate -a info -a Cstate_result {vios}");
        let mut last_info: Option<String> = None;

        self.poller.run(|| {
            let status = match self.exec.execute(self.master, &command) {
                Ok(out) if out.success => parse_nim_status(&out.stdout),
                _ => None,
            };
            let Some(status) = status else {
                return Poll::Stalled;
            };
            if status.is_ready() {
                return Poll::Ready(status);
            }
            if last_info.as_deref() == Some(status.info.as_str()) {
                Poll::Stalled
            } else {
                info!(vios, "{}", status.info);
                last_info = Some(status.info);
                Poll::Progress
            }
        })
    }

    /// Mirrors rootvg back onto its original copy disks.
    fn remirror(&self, life: &mut Lifecycle<'_>, layout: &MirrorMap) -> Result<bool> {
        let vios = life.vios;
        life.enter(CopyState::Remirroring);

        let disks = layout.mirror_disks();
        let command = format!(
            "/usr/sbin/mirrorvg -m -c {} rootvg {} 2>&1",
            disks.len() + 1,
            disks.join(" ")
        );
        let out = self.exec.execute(vios, &command)?;
        if !out.success || out.stdout.iter().any(|l| l.contains(MIRROR_FAILED)) {
            life.fail(format!("failed to mirror rootvg again: [{command}] {}", out.stdout_text()));
            return Ok(false);
        }
        self.journal
            .info(vios, format!("rootvg mirrored again on {}", disks.join(", ")));
        Ok(true)
    }
}
