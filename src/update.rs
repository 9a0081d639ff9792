//! `nim -o updateios` runs and their outcome.
//!
//! The tool's exit status is unreliable: preview always fails, and a run
//! with nothing left to do may fail too. The captured log is checked for
//! completion markers before a non-zero exit is called a failure.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::{Outcome, UpdateOptions, UpdatePhase};
use crate::parse::updateios::{no_uncommitted_updates, nothing_left_to_install, paragraphs_containing};

/// Builds the `updateios` command line, output redirected to `log`.
pub fn updateios_command(vios: &str, opts: &UpdateOptions, log: &Path) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut cmd = String::from("/usr/sbin/nim -o updateios");
    if let Some(source) = opts.lpp_source.as_deref().filter(|s| !s.is_empty()) {
        cmd.push_str(" -a lpp_source=");
        cmd.push_str(source);
    }
    cmd.push_str(" -a accept_licenses=");
    cmd.push_str(yes_no(opts.accept_licenses));
    cmd.push_str(" -a preview=");
    cmd.push_str(yes_no(opts.preview));
    if let Some(mode) = opts.mode {
        cmd.push_str(" -a updateios_flags=-");
        cmd.push_str(mode.flag());
    }
    format!("{cmd} {vios} > {} 2>&1", shell_quote(&log.display().to_string()))
}

/// Single-quotes `s` for `/bin/sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Decides the outcome of one phase from its exit status and log text.
pub fn classify(phase: UpdatePhase, opts: &UpdateOptions, exit_ok: bool, log: &str) -> Outcome {
    let benign = exit_ok
        || opts.preview
        || match phase {
            UpdatePhase::AutoCommit => no_uncommitted_updates(log),
            UpdatePhase::Update => nothing_left_to_install(log),
        };
    if benign { Outcome::Success } else { Outcome::Failure }
}

pub struct UpdateExecutor<'a> {
    exec: &'a dyn RemoteExecutor,
    journal: Journal<'a>,
    master: &'a str,
    output_dir: PathBuf,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(
        exec: &'a dyn RemoteExecutor,
        journal: Journal<'a>,
        master: &'a str,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            exec,
            journal,
            master,
            output_dir,
        }
    }

    pub fn log_path(&self, vios: &str, phase: UpdatePhase) -> PathBuf {
        self.output_dir.join(format!("updateios_{phase}_{vios}.log"))
    }

    /// Updates `vios`, committing pending updates first for an install.
    pub fn update(&self, vios: &str, opts: &UpdateOptions) -> Result<()> {
        if opts.needs_autocommit() {
            self.run_phase(vios, UpdatePhase::AutoCommit, &opts.autocommit())?;
        }
        self.run_phase(vios, UpdatePhase::Update, opts)
    }

    /// Runs one phase; levels are journaled before and after.
    pub fn run_phase(&self, vios: &str, phase: UpdatePhase, opts: &UpdateOptions) -> Result<()> {
        let log = self.log_path(vios, phase);
        let command = updateios_command(vios, opts, &log);
        self.journal.info(vios, format!("{phase} with [{command}]"));
        self.record_levels(vios, &format!("before {phase}"));

        let out = self.exec.execute(self.master, &command)?;
        let outcome = if out.success {
            Outcome::Success
        } else {
            let text = fs::read_to_string(&log).unwrap_or_else(|e| {
                warn!(vios, log = %log.display(), "cannot read updateios output: {e}");
                String::new()
            });
            if opts.preview {
                debug!(vios, "preview always exits non-zero");
            }
            if phase == UpdatePhase::Update {
                for line in paragraphs_containing(&text, "STATISTICS")
                    .into_iter()
                    .chain(paragraphs_containing(&text, "Installation Summary"))
                {
                    self.journal.info(vios, line.trim_end());
                }
            }
            classify(phase, opts, false, &text)
        };

        self.record_levels(vios, &format!("after {phase}"));

        if outcome.is_success() {
            let what = if opts.preview { " (preview only)" } else { "" };
            self.journal.info(
                vios,
                format!("updateios {phase} succeeded{what}, output in {}", log.display()),
            );
            Ok(())
        } else {
            self.journal.error(
                vios,
                format!("updateios {phase} failed, see {} and advise", log.display()),
            );
            Err(Error::UpdateExecutionFailure {
                vios: vios.to_string(),
                phase,
                log,
            })
        }
    }

    fn record_levels(&self, vios: &str, when: &str) {
        let level = |command: &str| match self.exec.execute(vios, command) {
            Ok(out) if out.success => out.stdout_text().trim().to_string(),
            _ => "unknown".to_string(),
        };
        let oslevel = level("/usr/bin/oslevel -s");
        let ioslevel = level("/usr/ios/cli/ioscli ioslevel");
        self.journal
            .info(vios, format!("{when}: oslevel={oslevel} ioslevel={ioslevel}"));
    }
}
