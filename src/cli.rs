//! CLI interface for vios-update.
//!
//! Three commands, all driven from the NIM master:
//!
//! - `vios-update update --pair a,b ...`: the rolling update.
//! - `vios-update check --pair a,b ...`: everything up to the health
//!   assessment, changing nothing.
//! - `vios-update journal <vios>`: what the last run decided for a VIOS.

mod format;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::altdisk::AltinstPolicy;
use crate::config::Config;
use crate::exec::ShellExecutor;
use crate::inventory::NimInventory;
use crate::model::{UpdateMode, UpdateOptions};
use crate::orchestrate::{MAX_LPP_SOURCE_LEN, Orchestrator, RunRequest};
use crate::poll::{CancelFlag, SystemClock};
use crate::storage::Storage;

use format::{format_journal_entry, format_run_report};

/// vios-update: rolling updates of dual VIOS pairs.
#[derive(Debug, Parser)]
#[command(name = "vios-update", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file (default: `~/.vios-update/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: updating two pairs
  1. vios-update check --hmc hmc1 --pair vios1,vios2 --pair vios3,vios4
     → health assessment only, nothing changes
  2. vios-update update --hmc hmc1 --pair vios1,vios2 --pair vios3,vios4 \
       --lpp-source vios_3_1_4_10 --mode install --accept-licenses
  3. vios-update journal vios1

An existing altinst_rootvg is replaced unless --altinst reuse is given.";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy rootvg and update every pair, one member at a time.
    Update {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        update: UpdateArgs,

        /// Target disk for the alternate rootvg copy, as `vios=hdisk`.
        /// Can be specified multiple times.
        #[arg(long = "disk", value_parser = parse_disk)]
        disks: Vec<(String, String)>,

        /// What to do with an existing altinst_rootvg.
        #[arg(long, value_enum, default_value = "replace")]
        altinst: AltinstArg,

        /// Also remove a leftover old_rootvg before selecting a disk.
        #[arg(long)]
        clean_old_rootvg: bool,
    },

    /// Validate pairs and assess their health without changing anything.
    Check {
        #[command(flatten)]
        target: Target,
    },

    /// Print the journal of one VIOS.
    Journal {
        /// NIM name of the VIOS.
        vios: String,
    },
}

/// Which pairs, through which HMC.
#[derive(Debug, Args)]
pub struct Target {
    /// A pair of VIOS as `a,b`. Can be specified multiple times.
    #[arg(long = "pair", required = true, value_parser = parse_pair)]
    pairs: Vec<PairArg>,

    /// HMC to assess health through; overrides the config file.
    #[arg(long)]
    hmc: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// NIM lpp_source resource holding the filesets.
    #[arg(long)]
    lpp_source: Option<String>,

    /// Accept software license agreements.
    #[arg(long)]
    accept_licenses: bool,

    /// Preview only: updateios runs but installs nothing.
    #[arg(long)]
    preview: bool,

    /// updateios sub-mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

/// CLI-facing updateios mode, mapped to the domain `UpdateMode`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Install,
    Commit,
    Reject,
    Remove,
    Cleanup,
}

impl ModeArg {
    fn to_domain(self) -> UpdateMode {
        match self {
            Self::Install => UpdateMode::Install,
            Self::Commit => UpdateMode::Commit,
            Self::Reject => UpdateMode::Reject,
            Self::Remove => UpdateMode::Remove,
            Self::Cleanup => UpdateMode::Cleanup,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AltinstArg {
    /// Keep the existing copy; no new copy is taken.
    Reuse,
    /// Remove it and copy rootvg again.
    Replace,
}

impl AltinstArg {
    fn to_domain(self) -> AltinstPolicy {
        match self {
            Self::Reuse => AltinstPolicy::Reuse,
            Self::Replace => AltinstPolicy::Replace,
        }
    }
}

impl UpdateArgs {
    fn to_options(&self) -> Result<UpdateOptions, String> {
        if let Some(source) = &self.lpp_source
            && source.len() > MAX_LPP_SOURCE_LEN
        {
            return Err(format!(
                "--lpp-source must be at most {MAX_LPP_SOURCE_LEN} characters, got {}",
                source.len()
            ));
        }
        let mode = self.mode.map(ModeArg::to_domain);
        if mode == Some(UpdateMode::Install) && self.lpp_source.is_none() {
            return Err("--mode install requires --lpp-source".to_string());
        }
        Ok(UpdateOptions {
            lpp_source: self.lpp_source.clone(),
            accept_licenses: self.accept_licenses,
            preview: self.preview,
            mode,
        })
    }
}

/// The members of one `--pair`, as given.
#[derive(Debug, Clone)]
pub struct PairArg(Vec<String>);

impl Target {
    fn pairs(self) -> Vec<Vec<String>> {
        self.pairs.into_iter().map(|p| p.0).collect()
    }
}

/// Splits `a,b` into its members. Arity is left to pair validation, which
/// journals it.
fn parse_pair(s: &str) -> Result<PairArg, String> {
    if s.trim().is_empty() {
        return Err("a pair needs two VIOS names, as `vios1,vios2`".to_string());
    }
    Ok(PairArg(s.split(',').map(|n| n.trim().to_string()).collect()))
}

fn parse_disk(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((vios, disk)) if !vios.trim().is_empty() && !disk.trim().is_empty() => {
            Ok((vios.trim().to_string(), disk.trim().to_string()))
        }
        _ => Err(format!("expected `vios=hdisk`, got `{s}`")),
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    let mut config = Config::load(cli.config.as_deref())?;
    let root = config
        .data_dir()
        .ok_or("could not determine home directory")?;
    let storage =
        Storage::new(root).map_err(|e| format!("failed to initialize storage: {e}"))?;

    match cli.command {
        Command::Update {
            target,
            update,
            disks,
            altinst,
            clean_old_rootvg,
        } => {
            let hmc = target.hmc.clone();
            let request = RunRequest {
                pairs: target.pairs(),
                update: update.to_options()?,
                preferred_disks: disks.into_iter().collect::<BTreeMap<_, _>>(),
                altinst_policy: altinst.to_domain(),
                clean_old_rootvg,
                check_only: false,
            };
            apply_hmc(&mut config, hmc)?;
            cmd_run(&config, &storage, &request)
        }
        Command::Check { target } => {
            let hmc = target.hmc.clone();
            let request = RunRequest {
                pairs: target.pairs(),
                update: UpdateOptions {
                    lpp_source: None,
                    accept_licenses: false,
                    preview: true,
                    mode: None,
                },
                preferred_disks: BTreeMap::new(),
                altinst_policy: AltinstPolicy::default(),
                clean_old_rootvg: false,
                check_only: true,
            };
            apply_hmc(&mut config, hmc)?;
            cmd_run(&config, &storage, &request)
        }
        Command::Journal { vios } => cmd_journal(&storage, &vios),
    }
}

fn apply_hmc(config: &mut Config, hmc: Option<String>) -> Result<(), String> {
    if let Some(hmc) = hmc {
        config.hmc = hmc;
    }
    config.require_hmc().map(|_| ())
}

fn cmd_run(config: &Config, storage: &Storage, request: &RunRequest) -> Result<(), String> {
    let exec = ShellExecutor::new(&config.master, &config.remote_shell);
    let inventory = NimInventory::new(&exec, &config.master);
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("interrupted, stopping after the current step");
        on_interrupt.cancel();
    }) {
        warn!("cannot install the interrupt handler: {e}");
    }
    let orchestrator =
        Orchestrator::new(&exec, &inventory, storage, config, &SystemClock, &cancel);

    let report = orchestrator.run(request).map_err(|e| {
        if e.is_fatal() {
            format!("run aborted: {e}")
        } else {
            e.to_string()
        }
    })?;
    info!(run_id = %report.run_id, "run finished");
    print!("{}", format_run_report(&report));

    if report.cancelled {
        return Err(format!("run {} cancelled", report.run_id));
    }
    if report.all_succeeded() {
        Ok(())
    } else {
        Err(format!(
            "some pairs were not completed, see `vios-update journal <vios>` and {}",
            storage.root().join("journal").display()
        ))
    }
}

fn cmd_journal(storage: &Storage, vios: &str) -> Result<(), String> {
    let entries = storage
        .load_journal(vios)
        .map_err(|e| format!("failed to read journal of {vios}: {e}"))?;

    if entries.is_empty() {
        println!("No journal for {vios}");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_journal_entry(entry));
    }
    Ok(())
}
