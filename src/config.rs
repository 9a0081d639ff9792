//! vios-update configuration.
//!
//! Loaded from `~/.vios-update/config.toml` or the file given with
//! `--config`. Every key has a default except `hmc`, which commands that
//! talk to the health check tool require.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exec::C_RSH;
use crate::storage::Storage;

/// vios-update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// HMC managing the CECs, passed to the health check tool.
    pub hmc: String,

    /// Host name of the NIM master. Commands for it run locally.
    pub master: String,

    pub health_tool: PathBuf,
    pub remote_shell: PathBuf,

    /// Journals, discovery cache and updateios output.
    /// Defaults to `~/.vios-update/`.
    pub data_dir: Option<PathBuf>,

    /// Seconds between two `alt_disk_install` status polls.
    pub poll_interval_secs: u64,

    /// Polls without progress before the copy is declared timed out.
    pub poll_max_stalled: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hmc: String::new(),
            master: "localhost".to_string(),
            health_tool: PathBuf::from("/usr/sbin/vioshc.py"),
            remote_shell: PathBuf::from(C_RSH),
            data_dir: None,
            poll_interval_secs: 20,
            poll_max_stalled: 90,
        }
    }
}

impl Config {
    /// Load config from `path`, or from `~/.vios-update/config.toml`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;

        if config.poll_max_stalled == 0 {
            return Err(format!(
                "poll-max-stalled must be at least 1 in {}",
                path.display()
            ));
        }

        Ok(config)
    }

    /// The config file path: `~/.vios-update/config.toml`.
    pub fn path() -> Option<PathBuf> {
        Storage::default_root().map(|r| r.join("config.toml"))
    }

    /// Fails when no HMC is configured.
    pub fn require_hmc(&self) -> Result<&str, String> {
        if self.hmc.is_empty() {
            return Err("hmc is not set\n\
                 Add it to the config file or pass --hmc:\n\n\
                 hmc = \"hmc1.example.com\""
                .to_string());
        }
        Ok(&self.hmc)
    }

    /// The data directory, falling back to `~/.vios-update/`.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(Storage::default_root)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "hmc = \"hmc1\"\npoll-interval-secs = 5\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.require_hmc().unwrap(), "hmc1");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.poll_max_stalled, 90);
        assert_eq!(config.health_tool, PathBuf::from("/usr/sbin/vioshc.py"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.contains("failed to read"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll-max-stalled = \"many\"\n").unwrap();

        assert!(Config::load(Some(&path)).unwrap_err().contains("invalid config"));
    }

    #[test]
    fn zero_stall_budget_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll-max-stalled = 0\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn hmc_is_required_on_demand() {
        assert!(Config::default().require_hmc().is_err());
    }
}
