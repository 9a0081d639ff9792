//! Local persistence for journals and discovery results.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! <root>/
//!   journal/<vios>.jsonl   # Append-only per-VIOS journal
//!   discovery.sqlite       # UUIDs found by health-check discovery
//!   vios/                  # Captured updateios output
//! ```

mod cache;
mod journal;

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

pub use cache::CachedUuids;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid VIOS name for a journal file: {0:?}")]
    InvalidName(String),

    #[error("corrupt storage: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Local file-based storage rooted at the data directory.
///
/// Safe to share between pair workers: journal writes for one VIOS are
/// serialized by a per-name lock, writes for different VIOS never contend.
pub struct Storage {
    root: PathBuf,
    journal_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory and its journal and output subdirectories are created
    /// if they don't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("journal"))?;
        fs::create_dir_all(root.join("vios"))?;
        Ok(Self {
            root,
            journal_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the default storage root: `~/.vios-update/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vios-update"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for captured tool output.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("vios")
    }

    fn journal_path(&self, vios: &str) -> Result<PathBuf> {
        if vios.is_empty() || vios.contains(['/', '\\']) || vios.starts_with('.') {
            return Err(StorageError::InvalidName(vios.to_string()));
        }
        Ok(self.root.join("journal").join(format!("{vios}.jsonl")))
    }

    /// The lock guarding one VIOS's journal file.
    fn journal_lock(&self, vios: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .journal_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(vios.to_string()).or_default())
    }

    fn cache_path(&self) -> PathBuf {
        self.root.join("discovery.sqlite")
    }
}
