//! Per-VIOS journal: every decision taken for a VIOS, for audit and support.
//!
//! Each message goes both to the progress log (`tracing`) and to the
//! VIOS's journal file, so the two never tell different stories.
//! A journal write failure is logged and never aborts the workflow.

use jiff::Timestamp;
use tracing::{error, info, warn};

use crate::model::{JournalEntry, Level};
use crate::storage::Storage;

/// Handle for journaling, cheap to copy into pair workers.
#[derive(Clone, Copy)]
pub struct Journal<'a> {
    storage: &'a Storage,
}

impl<'a> Journal<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn info(&self, vios: &str, message: impl Into<String>) {
        self.append(vios, Level::Info, message.into());
    }

    pub fn warn(&self, vios: &str, message: impl Into<String>) {
        self.append(vios, Level::Warn, message.into());
    }

    pub fn error(&self, vios: &str, message: impl Into<String>) {
        self.append(vios, Level::Error, message.into());
    }

    /// Clears a VIOS's journal; called once per VIOS at the start of a run.
    pub fn reset(&self, vios: &str) {
        if let Err(e) = self.storage.reset_journal(vios) {
            warn!(vios, "failed to reset journal: {e}");
        }
    }

    pub fn append(&self, vios: &str, level: Level, message: String) {
        match level {
            Level::Info => info!(vios, "{message}"),
            Level::Warn => warn!(vios, "{message}"),
            Level::Error => error!(vios, "{message}"),
        }

        // Empty names come from malformed pairs; they have no journal file.
        if vios.is_empty() {
            return;
        }
        let entry = JournalEntry {
            vios: vios.to_string(),
            level,
            message,
            recorded_at: Timestamp::now(),
        };
        if let Err(e) = self.storage.append_journal(&entry) {
            warn!(vios, "failed to write journal entry: {e}");
        }
    }
}
