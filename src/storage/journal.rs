//! Journal storage: append, reset, and load per-VIOS journal entries.

use std::{fs, io, sync::PoisonError};

// Traits must be in scope for `.lines()` on BufReader and `.write_all()` on File.
use io::{BufRead, Write};

use crate::model::JournalEntry;

use super::{Result, Storage};

impl Storage {
    /// Appends an entry to its VIOS's journal.
    pub fn append_journal(&self, entry: &JournalEntry) -> Result<()> {
        let path = self.journal_path(&entry.vios)?;
        let lock = self.journal_lock(&entry.vios);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Empties a VIOS's journal, starting a fresh sequence.
    pub fn reset_journal(&self, vios: &str) -> Result<()> {
        let path = self.journal_path(vios)?;
        let lock = self.journal_lock(vios);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::write(path, b"")?;
        Ok(())
    }

    /// Loads all journal entries for a VIOS, oldest first.
    ///
    /// A VIOS that was never journaled has an empty journal.
    pub fn load_journal(&self, vios: &str) -> Result<Vec<JournalEntry>> {
        let path = self.journal_path(vios)?;
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                entries.push(serde_json::from_str(&line)?);
            }
        }
        Ok(entries)
    }
}
