//! Discovery cache: UUIDs found by health-check discovery, keyed by VIOS name.
//!
//! Discovery walks every managed system behind the HMC, which is slow.
//! A cached row is only trusted while the VIOS still has the same CEC serial
//! and partition id it had when the UUIDs were recorded.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension};

use crate::model::ViosRecord;

use super::{Result, Storage, StorageError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS discovery (
    name TEXT PRIMARY KEY,
    cec_serial TEXT NOT NULL,
    partition_id TEXT NOT NULL,
    cec_uuid TEXT NOT NULL,
    vios_uuid TEXT NOT NULL,
    discovered_at TEXT NOT NULL
)";

/// One cached discovery result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUuids {
    pub cec_serial: String,
    pub partition_id: String,
    pub cec_uuid: String,
    pub vios_uuid: String,
    pub discovered_at: Timestamp,
}

impl CachedUuids {
    /// Whether this row was recorded for the record's current identifiers.
    pub fn matches(&self, record: &ViosRecord) -> bool {
        record.cec_serial.as_deref() == Some(self.cec_serial.as_str())
            && record.partition_id.as_deref() == Some(self.partition_id.as_str())
    }
}

impl Storage {
    /// Stores the UUIDs of a fully discovered record.
    ///
    /// Records missing any identifier are skipped: a partial row could
    /// never satisfy [`CachedUuids::matches`].
    pub fn save_discovery(&self, record: &ViosRecord) -> Result<()> {
        let (Some(serial), Some(part_id), Some(cec_uuid), Some(vios_uuid)) = (
            &record.cec_serial,
            &record.partition_id,
            &record.cec_uuid,
            &record.vios_uuid,
        ) else {
            return Ok(());
        };

        let conn = self.open_cache()?;
        conn.execute(
            "INSERT INTO discovery (name, cec_serial, partition_id, cec_uuid, vios_uuid, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                cec_serial = excluded.cec_serial,
                partition_id = excluded.partition_id,
                cec_uuid = excluded.cec_uuid,
                vios_uuid = excluded.vios_uuid,
                discovered_at = excluded.discovered_at",
            rusqlite::params![
                &record.name,
                serial,
                part_id,
                cec_uuid,
                vios_uuid,
                Timestamp::now().to_string(),
            ],
        )?;
        Ok(())
    }

    /// Loads the cached UUIDs for a VIOS, if any.
    pub fn load_discovery(&self, vios: &str) -> Result<Option<CachedUuids>> {
        let conn = self.open_cache()?;
        let row = conn
            .query_row(
                "SELECT cec_serial, partition_id, cec_uuid, vios_uuid, discovered_at
                 FROM discovery WHERE name = ?1",
                [vios],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((cec_serial, partition_id, cec_uuid, vios_uuid, at)) = row else {
            return Ok(None);
        };
        let discovered_at = at
            .parse::<Timestamp>()
            .map_err(|e| StorageError::Corrupt(format!("invalid discovered_at: {e}")))?;

        Ok(Some(CachedUuids {
            cec_serial,
            partition_id,
            cec_uuid,
            vios_uuid,
            discovered_at,
        }))
    }

    fn open_cache(&self) -> Result<Connection> {
        let conn = Connection::open(self.cache_path())?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("data")).unwrap();
        (dir, storage)
    }

    fn discovered(name: &str) -> ViosRecord {
        ViosRecord {
            cec_serial: Some("8284-22A*0221FD4".into()),
            partition_id: Some("2".into()),
            cec_uuid: Some("0d0fcb0a-9d6d-3f2b-a5c4-7e4e4a3a9f10".into()),
            vios_uuid: Some("3f1e9c5b-27a1-4d1e-9d44-0c3b1a5e6f21".into()),
            ..ViosRecord::new(name)
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, storage) = test_storage();
        let record = discovered("vios1");

        storage.save_discovery(&record).unwrap();
        let cached = storage.load_discovery("vios1").unwrap().unwrap();

        assert_eq!(cached.vios_uuid, "3f1e9c5b-27a1-4d1e-9d44-0c3b1a5e6f21");
        assert!(cached.matches(&record));
    }

    #[test]
    fn save_overwrites_previous_row() {
        let (_dir, storage) = test_storage();
        let mut record = discovered("vios1");
        storage.save_discovery(&record).unwrap();

        record.partition_id = Some("7".into());
        storage.save_discovery(&record).unwrap();

        let cached = storage.load_discovery("vios1").unwrap().unwrap();
        assert_eq!(cached.partition_id, "7");
    }

    #[test]
    fn partial_record_is_not_cached() {
        let (_dir, storage) = test_storage();
        let mut record = discovered("vios1");
        record.vios_uuid = None;

        storage.save_discovery(&record).unwrap();
        assert!(storage.load_discovery("vios1").unwrap().is_none());
    }

    #[test]
    fn moved_partition_no_longer_matches() {
        let (_dir, storage) = test_storage();
        let mut record = discovered("vios1");
        storage.save_discovery(&record).unwrap();

        record.partition_id = Some("9".into());
        let cached = storage.load_discovery("vios1").unwrap().unwrap();
        assert!(!cached.matches(&record));
    }
}
