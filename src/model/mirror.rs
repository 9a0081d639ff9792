//! Rootvg mirror layout: which disk carries which logical partition copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bijection between copy indices and physical disks.
///
/// Built one `lsvg -M` line at a time. A disk carrying two different copies,
/// or a copy spread over two disks, cannot be unmirrored cleanly and is
/// rejected by [`MirrorMap::record`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorMap {
    copies: BTreeMap<u32, String>,
    disks: BTreeMap<String, u32>,

    /// Number of physical partitions belonging to copy 1.
    copy1_partitions: u64,
}

/// Why a line could not be added to a [`MirrorMap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutConflict {
    #[error("disk {disk} holds both copy {existing} and copy {other}")]
    TwoCopiesOnDisk {
        disk: String,
        existing: u32,
        other: u32,
    },

    #[error("copy {copy} spreads over {existing} and {other}")]
    CopyOnTwoDisks {
        copy: u32,
        existing: String,
        other: String,
    },
}

impl MirrorMap {
    /// Records that `disk` holds one partition of copy `copy`.
    pub fn record(&mut self, disk: &str, copy: u32) -> Result<(), LayoutConflict> {
        if let Some(&existing) = self.disks.get(disk)
            && existing != copy
        {
            return Err(LayoutConflict::TwoCopiesOnDisk {
                disk: disk.to_string(),
                existing,
                other: copy,
            });
        }
        if let Some(existing) = self.copies.get(&copy)
            && existing != disk
        {
            return Err(LayoutConflict::CopyOnTwoDisks {
                copy,
                existing: existing.clone(),
                other: disk.to_string(),
            });
        }

        self.disks.insert(disk.to_string(), copy);
        self.copies.insert(copy, disk.to_string());
        if copy == 1 {
            self.copy1_partitions += 1;
        }
        Ok(())
    }

    /// Number of distinct copies seen.
    pub fn copy_count(&self) -> usize {
        self.copies.len()
    }

    pub fn is_mirrored(&self) -> bool {
        self.copy_count() > 1
    }

    pub fn copy1_partitions(&self) -> u64 {
        self.copy1_partitions
    }

    /// The disk holding copy `copy`, if any.
    pub fn disk_for(&self, copy: u32) -> Option<&str> {
        self.copies.get(&copy).map(String::as_str)
    }

    /// Disks holding copies 2 and above, in copy order.
    ///
    /// These are the targets for re-mirroring after the alternate copy.
    pub fn mirror_disks(&self) -> Vec<&str> {
        self.copies
            .range(2..)
            .map(|(_, disk)| disk.as_str())
            .collect()
    }
}
