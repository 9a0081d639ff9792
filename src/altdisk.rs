//! Alternate rootvg copy: choosing the target disk, then running the copy.
//!
//! The copy is the rollback point of the update. It is taken with NIM
//! `alt_disk_install` onto a free disk, after rootvg has been unmirrored so
//! the copy is a single clean image.

mod copy;
mod select;

pub use copy::{AltDiskCopy, CopyState};
pub use select::{AltinstPolicy, DiskSelector, SelectRequest, Selection, choose_disk};

/// Volume group left behind by a previous `alt_disk_install`.
pub const ALTINST_ROOTVG: &str = "altinst_rootvg";

/// Volume group holding the previous rootvg after booting an alternate copy.
pub const OLD_ROOTVG: &str = "old_rootvg";
