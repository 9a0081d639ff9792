//! Core data model for vios-update.
//!
//! These types carry state between the workflow steps:
//! VIOS records and pairs, disk candidates, mirror layouts,
//! update requests, journal entries, and operation outcomes.

mod disk;
mod journal;
mod mirror;
mod outcome;
mod update;
mod vios;

pub use disk::DiskCandidate;
pub use journal::{JournalEntry, Level};
pub use mirror::{LayoutConflict, MirrorMap};
pub use outcome::Outcome;
pub use update::{UpdateMode, UpdateOptions, UpdatePhase};
pub use vios::{ClusterStatus, Management, PeerStatus, ViosPair, ViosRecord};
