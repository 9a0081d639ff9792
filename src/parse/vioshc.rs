//! `vioshc.py` output: managed-system discovery and pass rate.
//!
//! Discovery (`-l a`) prints one section per managed system:
//!
//! ```text
//! 0d0fcb0a-9d6d-3f2b-a5c4-7e4e4a3a9f10  8284-22A*0221FD4
//!
//!     VIOS                                  Partition ID
//!     3f1e9c5b-27a1-4d1e-9d44-0c3b1a5e6f21  1
//!     7a2b1c4d-0e9f-4a8b-b7c6-d5e4f3a2b1c0  2
//!
//! ```
//!
//! A blank line after the VIOS rows closes both the VIOS list and the
//! managed-system section.

use std::sync::LazyLock;

use regex::Regex;

use super::is_diagnostic;

static MANAGED_SYSTEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w{8}-\w{4}-\w{4}-\w{4}-\w{12})\s+(\w{4}-\w{3}\*\w{7})").expect("valid regex")
});

static VIOS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^VIOS\s+Partition\sID$").expect("valid regex"));

static VIOS_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w{8}-\w{4}-\w{4}-\w{4}-\w{12})\s+(\w+)").expect("valid regex")
});

static PASS_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Pass rate of (\d+)%").expect("valid regex"));

/// One managed system (CEC) and the VIOS partitions listed under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSystem {
    pub cec_uuid: String,
    pub cec_serial: String,
    pub vios: Vec<ViosRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViosRow {
    pub vios_uuid: String,
    pub partition_id: String,
}

/// Parsed discovery output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub systems: Vec<ManagedSystem>,

    /// Diagnostic and unrecognized lines, to be logged as warnings.
    pub warnings: Vec<String>,
}

impl Discovery {
    /// The VIOS row for a partition on the CEC with the given serial.
    pub fn find(&self, cec_serial: &str, partition_id: &str) -> Option<(&ManagedSystem, &ViosRow)> {
        self.systems
            .iter()
            .filter(|ms| ms.cec_serial == cec_serial)
            .find_map(|ms| {
                ms.vios
                    .iter()
                    .find(|v| v.partition_id == partition_id)
                    .map(|v| (ms, v))
            })
    }
}

#[derive(Clone, Copy)]
enum Section {
    Outside,
    ManagedSystem,
    ViosList,
}

/// Parses `vioshc.py -l a` output.
pub fn parse_discovery<S: AsRef<str>>(lines: &[S]) -> Discovery {
    let mut discovery = Discovery::default();
    let mut section = Section::Outside;

    for raw in lines {
        let line = raw.as_ref().trim();
        if is_diagnostic(line) {
            discovery.warnings.push(line.to_string());
            continue;
        }

        // A managed-system header opens a new section wherever it appears,
        // so a CEC without a VIOS list never absorbs the next one's rows.
        if let Some(caps) = MANAGED_SYSTEM.captures(line) {
            discovery.systems.push(ManagedSystem {
                cec_uuid: caps[1].to_string(),
                cec_serial: caps[2].to_string(),
                vios: Vec::new(),
            });
            section = Section::ManagedSystem;
            continue;
        }

        match section {
            Section::Outside => {
                if !line.is_empty() {
                    discovery.warnings.push(line.to_string());
                }
            }
            Section::ManagedSystem => {
                if VIOS_HEADER.is_match(line) {
                    section = Section::ViosList;
                } else if !line.is_empty() {
                    discovery.warnings.push(line.to_string());
                }
            }
            Section::ViosList => {
                if line.is_empty() {
                    section = Section::Outside;
                } else if let Some(caps) = VIOS_ROW.captures(line)
                    && let Some(ms) = discovery.systems.last_mut()
                {
                    ms.vios.push(ViosRow {
                        vios_uuid: caps[1].to_string(),
                        partition_id: caps[2].to_string(),
                    });
                } else {
                    discovery.warnings.push(line.to_string());
                }
            }
        }
    }

    discovery
}

/// Extracts the first `Pass rate of NN%` figure.
pub fn parse_pass_rate<S: AsRef<str>>(lines: &[S]) -> Option<u32> {
    lines.iter().find_map(|l| {
        PASS_RATE
            .captures(l.as_ref())
            .and_then(|caps| caps[1].parse().ok())
    })
}
