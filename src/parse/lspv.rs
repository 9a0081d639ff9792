//! `lspv` and `ioscli lspv -free` listings.

use crate::model::DiskCandidate;

/// One row of plain `lspv`: `hdisk1  00f6...  altinst_rootvg  active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvRow {
    pub disk: String,
    pub pvid: String,
    pub vg: String,
    pub active: bool,
}

/// Parses one `lspv` row; `None` for short lines.
pub fn parse_pv_row(line: &str) -> Option<PvRow> {
    let mut fields = line.split_whitespace();
    let disk = fields.next()?.to_string();
    let pvid = fields.next()?.to_string();
    let vg = fields.next()?.to_string();
    let active = fields.next().is_some_and(|s| s == "active");
    Some(PvRow {
        disk,
        pvid,
        vg,
        active,
    })
}

/// Parses `ioscli lspv -free` rows: `NAME  PVID  SIZE(megabytes)`.
///
/// The header and rows with a non-numeric size are skipped.
pub fn parse_free_disks<S: AsRef<str>>(lines: &[S]) -> Vec<DiskCandidate> {
    lines
        .iter()
        .filter_map(|line| {
            let mut fields = line.as_ref().split_whitespace();
            let name = fields.next()?;
            let pvid = fields.next()?;
            let size_mb = fields.next()?.parse().ok()?;
            Some(DiskCandidate {
                name: name.to_string(),
                pvid: pvid.to_string(),
                size_mb,
            })
        })
        .collect()
}
