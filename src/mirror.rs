//! Rootvg mirror analysis.
//!
//! Before the alternate disk copy, rootvg is unmirrored and afterwards it
//! is mirrored again onto the same disks, so the layout must be known and
//! clean: no stale partition, one disk per copy.

use tracing::debug;

use crate::error::{Error, Result};
use crate::exec::RemoteExecutor;
use crate::journal::Journal;
use crate::model::MirrorMap;
use crate::parse::lsvg::{MapLine, parse_map_line};

const LIST_MAP: &str = "/usr/sbin/lsvg -M rootvg";

/// Reads the rootvg partition map of `vios`.
///
/// The returned map tells whether rootvg is mirrored, on which disks, and
/// how many partitions copy 1 holds.
pub fn analyze_rootvg(exec: &dyn RemoteExecutor, journal: Journal<'_>, vios: &str) -> Result<MirrorMap> {
    let out = exec.execute(vios, LIST_MAP)?;
    if !out.success {
        let reason = format!("[{LIST_MAP}] failed: {}", out.stderr.join(" "));
        journal.error(vios, &reason);
        return Err(Error::MirrorLayoutInconsistent {
            vios: vios.to_string(),
            reason,
        });
    }

    let mut map = MirrorMap::default();
    for line in &out.stdout {
        let conflict = match parse_map_line(line) {
            MapLine::Other => continue,
            MapLine::Stale => format!("stale partition: {}", line.trim()),
            MapLine::Partition { disk, copy } => match map.record(&disk, copy) {
                Ok(()) => continue,
                Err(e) => e.to_string(),
            },
        };
        journal.error(vios, format!("rootvg cannot be copied safely: {conflict}"));
        return Err(Error::MirrorLayoutInconsistent {
            vios: vios.to_string(),
            reason: conflict,
        });
    }

    debug!(vios, copies = map.copy_count(), partitions = map.copy1_partitions(), "rootvg layout");
    if map.is_mirrored() {
        let disks: Vec<&str> = map.disk_for(1).into_iter().chain(map.mirror_disks()).collect();
        journal.info(vios, format!("rootvg is mirrored on {}", disks.join(", ")));
    } else {
        journal.info(vios, "rootvg is not mirrored");
    }
    Ok(map)
}
