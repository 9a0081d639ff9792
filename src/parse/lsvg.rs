//! `lsvg <vg>` sizes and `lsvg -M <vg>` partition maps.

use std::sync::LazyLock;

use regex::Regex;

static TOTAL_PPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TOTAL PPs:\s+\d+\s+\((\d+)\s+megabytes\)").expect("valid regex")
});

static USED_PPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"USED PPs:\s+\d+\s+\((\d+)\s+megabytes\)").expect("valid regex")
});

static PP_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PP SIZE:\s+(\d+)\s+megabyte\(s\)").expect("valid regex"));

// hdisk8:257      hd10opt:1:2
static MIRRORED_PP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+):\d+\s+\S+:\d+:(\d+)$").expect("valid regex"));

// hdisk8:258      hd10opt:2
static PLAIN_PP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+):\d+\s+\S+:\d+$").expect("valid regex"));

/// Sizes from `lsvg <vg>`, in megabytes. Zero when a field is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VgSize {
    pub total_mb: u64,
    pub used_mb: u64,
    pub pp_size_mb: u64,
}

/// Parses the size fields of `lsvg <vg>`:
///
/// ```text
/// VG STATE:      active      PP SIZE:   512 megabyte(s)
/// VG PERMISSION: read/write  TOTAL PPs: 558 (285696 megabytes)
/// LVs:           14          USED PPs:   63 (32256 megabytes)
/// ```
pub fn parse_vg_size<S: AsRef<str>>(lines: &[S]) -> VgSize {
    let mut size = VgSize::default();
    for line in lines {
        let line = line.as_ref();
        if let Some(mb) = capture_u64(&TOTAL_PPS, line) {
            size.total_mb = mb;
        }
        if let Some(mb) = capture_u64(&USED_PPS, line) {
            size.used_mb = mb;
        }
        if let Some(mb) = capture_u64(&PP_SIZE, line) {
            size.pp_size_mb = mb;
        }
    }
    size
}

fn capture_u64(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line).and_then(|c| c[1].parse().ok())
}

/// One line of `lsvg -M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapLine {
    /// A physical partition holding copy `copy` of a logical partition.
    Partition { disk: String, copy: u32 },

    /// A stale partition: the copies are out of sync.
    Stale,

    /// Headers, free ranges (`hdisk4:512-639`) and anything else.
    Other,
}

/// Classifies one `lsvg -M` line. Unmirrored lines are copy 1.
pub fn parse_map_line(line: &str) -> MapLine {
    if line.split_whitespace().last() == Some("stale") {
        return MapLine::Stale;
    }
    let line = line.trim();
    if let Some(caps) = MIRRORED_PP.captures(line)
        && let Ok(copy) = caps[2].parse()
    {
        return MapLine::Partition {
            disk: caps[1].to_string(),
            copy,
        };
    }
    if let Some(caps) = PLAIN_PP.captures(line) {
        return MapLine::Partition {
            disk: caps[1].to_string(),
            copy: 1,
        };
    }
    MapLine::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vg_sizes() {
        let out = [
            "VOLUME GROUP:       rootvg                   VG IDENTIFIER:  00f6\u{2026}",
            "VG STATE:           active                   PP SIZE:        512 megabyte(s)",
            "VG PERMISSION:      read/write               TOTAL PPs:      558 (285696 megabytes)",
            "MAX LVs:            256                      FREE PPs:       495 (253440 megabytes)",
            "LVs:                14                       USED PPs:       63 (32256 megabytes)",
        ];
        let size = parse_vg_size(&out);

        assert_eq!(
            size,
            VgSize {
                total_mb: 285_696,
                used_mb: 32_256,
                pp_size_mb: 512,
            }
        );
    }

    #[test]
    fn missing_sizes_are_zero() {
        assert_eq!(parse_vg_size(&["0516-306 lsvg: Unable to find volume group"]), VgSize::default());
    }

    #[test]
    fn map_lines() {
        assert_eq!(
            parse_map_line("hdisk4:453      hd1:101"),
            MapLine::Partition { disk: "hdisk4".into(), copy: 1 }
        );
        assert_eq!(
            parse_map_line("hdisk8:257      hd10opt:1:2"),
            MapLine::Partition { disk: "hdisk8".into(), copy: 2 }
        );
        assert_eq!(parse_map_line("hdisk8:255      hd1:99:2        stale"), MapLine::Stale);
        assert_eq!(parse_map_line("hdisk4:512-639"), MapLine::Other);
        assert_eq!(parse_map_line("rootvg:"), MapLine::Other);
    }

    #[test]
    fn stale_is_the_trailing_status_only() {
        assert_eq!(
            parse_map_line("hdisk0:12       stalelv:3"),
            MapLine::Partition { disk: "hdisk0".into(), copy: 1 }
        );
        assert_eq!(
            parse_map_line("hdisk1:12       stalelv:3:2"),
            MapLine::Partition { disk: "hdisk1".into(), copy: 2 }
        );
    }
}
