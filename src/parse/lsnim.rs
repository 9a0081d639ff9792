//! `lsnim` listings: object names, attribute dumps and colon-separated status.

use std::collections::BTreeMap;

/// `Cstate` value of a NIM client with no operation in flight.
pub const READY: &str = "ready for a nim operation";

/// Parses `lsnim -t <type>` rows (`vios1  management  vios`) into names.
pub fn parse_object_names<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.as_ref().split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Parses `lsnim -l <object>` attribute lines (`key = value`).
///
/// The object header (`vios1:`) and lines without `=` are ignored. A
/// repeated key keeps its last value.
pub fn parse_attributes<S: AsRef<str>>(lines: &[S]) -> BTreeMap<String, String> {
    lines
        .iter()
        .filter_map(|l| {
            let (key, value) = l.as_ref().split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// One client's state from `lsnim -Z -a Cstate -a info -a Cstate_result`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NimStatus {
    pub cstate: String,
    pub info: String,

    /// `success` or `failure`, lowercased; empty when not reported.
    pub result: String,
}

impl NimStatus {
    /// The client has no operation in flight.
    pub fn is_ready(&self) -> bool {
        self.cstate.eq_ignore_ascii_case(READY)
    }

    pub fn succeeded(&self) -> bool {
        self.result == "success"
    }
}

/// Parses the `-Z` output:
///
/// ```text
/// #name:Cstate:info:Cstate_result:
/// vios1:ready for a NIM operation:success:
/// vios1:alt_disk_install operation is being performed:Creating logical volume alt_hd2.:success:
/// ```
///
/// `info` is optional and may itself contain colons. Returns `None` when no
/// data row is present.
pub fn parse_nim_status<S: AsRef<str>>(lines: &[S]) -> Option<NimStatus> {
    let line = lines
        .iter()
        .map(|l| l.as_ref().trim())
        .find(|l| !l.is_empty() && !l.starts_with('#'))?;

    let mut fields: Vec<&str> = line.split(':').collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    if fields.len() < 2 {
        return None;
    }

    let cstate = fields[1].to_string();
    let (info, result) = match fields.len() {
        2 => (String::new(), String::new()),
        3 => {
            let last = fields[2].to_ascii_lowercase();
            if last == "success" || last == "failure" {
                (String::new(), last)
            } else {
                (fields[2].to_string(), String::new())
            }
        }
        n => (fields[2..n - 1].join(":"), fields[n - 1].to_ascii_lowercase()),
    };

    Some(NimStatus {
        cstate,
        info,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "#name:Cstate:info:Cstate_result:";

    #[test]
    fn ready_without_info() {
        let status = parse_nim_status(&[HEADER, "vios1:ready for a NIM operation:success:"]).unwrap();

        assert!(status.is_ready());
        assert!(status.succeeded());
        assert_eq!(status.info, "");
    }

    #[test]
    fn in_progress_with_info() {
        let status = parse_nim_status(&[
            HEADER,
            "vios1:alt_disk_install operation is being performed:Creating logical volume alt_hd2.:success:",
        ])
        .unwrap();

        assert!(!status.is_ready());
        assert_eq!(status.info, "Creating logical volume alt_hd2.");
    }

    #[test]
    fn info_may_contain_colons() {
        let status = parse_nim_status(&[
            "vios1:ready for a NIM operation:0505-126 alt_disk_install: target disk hdisk2 has a volume group assigned to it.:failure:",
        ])
        .unwrap();

        assert!(status.is_ready());
        assert!(!status.succeeded());
        assert_eq!(
            status.info,
            "0505-126 alt_disk_install: target disk hdisk2 has a volume group assigned to it."
        );
    }

    #[test]
    fn header_only_is_none() {
        assert!(parse_nim_status(&[HEADER]).is_none());
        assert!(parse_nim_status::<&str>(&[]).is_none());
    }

    #[test]
    fn attributes_and_names() {
        let attrs = parse_attributes(&[
            "vios1:",
            "   class          = management",
            "   mgmt_profile1  = hmc1 3 cec1",
            "   Cstate         = ready for a NIM operation",
        ]);
        assert_eq!(attrs["mgmt_profile1"], "hmc1 3 cec1");
        assert_eq!(attrs.len(), 3);

        let names = parse_object_names(&["vios1   management   vios", "", "vios2   management   vios"]);
        assert_eq!(names, ["vios1", "vios2"]);
    }
}
