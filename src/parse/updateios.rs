//! Captured `nim -o updateios` output.
//!
//! The log is free text. Success is read from two markers: the commit pass
//! says there is nothing to commit, and the install summary reports no
//! filesets left to install.

use std::sync::LazyLock;

use regex::Regex;

const NO_UNCOMMITTED: &str = "There are no uncommitted updates";

static NOTHING_TO_INSTALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+0\s+Total to be installed").expect("valid regex"));

/// Lines of every blank-line-delimited paragraph containing `needle`.
pub fn paragraphs_containing<'a>(text: &'a str, needle: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if paragraph.iter().any(|l| l.contains(needle)) {
                out.append(&mut paragraph);
            }
            paragraph.clear();
        } else {
            paragraph.push(line);
        }
    }
    out
}

pub fn no_uncommitted_updates(text: &str) -> bool {
    text.contains(NO_UNCOMMITTED)
}

/// Whether the `STATISTICS` paragraph reports zero filesets to install.
pub fn nothing_left_to_install(text: &str) -> bool {
    paragraphs_containing(text, "STATISTICS")
        .iter()
        .any(|l| NOTHING_TO_INSTALL.is_match(l))
}
