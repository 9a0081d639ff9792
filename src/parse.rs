//! Line grammars for the text output of external tools.
//!
//! One submodule per tool. Parsers are pure functions over captured lines
//! so a change in a tool's output format stays out of the workflow code
//! and can be pinned down with fixture text.

pub mod cluster;
pub mod lsnim;
pub mod lspv;
pub mod lsvg;
pub mod updateios;
pub mod vioshc;

/// Whether a line carries a diagnostic token the tool failed to route to stderr.
pub fn is_diagnostic(line: &str) -> bool {
    line.contains("ERROR") || line.contains("WARN")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_detected() {
        assert!(is_diagnostic("ERROR: cannot reach HMC"));
        assert!(is_diagnostic("  WARNING: slow answer"));
        assert!(!is_diagnostic("Pass rate of 100%"));
    }
}
