//! Output formatting for CLI display.

use std::fmt::Write;

use crate::model::{JournalEntry, Level, Outcome};
use crate::orchestrate::{PairReport, RunReport, ViosReport};

/// Format a journal entry as one line.
pub(super) fn format_journal_entry(entry: &JournalEntry) -> String {
    let level = match entry.level {
        Level::Info => "INFO ",
        Level::Warn => "WARN ",
        Level::Error => "ERROR",
    };
    format!("{}  {level}  {}", entry.recorded_at, entry.message)
}

fn format_vios(report: &ViosReport) -> String {
    let mut line = match report.outcome {
        Outcome::Success => format!("{}: ok ({})", report.vios, report.phase),
        outcome => format!("{}: {outcome} during {}", report.vios, report.phase),
    };
    for error in &report.errors {
        let _ = write!(line, "\n      {error}");
    }
    line
}

fn format_pair(report: &PairReport) -> String {
    let status = if report.abandoned { "abandoned" } else { "done" };
    let mut out = format!("{} [{status}]", report.pair);
    for member in &report.members {
        let _ = write!(out, "\n    {}", format_vios(member));
    }
    out
}

/// Format the summary of a whole run.
pub(super) fn format_run_report(report: &RunReport) -> String {
    let mut out = format!("Run {}\n", report.run_id);
    for pair in &report.pairs {
        let _ = writeln!(out, "  {}", format_pair(pair));
    }
    for pair in &report.suppressed {
        let _ = writeln!(out, "  [{}] [suppressed]", pair.join(","));
    }
    if report.cancelled {
        out.push_str("  cancelled before every pair finished\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use uuid::Uuid;

    use crate::orchestrate::Phase;

    fn vios(name: &str, phase: Phase, outcome: Outcome, errors: &[&str]) -> ViosReport {
        ViosReport {
            vios: name.to_string(),
            phase,
            outcome,
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn format_journal_levels() {
        let entry = JournalEntry {
            vios: "vios1".to_string(),
            level: Level::Warn,
            message: "rootvg is mirrored on hdisk0, hdisk1".to_string(),
            recorded_at: Timestamp::UNIX_EPOCH,
        };
        assert_eq!(
            format_journal_entry(&entry),
            "1970-01-01T00:00:00Z  WARN   rootvg is mirrored on hdisk0, hdisk1"
        );
    }

    #[test]
    fn format_completed_pair() {
        let pair = PairReport {
            pair: "vios1-vios2".to_string(),
            members: [
                vios("vios1", Phase::Done, Outcome::Success, &[]),
                vios("vios2", Phase::Done, Outcome::Success, &[]),
            ],
            abandoned: false,
        };
        assert_eq!(
            format_pair(&pair),
            "vios1-vios2 [done]\n    vios1: ok (done)\n    vios2: ok (done)"
        );
    }

    #[test]
    fn format_abandoned_pair_lists_errors() {
        let pair = PairReport {
            pair: "vios1-vios2".to_string(),
            members: [
                vios(
                    "vios1",
                    Phase::Copy,
                    Outcome::TimedOut,
                    &["vios1: alternate disk copy shows no progress"],
                ),
                vios("vios2", Phase::Ssp, Outcome::Failure, &["skipped: vios1 could not be copied"]),
            ],
            abandoned: true,
        };
        let text = format_pair(&pair);

        assert!(text.starts_with("vios1-vios2 [abandoned]"));
        assert!(text.contains(
            "vios1: timed out (manual intervention required) during alternate disk copy\n      vios1: alternate disk copy shows no progress"
        ));
        assert!(text.contains("vios2: failure during SSP check"));
    }

    #[test]
    fn format_run_with_suppressed_pairs() {
        let report = RunReport {
            run_id: Uuid::nil(),
            pairs: Vec::new(),
            suppressed: vec![vec!["vios1".to_string(), "ghost".to_string()]],
            cancelled: false,
        };
        assert_eq!(
            format_run_report(&report),
            "Run 00000000-0000-0000-0000-000000000000\n  [vios1,ghost] [suppressed]\n"
        );
    }

    #[test]
    fn format_cancelled_run_keeps_finished_pairs() {
        let report = RunReport {
            run_id: Uuid::nil(),
            pairs: vec![PairReport {
                pair: "vios1-vios2".to_string(),
                members: [
                    vios("vios1", Phase::Done, Outcome::Success, &[]),
                    vios("vios2", Phase::Update, Outcome::Failure, &["skipped: cancelled"]),
                ],
                abandoned: true,
            }],
            suppressed: Vec::new(),
            cancelled: true,
        };
        let text = format_run_report(&report);

        assert!(text.contains("vios1: ok (done)"));
        assert!(text.contains("vios2: failure during update\n      skipped: cancelled"));
        assert!(text.ends_with("  cancelled before every pair finished\n"));
    }
}
