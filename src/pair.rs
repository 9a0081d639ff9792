//! Pair validation.
//!
//! A pair is the unit of work: both members are validated together and a
//! pair with any bad member is dropped as a whole. Every member's journal
//! is reset here, once per run, before anything else is written to it.

use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use crate::journal::Journal;

/// Result of validating the proposed pairs, both lists in first-seen order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Validation {
    pub kept: Vec<[String; 2]>,
    pub suppressed: Vec<Vec<String>>,
}

/// Splits proposed pairs into kept and suppressed ones.
///
/// A member must be non-empty and known to the inventory, and the two
/// members must differ. A VIOS already
/// claimed by an earlier kept pair cannot be updated twice in one run, so
/// a second pair naming it is suppressed too.
pub fn validate_pairs(
    proposed: &[Vec<String>],
    known: &BTreeSet<String>,
    journal: Journal<'_>,
    run_id: Uuid,
) -> Validation {
    let mut out = Validation::default();
    let mut reset: HashSet<&str> = HashSet::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for pair in proposed {
        let label = pair.join(",");
        for name in pair.iter().filter(|n| !n.is_empty()) {
            if reset.insert(name) {
                journal.reset(name);
            }
            journal.info(name, format!("launching rolling update run {run_id} for pair [{label}]"));
        }

        let [first, second] = pair.as_slice() else {
            for name in pair {
                journal.warn(name, format!("pair [{label}] must have exactly two members, skipping it"));
            }
            suppress(&mut out, pair);
            continue;
        };

        let problems = [member_problem(first, known), member_problem(second, known)];
        if problems.iter().any(Option::is_some) {
            for (index, name) in [first, second].into_iter().enumerate() {
                let other = if index == 0 { second } else { first };
                match &problems[index] {
                    Some(problem) => journal.warn(name, format!("{problem}, pair [{label}] is skipped")),
                    None => journal.warn(
                        name,
                        format!("partner \"{other}\" failed validation, pair [{label}] is skipped"),
                    ),
                }
            }
            suppress(&mut out, pair);
            continue;
        }

        if first == second {
            journal.warn(first, format!("pair [{label}] names the same VIOS twice, skipping it"));
            suppress(&mut out, pair);
            continue;
        }

        if out.kept.iter().any(|k| same_members(k, first, second)) {
            continue;
        }
        if let Some(busy) = [first, second].into_iter().find(|n| claimed.contains(n.as_str())) {
            for name in [first, second] {
                journal.warn(
                    name,
                    format!("\"{busy}\" already belongs to another pair, pair [{label}] is skipped"),
                );
            }
            suppress(&mut out, pair);
            continue;
        }

        claimed.insert(first);
        claimed.insert(second);
        out.kept.push([first.clone(), second.clone()]);
    }

    out
}

fn member_problem(name: &str, known: &BTreeSet<String>) -> Option<String> {
    if name.is_empty() {
        Some("empty VIOS name".to_string())
    } else if !known.contains(name) {
        Some(format!("\"{name}\" is not a VIOS known to NIM"))
    } else {
        None
    }
}

fn same_members(kept: &[String; 2], a: &str, b: &str) -> bool {
    (kept[0] == a && kept[1] == b) || (kept[0] == b && kept[1] == a)
}

fn suppress(out: &mut Validation, pair: &[String]) {
    if !out.suppressed.iter().any(|s| s == pair) {
        out.suppressed.push(pair.to_vec());
    }
}
