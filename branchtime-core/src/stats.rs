use crate::types::{ActiveSession, TimeEntry};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Seconds per date, per branch, for one repository.
pub type BranchStats = BTreeMap<String, BTreeMap<NaiveDate, u64>>;

/// Distinct repository names, sorted.
pub fn repositories<'a>(entries: impl IntoIterator<Item = &'a TimeEntry>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.repository.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn stats_for_repository<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    repository: &str,
) -> BranchStats {
    let mut stats = BranchStats::new();

    for entry in entries {
        if entry.repository != repository {
            continue;
        }
        *stats
            .entry(entry.branch.clone())
            .or_default()
            .entry(entry.date)
            .or_insert(0) += entry.duration;
    }

    stats
}

/// Total seconds per repository.
pub fn repository_totals<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for entry in entries {
        *totals.entry(entry.repository.clone()).or_insert(0) += entry.duration;
    }
    totals
}

/// Status-bar text for the current session.
pub fn format_status(session: Option<&ActiveSession>, now_ms: i64) -> String {
    match session {
        Some(session) => {
            let elapsed = session.elapsed_ms(now_ms) / 1000;
            format!(
                "Active: {} ({}m {}s)",
                session.attribution,
                elapsed / 60,
                elapsed % 60
            )
        }
        None => "Inactive".to_string(),
    }
}
