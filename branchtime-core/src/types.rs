use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the file paths remembered for a single session.
pub const MAX_SESSION_FILES: usize = 50;

/// The (repository, branch) pair a span of time is credited to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribution {
    pub repository: String,
    pub branch: String,
}

impl Attribution {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.branch)
    }
}

/// A completed, immutable record of work on one branch.
///
/// `duration` is always `floor((end_time - start_time) / 1000)` and
/// `end_time >= start_time`; [`TimeEntry::new`] is the only constructor that
/// upholds this, deserialized entries are taken as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub date: NaiveDate,
    pub repository: String,
    pub branch: String,
    pub duration: u64,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl TimeEntry {
    /// Build an entry for the span `[start_ms, end_ms]`. An end earlier than
    /// the start (clock skew) is clamped to the start.
    pub fn new(attribution: &Attribution, start_ms: i64, end_ms: i64, files: Vec<String>) -> Self {
        let end_ms = end_ms.max(start_ms);
        let duration = ((end_ms - start_ms) / 1000) as u64;

        Self {
            date: local_date(start_ms),
            repository: attribution.repository.clone(),
            branch: attribution.branch.clone(),
            duration,
            start_time: start_ms,
            end_time: end_ms,
            files,
        }
    }

    pub fn attribution(&self) -> Attribution {
        Attribution::new(self.repository.clone(), self.branch.clone())
    }
}

/// Calendar date of an epoch-millisecond timestamp in the local time zone.
pub fn local_date(epoch_ms: i64) -> NaiveDate {
    match Local.timestamp_millis_opt(epoch_ms).single() {
        Some(local) => local.date_naive(),
        None => DateTime::<Utc>::from_timestamp_millis(epoch_ms)
            .unwrap_or_default()
            .date_naive(),
    }
}

/// The session currently accumulating time. At most one exists at a time
/// and only the tracker mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub attribution: Attribution,
    pub start_time: i64,
    pub last_activity: i64,
    pub files: Vec<String>,
}

impl ActiveSession {
    pub fn new(attribution: Attribution, now_ms: i64) -> Self {
        Self {
            attribution,
            start_time: now_ms,
            last_activity: now_ms,
            files: Vec::new(),
        }
    }

    /// Record activity under the current attribution. Time never moves
    /// backwards for `last_activity`.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_activity = self.last_activity.max(now_ms);
    }

    pub fn record_file(&mut self, file: Option<String>) {
        let Some(file) = file else {
            return;
        };
        if self.files.len() >= MAX_SESSION_FILES || self.files.contains(&file) {
            return;
        }
        self.files.push(file);
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.start_time).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_floor_of_span() {
        let attribution = Attribution::new("app", "main");
        let entry = TimeEntry::new(&attribution, 1_000, 7_999, Vec::new());

        assert_eq!(entry.duration, 6);
        assert_eq!(entry.start_time, 1_000);
        assert_eq!(entry.end_time, 7_999);
        assert_eq!(entry.date, local_date(1_000));
    }

    #[test]
    fn negative_span_is_clamped() {
        let attribution = Attribution::new("app", "main");
        let entry = TimeEntry::new(&attribution, 10_000, 4_000, Vec::new());

        assert_eq!(entry.duration, 0);
        assert_eq!(entry.end_time, 10_000);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let attribution = Attribution::new("app", "feature/login");
        let entry = TimeEntry::new(&attribution, 0, 40_000, Vec::new());
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["repository"], "app");
        assert_eq!(json["branch"], "feature/login");
        assert_eq!(json["duration"], 40);
        assert_eq!(json["startTime"], 0);
        assert_eq!(json["endTime"], 40_000);
        assert!(json["date"].as_str().unwrap().len() == 10);
        assert!(json.get("files").is_none(), "empty file list is omitted");
    }

    #[test]
    fn deserializes_entries_without_files() {
        let raw = r#"{"date":"2024-03-05","repository":"app","branch":"main",
            "duration":12,"startTime":1000,"endTime":13000}"#;
        let entry: TimeEntry = serde_json::from_str(raw).unwrap();

        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert!(entry.files.is_empty());
        assert_eq!(entry.attribution(), Attribution::new("app", "main"));
    }

    #[test]
    fn session_file_list_is_distinct_and_bounded() {
        let mut session = ActiveSession::new(Attribution::new("app", "main"), 0);
        session.record_file(Some("a.rs".to_string()));
        session.record_file(Some("a.rs".to_string()));
        session.record_file(None);
        assert_eq!(session.files, vec!["a.rs".to_string()]);

        for i in 0..(MAX_SESSION_FILES * 2) {
            session.record_file(Some(format!("f{}.rs", i)));
        }
        assert_eq!(session.files.len(), MAX_SESSION_FILES);
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut session = ActiveSession::new(Attribution::new("app", "main"), 5_000);
        session.touch(9_000);
        session.touch(7_000);
        assert_eq!(session.last_activity, 9_000);
        assert_eq!(session.elapsed_ms(12_000), 7_000);
        assert_eq!(session.elapsed_ms(1_000), 0);
    }
}
