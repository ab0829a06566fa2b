use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

pub const STUDENT_NAME: &str = "student_name";
pub const PARENT_EMAIL: &str = "parent_email";

/// One cleaned CSV row. Only constructed by the loader, which guarantees that
/// both required columns are present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    line: usize,
    student_name: String,
    parent_email: String,
    extra: BTreeMap<String, String>,
}

impl StudentRecord {
    pub(crate) fn new(
        line: usize,
        student_name: String,
        parent_email: String,
        extra: BTreeMap<String, String>,
    ) -> Self {
        Self {
            line,
            student_name,
            parent_email,
            extra,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn parent_email(&self) -> &str {
        &self.parent_email
    }

    /// Looks up any column, including the two required ones.
    #[cfg(test)]
    pub fn get(&self, column: &str) -> Option<&str> {
        match column {
            STUDENT_NAME => Some(&self.student_name),
            PARENT_EMAIL => Some(&self.parent_email),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingName,
    MissingEmail,
    MissingBoth,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::MissingName => "empty student_name",
            SkipReason::MissingEmail => "empty parent_email",
            SkipReason::MissingBoth => "empty student_name and parent_email",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentLoad {
    pub records: Vec<StudentRecord>,
    pub skipped: Vec<SkippedRow>,
    pub delimiter: char,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedPair {
    pub student: StudentRecord,
    pub report: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    pub matched: Vec<MatchedPair>,
    pub unmatched: Vec<StudentRecord>,
}

impl MatchReport {
    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn unmatched_names(&self) -> Vec<&str> {
        self.unmatched.iter().map(StudentRecord::student_name).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { recipient: String },
    Failed { recipient: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcomes: Vec<DispatchOutcome>,
    /// Number of records loaded from the CSV, not the number of attempted sends.
    pub total_records: usize,
}

impl DispatchSummary {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, DispatchOutcome::Sent { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            DispatchOutcome::Failed { recipient, reason } => {
                Some((recipient.as_str(), reason.as_str()))
            }
            DispatchOutcome::Sent { .. } => None,
        })
    }

    /// Count shown to the user as "failed": unmatched students are included.
    pub fn not_sent(&self) -> usize {
        self.total_records.saturating_sub(self.sent())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    Load(String),
    NoRecords,
    NoMatches { sample: Vec<String>, missing: usize },
    InvalidPort(i64),
    Session(String),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Load(reason) => write!(f, "student CSV unusable: {reason}"),
            AbortReason::NoRecords => f.write_str("no usable student rows"),
            AbortReason::NoMatches { sample, missing } => {
                write!(f, "no reports matched ({missing} missing, e.g. {})", sample.join(", "))
            }
            AbortReason::InvalidPort(port) => write!(f, "invalid SMTP port {port}"),
            AbortReason::Session(reason) => write!(f, "SMTP session failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Cancelled,
    Aborted(AbortReason),
    Completed {
        csv_path: PathBuf,
        reports_dir: PathBuf,
        load: StudentLoad,
        matches: MatchReport,
        summary: DispatchSummary,
    },
}
