//! The structured log record flowing through the pipeline, plus the
//! severity vocabulary and rank table.

pub mod classify;
pub mod csv;

use chrono::{DateTime, Utc};

pub use csv::CsvRecord;

use crate::util::parse_log_time;

/// Severity rank table, least to most severe.
///
/// LOG and INFO share rank 5, deliberately below NOTICE: routine
/// statement/duration logging would otherwise flood default output.
pub const SEVERITY_RANKS: &[(&str, u8)] = &[
    ("DEBUG5", 0),
    ("DEBUG4", 1),
    ("DEBUG3", 2),
    ("DEBUG2", 3),
    ("DEBUG1", 4),
    ("LOG", 5),
    ("INFO", 5),
    ("NOTICE", 6),
    ("WARNING", 7),
    ("ERROR", 8),
    ("FATAL", 9),
    ("PANIC", 10),
];

/// Rank of a severity level that is not in the table (and of LOG/INFO).
/// Unknown input is LOG-equivalent, not a parse error.
pub const DEFAULT_SEVERITY_RANK: u8 = 5;

/// Rank for a severity name, case-insensitive.
///
/// Unknown names (including the auxiliary markers STATEMENT / DETAIL /
/// HINT / CONTEXT that share the severity position in log lines) map to
/// [`DEFAULT_SEVERITY_RANK`].
pub fn severity_rank(severity: &str) -> u8 {
    let upper = severity.to_ascii_uppercase();
    SEVERITY_RANKS
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, rank)| *rank)
        .unwrap_or(DEFAULT_SEVERITY_RANK)
}

/// True when the name is one of the ranked severity levels (as opposed to
/// an auxiliary marker like STATEMENT). Event counters only count these.
pub fn is_ranked_severity(severity: &str) -> bool {
    SEVERITY_RANKS.iter().any(|(name, _)| *name == severity)
}

/// One complete log entry, possibly assembled from multiple raw lines.
///
/// Exactly one of `lines` (plain-text source, non-empty) or `csv` (CSV
/// source) is populated. An empty `severity` marks a continuation that
/// belongs to the previous entry and must never reach an aggregator.
#[derive(Debug, Clone, Default)]
pub struct LogRecord {
    /// Timestamp as captured from the line; converted lazily via [`Self::time`].
    pub log_time: String,
    /// Severity marker as captured (may be an auxiliary marker like STATEMENT).
    pub severity: String,
    /// Message body after the severity marker.
    pub message: String,
    /// Verbatim assembled lines (plain-text source only).
    pub lines: Vec<String>,
    /// Full typed column access (CSV source only).
    pub csv: Option<CsvRecord>,
}

impl LogRecord {
    /// Build a record from a decoded CSV row.
    pub fn from_csv(csv: CsvRecord) -> Self {
        Self {
            log_time: csv.log_time.clone(),
            severity: csv.error_severity.clone(),
            message: csv.message.clone(),
            lines: Vec::new(),
            csv: Some(csv),
        }
    }

    /// Absolute time of the entry; `None` when the captured string could
    /// not be normalized.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        parse_log_time(&self.log_time)
    }

    /// Rank of this record's severity (unknown => LOG-equivalent).
    pub fn severity_rank(&self) -> u8 {
        severity_rank(&self.severity)
    }

    /// The raw entry joined for matching or display.
    pub fn raw_text(&self) -> String {
        match &self.csv {
            Some(csv) => csv.to_csv_line(),
            None => self.lines.join("\n"),
        }
    }
}
