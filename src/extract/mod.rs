//! Named-capture field extraction for plain-text log entries.
//!
//! The default pattern covers the stock `log_line_prefix` family,
//! syslog-wrapped lines, and bare-epoch (`%n`) prefixes. Operators whose
//! prefix differs can supply their own pattern, as long as it defines the
//! same three named groups; that is validated once at startup, never in
//! the per-record hot path.

pub mod message;

use std::sync::LazyLock;

use regex::Regex;

use crate::record::LogRecord;

/// Default extraction pattern. Named groups: `log_time`, `error_severity`,
/// `message`. The leading optional group swallows a syslog wrapper
/// (`May 30 11:03:43 host postgres[693826]: [5-1] `).
pub const DEFAULT_PATTERN: &str = r"(?s)^(?P<syslog>[A-Za-z]{3} [0-9]{1,2} [0-9:]{6,} .*?: \[[0-9\-]+\] )?(?P<log_time>[\d\-:\. ]{19,23} [A-Z0-9\-\+]{2,5}|[0-9\.]{14})[\s:\-].*?[\s:\-]?(?P<error_severity>[A-Z12345]{3,12}):\s*(?P<message>(?s:.*))$";

/// Named groups an extraction pattern must define.
pub const REQUIRED_GROUPS: [&str; 3] = ["log_time", "error_severity", "message"];

/// Severity captures must look like a log level (or an auxiliary marker
/// such as STATEMENT), not arbitrary colon-delimited text.
static RE_SEVERITY_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z12345]{3,12}$").unwrap());

/// Extraction failure modes.
#[derive(Debug)]
pub enum ExtractError {
    /// The supplied pattern does not compile.
    InvalidPattern { pattern: String, source: regex::Error },
    /// The supplied pattern compiles but lacks required named groups.
    MissingGroups { missing: Vec<&'static str> },
    /// An assembled entry did not match the pattern.
    NoMatch { text: String },
    /// The severity capture is not a plausible log level.
    InvalidSeverity { severity: String },
    /// An empty line group was handed in.
    EmptyEntry,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::InvalidPattern { pattern, source } => {
                write!(f, "invalid extraction pattern '{}': {}", pattern, source)
            }
            ExtractError::MissingGroups { missing } => write!(
                f,
                "extraction pattern must define named groups {:?}; missing: {}",
                REQUIRED_GROUPS,
                missing.join(", ")
            ),
            ExtractError::NoMatch { text } => {
                write!(f, "log entry did not match the extraction pattern: {}", text)
            }
            ExtractError::InvalidSeverity { severity } => {
                write!(f, "invalid log level: {}", severity)
            }
            ExtractError::EmptyEntry => write!(f, "empty log entry"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::InvalidPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Compiled extractor with the named-group -> field mapping resolved once.
///
/// Resolving group indices at construction removes the per-record
/// name-lookup cost a map of matches would imply.
#[derive(Debug)]
pub struct Extractor {
    regex: Regex,
    time_idx: usize,
    severity_idx: usize,
    message_idx: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_pattern(DEFAULT_PATTERN).expect("default pattern is valid")
    }
}

impl Extractor {
    /// Compile an operator-supplied pattern, failing fast when it does not
    /// compile or does not define all of [`REQUIRED_GROUPS`].
    pub fn with_pattern(pattern: &str) -> Result<Self, ExtractError> {
        let regex = Regex::new(pattern).map_err(|source| ExtractError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let index_of = |group: &str| {
            regex
                .capture_names()
                .position(|name| name == Some(group))
        };

        let mut missing = Vec::new();
        let time_idx = index_of("log_time");
        let severity_idx = index_of("error_severity");
        let message_idx = index_of("message");
        for (name, idx) in REQUIRED_GROUPS.iter().zip([time_idx, severity_idx, message_idx]) {
            if idx.is_none() {
                missing.push(*name);
            }
        }
        if !missing.is_empty() {
            return Err(ExtractError::MissingGroups { missing });
        }

        Ok(Self {
            regex,
            time_idx: time_idx.unwrap(),
            severity_idx: severity_idx.unwrap(),
            message_idx: message_idx.unwrap(),
        })
    }

    /// Extract a structured record from an assembled line group.
    ///
    /// A no-match is reported to the caller, not silently dropped — the
    /// caller decides whether to skip the record or abort.
    pub fn extract(&self, lines: &[String]) -> Result<LogRecord, ExtractError> {
        if lines.is_empty() {
            return Err(ExtractError::EmptyEntry);
        }
        let text = lines.join("\n");
        let caps = self.regex.captures(&text).ok_or_else(|| ExtractError::NoMatch {
            text: text.clone(),
        })?;

        let group = |idx: usize| caps.get(idx).map(|m| m.as_str()).unwrap_or("");

        let severity = group(self.severity_idx);
        if !RE_SEVERITY_SHAPE.is_match(severity) {
            return Err(ExtractError::InvalidSeverity {
                severity: severity.to_string(),
            });
        }

        Ok(LogRecord {
            log_time: group(self.time_idx).to_string(),
            severity: severity.to_string(),
            message: group(self.message_idx).to_string(),
            lines: lines.to_vec(),
            csv: None,
        })
    }
}
