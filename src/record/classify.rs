//! Classification heuristics over a [`LogRecord`]: system-vs-user origin,
//! lock-relatedness, and best-effort SQL command tag.
//!
//! The predicates are layered rule tables evaluated in a fixed order.
//! The order is an invariant, not an implementation detail: a later rule
//! is only reachable when every earlier rule abstained.

use std::sync::LazyLock;

use regex::Regex;

use super::LogRecord;

/// One classification matcher over a message.
#[derive(Debug)]
enum Matcher {
    Prefix(&'static str),
    Contains(&'static str),
}

impl Matcher {
    fn matches(&self, message: &str) -> bool {
        match self {
            Matcher::Prefix(p) => message.starts_with(p),
            Matcher::Contains(s) => message.contains(s),
        }
    }
}

/// Ordered table of message patterns emitted by the server's own machinery
/// (startup/shutdown, recovery, autovacuum, transaction-ID housekeeping).
const SYSTEM_MESSAGE_RULES: &[Matcher] = &[
    Matcher::Prefix("starting "),
    Matcher::Prefix("listening on "),
    Matcher::Prefix("database system"),
    Matcher::Prefix("autovacuum: "),
    Matcher::Prefix("automatic vacuum of table"),
    Matcher::Prefix("automatic analyze of table"),
    Matcher::Prefix("received "),
    Matcher::Prefix("shutting down"),
    Matcher::Prefix("aborting any active transactions"),
    Matcher::Prefix("redo "),
    Matcher::Prefix("restartpoint"),
    Matcher::Prefix("recovery "),
    Matcher::Prefix("background worker"),
    Matcher::Contains("XID"),
    Matcher::Contains("wraparound"),
];

/// Ordered table of LOG-severity message patterns produced by user-session
/// activity. Unmatched LOG entries default to system (routine narration).
const LOG_USER_ACTIVITY_RULES: &[Matcher] = &[
    Matcher::Prefix("statement: "),
    Matcher::Prefix("duration: "),
    Matcher::Prefix("connection received: "),
    Matcher::Prefix("connection authorized"),
    Matcher::Prefix("disconnection"),
    Matcher::Prefix("AUDIT: "),
];

/// FATAL messages that are user-triggered rather than server faults.
const FATAL_USER_TRIGGERED: &[Matcher] = &[
    Matcher::Contains("password authentication failed"),
    Matcher::Contains("no pg_hba.conf entry"),
    Matcher::Contains("is not permitted to log in"),
    Matcher::Prefix("connection to client lost"),
];

/// `user@database` in the line prefix, right after the `[pid]` bracket.
static RE_USER_AT_DATABASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]:?\s+\S+@\S+").unwrap());

/// Lock acquisition / wait narration from a user backend.
static RE_PROCESS_LOCK_ACTIVITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^process \d+ (?:acquired|still waiting)").unwrap());

/// Lock-related message vocabulary.
const LOCK_PATTERNS: &[&str] = &[
    "deadlock",
    "still waiting for",
    "blocked by process",
    "wait queue",
    "could not serialize access",
    "canceling statement due to lock timeout",
    "semop",
];

static RE_ACQUIRED_LOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"process \d+ acquired \w+Lock").unwrap());

/// `statement: SELECT ...`
static RE_STATEMENT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)statement:\s+([A-Za-z]+)").unwrap());

/// `execute <unnamed>: SELECT ...` / `execute P_1: UPDATE ...`
static RE_EXECUTE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)execute [^:]+:\s+([A-Za-z]+)").unwrap());

/// auto_explain plans carry the statement on a `Query Text:` line.
static RE_QUERY_TEXT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Query Text:\s+([A-Za-z]+)").unwrap());

impl LogRecord {
    /// Does this entry come from PostgreSQL's own background machinery
    /// rather than a user session?
    ///
    /// CSV source has a direct signal: background processes log with an
    /// empty user name (with one override for "connection ..." messages,
    /// which are session-side even before authentication fills in a user).
    ///
    /// Plain text applies layered heuristics in a load-bearing order:
    /// PANIC, FATAL minus user-triggered exclusions, the checkpointer
    /// toggle (which decides, not abstains), the system rule table, a
    /// `user@database` prefix scan, and for LOG the user-activity table
    /// with a default-system fallback.
    pub fn is_system_entry(&self, include_checkpointer: bool) -> bool {
        if let Some(csv) = &self.csv {
            return csv.user_name.is_empty() && !csv.message.starts_with("connection ");
        }

        let msg = self.message.as_str();

        if self.severity == "PANIC" {
            return true;
        }
        if self.severity == "FATAL" {
            return !FATAL_USER_TRIGGERED.iter().any(|m| m.matches(msg));
        }
        if msg.starts_with("checkpoint") {
            return include_checkpointer;
        }
        if SYSTEM_MESSAGE_RULES.iter().any(|m| m.matches(msg)) {
            return true;
        }
        if self.lines.iter().any(|l| RE_USER_AT_DATABASE.is_match(l)) {
            return false;
        }
        if self.severity == "LOG" {
            if LOG_USER_ACTIVITY_RULES.iter().any(|m| m.matches(msg))
                || RE_PROCESS_LOCK_ACTIVITY.is_match(msg)
            {
                return false;
            }
            return true;
        }
        false
    }

    /// Is the message about locking (deadlocks, lock waits, serialization
    /// failures, semaphore waits)?
    pub fn is_locking_related(&self) -> bool {
        let msg = self.message.as_str();
        LOCK_PATTERNS.iter().any(|p| msg.contains(p)) || RE_ACQUIRED_LOCK.is_match(msg)
    }

    /// Best-effort SQL command tag (SELECT/UPDATE/...), not a SQL parse.
    ///
    /// CSV rows carry the tag directly. Plain text is probed in priority
    /// order: `statement:`, `execute <name>:`, then the multi-line
    /// `Query Text:` form used by auto_explain plans.
    pub fn command_tag(&self) -> Option<String> {
        if let Some(csv) = &self.csv
            && !csv.command_tag.is_empty()
        {
            return Some(csv.command_tag.clone());
        }

        for re in [&RE_STATEMENT_TAG, &RE_EXECUTE_TAG] {
            if let Some(caps) = re.captures(&self.message) {
                return Some(caps[1].to_uppercase());
            }
        }

        for line in &self.lines {
            if let Some(caps) = RE_QUERY_TEXT_TAG.captures(line) {
                return Some(caps[1].to_uppercase());
            }
        }

        None
    }
}
