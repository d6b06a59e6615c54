//! Connection accounting: attempts, authorized sessions, authentication
//! failures, and per-dimension breakdowns.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::extract::message::{connect_authorized_fields, connect_host};
use crate::record::LogRecord;

use super::truncate_to_bucket;

/// Fixed attempt-bucketing window, in seconds (10 minutes).
const CONNECT_WINDOW_SECS: i64 = 600;

/// FATAL messages counted as authentication failures.
const AUTH_FAILURE_PATTERNS: &[&str] = &[
    "password authentication failed",
    "no pg_hba.conf entry",
    "is not permitted to log in",
];

/// Streaming connection accounting.
#[derive(Debug, Default)]
pub struct ConnectionsAggregator {
    received: u64,
    authorized: u64,
    failures: u64,
    ssl_connections: u64,
    by_host: HashMap<String, u64>,
    by_user: HashMap<String, u64>,
    by_database: HashMap<String, u64>,
    by_application: HashMap<String, u64>,
    attempts_per_window: HashMap<DateTime<Utc>, u64>,
}

/// Final read-out of [`ConnectionsAggregator`].
#[derive(Debug, Default)]
pub struct ConnectionsReport {
    pub received: u64,
    pub authorized: u64,
    pub failures: u64,
    /// authorized / (authorized + failures), when any auth outcome was seen.
    pub success_rate: Option<f64>,
    /// ssl connections / authorized, when any connection was authorized.
    pub ssl_rate: Option<f64>,
    pub by_host: Vec<(String, u64)>,
    pub by_user: Vec<(String, u64)>,
    pub by_database: Vec<(String, u64)>,
    pub by_application: Vec<(String, u64)>,
    /// Busiest 10-minute attempt window.
    pub busiest_window: Option<(DateTime<Utc>, u64)>,
}

impl ConnectionsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, rec: &LogRecord) {
        let msg = rec.message.as_str();

        if rec.severity == "LOG" {
            if msg.starts_with("connection received") {
                self.received += 1;
                if let Some(host) = connect_host(msg) {
                    *self.by_host.entry(host).or_insert(0) += 1;
                }
                if let Some(t) = rec.time() {
                    *self
                        .attempts_per_window
                        .entry(truncate_to_bucket(t, Duration::seconds(CONNECT_WINDOW_SECS)))
                        .or_insert(0) += 1;
                }
            } else if msg.starts_with("connection authorized") {
                self.authorized += 1;
                let fields = connect_authorized_fields(msg);
                if !fields.user.is_empty() {
                    *self.by_user.entry(fields.user).or_insert(0) += 1;
                }
                if !fields.database.is_empty() {
                    *self.by_database.entry(fields.database).or_insert(0) += 1;
                }
                if !fields.application_name.is_empty() {
                    *self
                        .by_application
                        .entry(fields.application_name)
                        .or_insert(0) += 1;
                }
                if fields.ssl {
                    self.ssl_connections += 1;
                }
            }
        } else if rec.severity == "FATAL"
            && AUTH_FAILURE_PATTERNS.iter().any(|p| msg.contains(p))
        {
            self.failures += 1;
        }
    }

    pub fn report(self) -> ConnectionsReport {
        let sorted_desc = |map: HashMap<String, u64>| {
            let mut v: Vec<(String, u64)> = map.into_iter().collect();
            v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            v
        };

        let auth_outcomes = self.authorized + self.failures;
        ConnectionsReport {
            received: self.received,
            authorized: self.authorized,
            failures: self.failures,
            success_rate: (auth_outcomes > 0)
                .then(|| self.authorized as f64 / auth_outcomes as f64),
            ssl_rate: (self.authorized > 0)
                .then(|| self.ssl_connections as f64 / self.authorized as f64),
            by_host: sorted_desc(self.by_host),
            by_user: sorted_desc(self.by_user),
            by_database: sorted_desc(self.by_database),
            by_application: sorted_desc(self.by_application),
            busiest_window: self
                .attempts_per_window
                .into_iter()
                .max_by_key(|(_, count)| *count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_record(log_time: &str, severity: &str, message: &str) -> LogRecord {
        LogRecord {
            log_time: log_time.to_string(),
            severity: severity.to_string(),
            message: message.to_string(),
            lines: vec!["line".to_string()],
            csv: None,
        }
    }

    #[test]
    fn test_received_and_hosts() {
        let mut agg = ConnectionsAggregator::new();
        agg.add_event(&log_record(
            "2025-05-02 10:01:00 UTC",
            "LOG",
            "connection received: host=127.0.0.1 port=44410",
        ));
        agg.add_event(&log_record(
            "2025-05-02 10:02:00 UTC",
            "LOG",
            "connection received: host=127.0.0.1 port=44411",
        ));
        agg.add_event(&log_record(
            "2025-05-02 10:03:00 UTC",
            "LOG",
            "connection received: host=[local]",
        ));

        let report = agg.report();
        assert_eq!(report.received, 3);
        assert_eq!(report.by_host[0], ("127.0.0.1".to_string(), 2));
        assert_eq!(report.by_host[1], ("local".to_string(), 1));
        let (window, count) = report.busiest_window.unwrap();
        assert_eq!(count, 3);
        assert_eq!(window.format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn test_authorized_breakdowns_and_rates() {
        let mut agg = ConnectionsAggregator::new();
        agg.add_event(&log_record(
            "2025-05-02 10:01:00 UTC",
            "LOG",
            "connection authorized: user=krl database=postgres application_name=psql",
        ));
        agg.add_event(&log_record(
            "2025-05-02 10:02:00 UTC",
            "LOG",
            "connection authorized: user=monitor database=bench SSL enabled (protocol=TLSv1.3, cipher=TLS_AES_256_GCM_SHA384, bits=256)",
        ));
        agg.add_event(&log_record(
            "2025-05-02 10:03:00 UTC",
            "FATAL",
            "password authentication failed for user \"intruder\"",
        ));
        agg.add_event(&log_record(
            "2025-05-02 10:04:00 UTC",
            "FATAL",
            "role \"batch\" is not permitted to log in",
        ));

        let report = agg.report();
        assert_eq!(report.authorized, 2);
        assert_eq!(report.failures, 2);
        assert_eq!(report.success_rate, Some(0.5));
        assert_eq!(report.ssl_rate, Some(0.5));
        assert_eq!(report.by_user.len(), 2);
        assert_eq!(report.by_database[0].1 + report.by_database[1].1, 2);
        assert_eq!(report.by_application, vec![("psql".to_string(), 1)]);
    }

    #[test]
    fn test_unrelated_messages_ignored() {
        let mut agg = ConnectionsAggregator::new();
        agg.add_event(&log_record("2025-05-02 10:00:00 UTC", "LOG", "checkpoint starting: time"));
        agg.add_event(&log_record(
            "2025-05-02 10:00:00 UTC",
            "FATAL",
            "the database system is in recovery mode",
        ));

        let report = agg.report();
        assert_eq!(report.received, 0);
        assert_eq!(report.failures, 0);
        assert!(report.success_rate.is_none());
        assert!(report.ssl_rate.is_none());
    }
}
