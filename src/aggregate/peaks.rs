//! Peak/event bucketer: find the busiest period per severity, plus
//! specialized lock and connection sub-buckets.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::record::{LogRecord, is_ranked_severity};

use super::truncate_to_bucket;

/// Per-severity counts per fixed time bucket.
///
/// Bucket keys are truncated (synthetic) times; the first real log-time
/// string seen in each bucket is kept for display.
#[derive(Debug, Default)]
pub struct EventBucket {
    severity_buckets: HashMap<String, HashMap<DateTime<Utc>, u64>>,
    lock_buckets: HashMap<DateTime<Utc>, u64>,
    connect_buckets: HashMap<DateTime<Utc>, u64>,
    first_time_in_bucket: HashMap<DateTime<Utc>, String>,
    pub total_events: u64,
    pub total_by_severity: HashMap<String, u64>,
}

impl EventBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record into its bucket. Auxiliary markers (STATEMENT,
    /// DETAIL, ...) are not events and records without a parseable time
    /// cannot be bucketed; both are ignored.
    pub fn add_event(&mut self, rec: &LogRecord, bucket_width: Duration) {
        if !is_ranked_severity(&rec.severity) {
            return;
        }
        let Some(t) = rec.time() else {
            return;
        };
        let bucket = truncate_to_bucket(t, bucket_width);

        self.total_events += 1;
        *self
            .total_by_severity
            .entry(rec.severity.clone())
            .or_insert(0) += 1;
        *self
            .severity_buckets
            .entry(rec.severity.clone())
            .or_default()
            .entry(bucket)
            .or_insert(0) += 1;

        if rec.is_locking_related() {
            *self.lock_buckets.entry(bucket).or_insert(0) += 1;
        }
        if rec.message.starts_with("connection received") {
            *self.connect_buckets.entry(bucket).or_insert(0) += 1;
        }

        self.first_time_in_bucket
            .entry(bucket)
            .or_insert_with(|| rec.log_time.clone());
    }

    /// The single highest-count bucket per severity.
    pub fn top_buckets_by_severity(&self) -> Vec<(&str, DateTime<Utc>, u64)> {
        let mut tops: Vec<(&str, DateTime<Utc>, u64)> = self
            .severity_buckets
            .iter()
            .filter_map(|(severity, buckets)| {
                buckets
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .map(|(t, count)| (severity.as_str(), *t, *count))
            })
            .collect();
        tops.sort_by(|a, b| a.0.cmp(b.0));
        tops
    }

    /// Highest-count lock-related bucket.
    pub fn top_locking_period(&self) -> Option<(DateTime<Utc>, u64)> {
        self.lock_buckets
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(t, count)| (*t, *count))
    }

    /// Highest-count connection-attempt bucket.
    pub fn top_connect_period(&self) -> Option<(DateTime<Utc>, u64)> {
        self.connect_buckets
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(t, count)| (*t, *count))
    }

    /// First real log-time string observed in a bucket (bucket keys are
    /// truncated, not literal).
    pub fn first_time_string(&self, bucket: DateTime<Utc>) -> Option<&str> {
        self.first_time_in_bucket.get(&bucket).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(log_time: &str, severity: &str, message: &str) -> LogRecord {
        LogRecord {
            log_time: log_time.to_string(),
            severity: severity.to_string(),
            message: message.to_string(),
            lines: vec![format!("{} [1] {}:  {}", log_time, severity, message)],
            csv: None,
        }
    }

    #[test]
    fn test_counts_ranked_severities_only() {
        let mut bucket = EventBucket::new();
        let width = Duration::minutes(5);
        bucket.add_event(&record("2025-05-02 18:18:26.523 EEST", "LOG", "Test message 1"), width);
        bucket.add_event(&record("2025-05-02 18:18:26.523 EEST", "ERROR", "Test message 2"), width);
        bucket.add_event(
            &record("2025-05-02 18:18:26.523 EEST", "STATEMENT", "Test message 3"),
            width,
        );

        assert_eq!(bucket.total_events, 2);
        assert_eq!(bucket.total_by_severity["ERROR"], 1);
        assert!(!bucket.total_by_severity.contains_key("STATEMENT"));
    }

    #[test]
    fn test_total_by_severity_counts_all_fed_errors() {
        let mut bucket = EventBucket::new();
        let width = Duration::minutes(5);
        for (sev, n) in [("LOG", 1), ("INFO", 1), ("NOTICE", 1), ("WARNING", 1), ("ERROR", 1)] {
            for _ in 0..n {
                bucket.add_event(&record("2025-05-02 18:18:26.523 EEST", sev, "msg"), width);
            }
        }
        assert_eq!(bucket.total_by_severity["ERROR"], 1);
        assert_eq!(bucket.total_events, 5);
    }

    #[test]
    fn test_top_bucket_per_severity() {
        let mut bucket = EventBucket::new();
        let width = Duration::minutes(5);
        // Three errors in the 12:25 bucket, one in 12:30
        bucket.add_event(&record("2025-05-02 12:27:01.000 UTC", "ERROR", "a"), width);
        bucket.add_event(&record("2025-05-02 12:28:02.000 UTC", "ERROR", "b"), width);
        bucket.add_event(&record("2025-05-02 12:29:03.000 UTC", "ERROR", "c"), width);
        bucket.add_event(&record("2025-05-02 12:31:04.000 UTC", "ERROR", "d"), width);

        let tops = bucket.top_buckets_by_severity();
        assert_eq!(tops.len(), 1);
        let (severity, top_bucket, count) = tops[0];
        assert_eq!(severity, "ERROR");
        assert_eq!(count, 3);
        assert_eq!(top_bucket.format("%H:%M").to_string(), "12:25");
        // Display helper returns a real observed time, not the synthetic key
        assert_eq!(
            bucket.first_time_string(top_bucket),
            Some("2025-05-02 12:27:01.000 UTC")
        );
    }

    #[test]
    fn test_lock_and_connect_sub_buckets() {
        let mut bucket = EventBucket::new();
        let width = Duration::minutes(10);
        bucket.add_event(&record("2025-05-02 12:01:00.000 UTC", "ERROR", "deadlock detected"), width);
        bucket.add_event(
            &record(
                "2025-05-02 12:02:00.000 UTC",
                "LOG",
                "connection received: host=10.0.0.1 port=1",
            ),
            width,
        );
        bucket.add_event(
            &record(
                "2025-05-02 12:03:00.000 UTC",
                "LOG",
                "connection received: host=10.0.0.2 port=2",
            ),
            width,
        );

        let (lock_bucket, lock_count) = bucket.top_locking_period().unwrap();
        assert_eq!(lock_count, 1);
        assert_eq!(lock_bucket.format("%H:%M").to_string(), "12:00");

        let (_, connect_count) = bucket.top_connect_period().unwrap();
        assert_eq!(connect_count, 2);
    }

    #[test]
    fn test_unparseable_time_not_bucketed() {
        let mut bucket = EventBucket::new();
        bucket.add_event(&record("garbage", "ERROR", "boom"), Duration::minutes(5));
        assert_eq!(bucket.total_events, 0);
    }
}
