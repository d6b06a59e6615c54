//! Single-series time histogram with dense read-out.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::record::LogRecord;

use super::truncate_to_bucket;

/// One fixed-width time interval and its event count.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    pub time: DateTime<Utc>,
    pub count: u64,
}

/// Counts per truncated-time bucket, filtered by a minimum severity rank
/// at insertion time.
#[derive(Debug)]
pub struct HistogramBucket {
    width: Duration,
    counts: HashMap<DateTime<Utc>, u64>,
    pub total_events: u64,
}

impl HistogramBucket {
    pub fn new(width: Duration) -> Self {
        Self {
            width,
            counts: HashMap::new(),
            total_events: 0,
        }
    }

    /// Count a record whose severity rank is at least `min_rank`.
    pub fn add(&mut self, rec: &LogRecord, min_rank: u8) {
        if rec.severity_rank() < min_rank {
            return;
        }
        let Some(t) = rec.time() else {
            return;
        };
        *self
            .counts
            .entry(truncate_to_bucket(t, self.width))
            .or_insert(0) += 1;
        self.total_events += 1;
    }

    /// Dense, chronologically ordered bucket sequence from the earliest to
    /// the latest observed bucket, zero-filling gaps.
    ///
    /// Reconstruction uses integer bucket-index arithmetic from the
    /// minimum observed time, never map iteration order.
    pub fn sorted_buckets(&self) -> Vec<TimeBucket> {
        if self.counts.is_empty() {
            return Vec::new();
        }

        let min_time = *self.counts.keys().min().unwrap();
        let max_time = *self.counts.keys().max().unwrap();
        let width_secs = self.width.num_seconds().max(1);
        let bucket_count =
            ((max_time.timestamp() - min_time.timestamp()) / width_secs) as usize + 1;

        let mut result = vec![
            TimeBucket {
                time: min_time,
                count: 0
            };
            bucket_count
        ];
        for (i, bucket) in result.iter_mut().enumerate() {
            bucket.time = min_time + Duration::seconds(width_secs * i as i64);
        }
        for (t, count) in &self.counts {
            let idx = ((t.timestamp() - min_time.timestamp()) / width_secs) as usize;
            result[idx].count = *count;
        }
        result
    }
}
