//! Streaming aggregators over the structured record stream.
//!
//! Shared contract: construct once per invocation, feed once per complete
//! record (continuation records with empty severity are filtered upstream),
//! read the report out at the end. No aggregator retains input records —
//! only derived counts and sketches — so memory stays bounded regardless
//! of input size.

pub mod connections;
pub mod histogram;
pub mod peaks;
pub mod slow;
pub mod stats;
pub mod tdigest;
pub mod top_errors;
pub mod topn;

use chrono::{DateTime, Duration, TimeZone, Utc};

pub use connections::{ConnectionsAggregator, ConnectionsReport};
pub use histogram::{HistogramBucket, TimeBucket};
pub use peaks::EventBucket;
pub use slow::{SlowReport, SlowStatementAggregator};
pub use stats::{StatsAggregator, StatsReport};
pub use top_errors::{TopError, TopErrors};
pub use topn::{SlowEntry, TopN};

/// Truncate a timestamp to its bucket start for a given bucket width.
pub fn truncate_to_bucket(t: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_secs = width.num_seconds().max(1);
    let secs = t.timestamp();
    let bucket_start = secs - secs.rem_euclid(width_secs);
    Utc.timestamp_opt(bucket_start, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_bucket() {
        let t = Utc.with_ymd_and_hms(2025, 5, 2, 12, 27, 52).unwrap();
        assert_eq!(
            truncate_to_bucket(t, Duration::minutes(5)),
            Utc.with_ymd_and_hms(2025, 5, 2, 12, 25, 0).unwrap()
        );
        assert_eq!(
            truncate_to_bucket(t, Duration::hours(1)),
            Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap()
        );
        // Bucket starts are fixed points
        let start = Utc.with_ymd_and_hms(2025, 5, 2, 12, 25, 0).unwrap();
        assert_eq!(truncate_to_bucket(start, Duration::minutes(5)), start);
    }
}
