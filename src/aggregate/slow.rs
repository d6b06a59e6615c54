//! Per-command-tag duration collections with percentile read-out.

use std::collections::HashMap;

use tracing::error;

use crate::extract::message::duration_millis;
use crate::record::LogRecord;

/// Files `duration:` messages under their best-effort SQL command tag.
#[derive(Debug, Default)]
pub struct SlowStatementAggregator {
    durations_by_tag: HashMap<String, Vec<f64>>,
    /// Duration-prefixed messages that failed full decoding. These signal
    /// extraction-regex drift, not ordinary malformed input.
    faults: u64,
}

/// Percentile summary for one command tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagStats {
    pub tag: String,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub samples: usize,
}

/// Final read-out of [`SlowStatementAggregator`].
#[derive(Debug, Default)]
pub struct SlowReport {
    /// Per-tag stats, sorted by sample count descending.
    pub per_tag: Vec<TagStats>,
    pub total_samples: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p25_ms: f64,
    pub p50_ms: f64,
    pub p75_ms: f64,
    pub p95_ms: f64,
    /// Internal-consistency faults encountered while aggregating.
    pub faults: u64,
}

impl SlowStatementAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rec: &LogRecord) {
        if rec.severity != "LOG" || !rec.message.starts_with("duration: ") {
            return;
        }

        // The message matched the duration prefix, so a missing tag or an
        // unparseable duration means the format has drifted from what the
        // extraction expects. Surface it loudly, never swallow it.
        let Some(tag) = rec.command_tag() else {
            error!("Failed to extract command tag from: {}", rec.message);
            self.faults += 1;
            return;
        };
        let duration = duration_millis(&rec.message).unwrap_or(0.0);
        if duration == 0.0 {
            error!("Got zero duration from: {}", rec.message);
            self.faults += 1;
            return;
        }

        self.durations_by_tag.entry(tag).or_default().push(duration);
    }

    #[cfg(test)]
    fn samples_for(&self, tag: &str) -> Option<&[f64]> {
        self.durations_by_tag.get(tag).map(|v| v.as_slice())
    }

    pub fn report(self) -> SlowReport {
        let mut all: Vec<f64> = Vec::new();
        let mut per_tag: Vec<TagStats> = Vec::new();

        for (tag, mut durations) in self.durations_by_tag {
            durations.sort_by(|a, b| a.total_cmp(b));
            all.extend_from_slice(&durations);
            per_tag.push(TagStats {
                tag,
                p25: percentile(&durations, 25.0),
                p50: percentile(&durations, 50.0),
                p75: percentile(&durations, 75.0),
                p95: percentile(&durations, 95.0),
                samples: durations.len(),
            });
        }
        per_tag.sort_by(|a, b| b.samples.cmp(&a.samples).then(a.tag.cmp(&b.tag)));

        all.sort_by(|a, b| a.total_cmp(b));
        SlowReport {
            total_samples: all.len(),
            min_ms: all.first().copied().unwrap_or(0.0),
            max_ms: all.last().copied().unwrap_or(0.0),
            p25_ms: percentile(&all, 25.0),
            p50_ms: percentile(&all, 50.0),
            p75_ms: percentile(&all, 75.0),
            p95_ms: percentile(&all, 95.0),
            per_tag,
            faults: self.faults,
        }
    }
}

/// Linear-interpolated percentile over sorted data.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank as usize;
    let upper = lower + 1;
    if upper >= sorted.len() {
        return sorted[sorted.len() - 1];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_record(severity: &str, message: &str) -> LogRecord {
        LogRecord {
            severity: severity.to_string(),
            message: message.to_string(),
            lines: vec![message.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_files_durations_under_tags() {
        let mut agg = SlowStatementAggregator::new();
        agg.add(&log_record(
            "LOG",
            "duration: 123.45 ms  execute <unnamed>: SELECT * FROM table",
        ));
        agg.add(&log_record(
            "LOG",
            "duration: 456.78 ms  execute P_1: UPDATE table SET col = value",
        ));
        // No duration prefix: skipped entirely
        agg.add(&log_record("LOG", "statement: INSERT INTO table VALUES (1, 2, 3)"));
        // Wrong severity: skipped
        agg.add(&log_record("ERROR", "duration: 1.0 ms  statement: SELECT 1"));

        assert_eq!(agg.samples_for("SELECT"), Some(&[123.45][..]));
        assert_eq!(agg.samples_for("UPDATE"), Some(&[456.78][..]));
        assert!(agg.samples_for("INSERT").is_none());

        let report = agg.report();
        assert_eq!(report.total_samples, 2);
        assert_eq!(report.min_ms, 123.45);
        assert_eq!(report.max_ms, 456.78);
        assert_eq!(report.faults, 0);
    }

    #[test]
    fn test_missing_tag_is_fault() {
        let mut agg = SlowStatementAggregator::new();
        agg.add(&log_record("LOG", "duration: 18.237 ms"));

        let report = agg.report();
        assert_eq!(report.total_samples, 0);
        assert_eq!(report.faults, 1);
    }

    #[test]
    fn test_percentiles() {
        let mut agg = SlowStatementAggregator::new();
        for i in 1..=100 {
            agg.add(&log_record(
                "LOG",
                &format!("duration: {}.0 ms  statement: SELECT {}", i, i),
            ));
        }

        let report = agg.report();
        assert_eq!(report.total_samples, 100);
        assert_eq!(report.per_tag.len(), 1);
        let tag = &report.per_tag[0];
        assert_eq!(tag.tag, "SELECT");
        assert!((tag.p25 - 25.75).abs() < 0.01);
        assert!((tag.p50 - 50.5).abs() < 0.01);
        assert!((tag.p95 - 95.05).abs() < 0.01);
        assert_eq!(report.min_ms, 1.0);
        assert_eq!(report.max_ms, 100.0);
    }

    #[test]
    fn test_percentile_helper() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 50.0), 2.0);
        assert_eq!(percentile(&[1.0, 2.0], 100.0), 2.0);
    }
}
