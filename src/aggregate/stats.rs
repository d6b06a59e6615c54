//! Whole-log summary statistics: totals per severity, connection churn,
//! checkpoint/autovacuum activity, and statement-duration quantiles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::extract::message::{
    autovacuum_event, autovacuum_rates, checkpoint_duration_secs, duration_is_bind_or_parse,
    duration_millis,
};
use crate::record::LogRecord;

use super::tdigest::TDigest;

/// Streaming statistics aggregator.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    first_event: Option<DateTime<Utc>>,
    last_event: Option<DateTime<Utc>>,
    severity_counts: HashMap<String, u64>,
    total_events: u64,
    connections_received: u64,
    disconnections: u64,
    durations: TDigest,
    duration_sum_ms: f64,
    checkpoints_timed: u64,
    checkpoints_forced: u64,
    longest_checkpoint_secs: f64,
    autovacuum_count: u64,
    autoanalyze_count: u64,
    longest_autovacuum_secs: f64,
    longest_autovacuum_table: String,
    av_read_rate_sum: f64,
    av_write_rate_sum: f64,
    av_rate_samples: u64,
}

/// Final read-out of [`StatsAggregator`]. Presentation code formats this;
/// the aggregator itself never prints.
#[derive(Debug, Default)]
pub struct StatsReport {
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub total_events: u64,
    /// Severity name -> count, sorted by rank then name.
    pub severity_counts: Vec<(String, u64)>,
    pub connections_received: u64,
    pub disconnections: u64,
    pub statement_count: u64,
    pub statement_total_ms: f64,
    pub statement_p50_ms: Option<f64>,
    pub statement_p90_ms: Option<f64>,
    pub statement_p99_ms: Option<f64>,
    pub checkpoints_timed: u64,
    pub checkpoints_forced: u64,
    pub longest_checkpoint_secs: f64,
    pub autovacuum_count: u64,
    pub autoanalyze_count: u64,
    pub longest_autovacuum_secs: f64,
    pub longest_autovacuum_table: String,
    pub avg_autovacuum_read_mbs: f64,
    pub avg_autovacuum_write_mbs: f64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, rec: &LogRecord) {
        self.total_events += 1;
        *self
            .severity_counts
            .entry(rec.severity.clone())
            .or_insert(0) += 1;

        if let Some(t) = rec.time() {
            if self.first_event.is_none_or(|f| t < f) {
                self.first_event = Some(t);
            }
            if self.last_event.is_none_or(|l| t > l) {
                self.last_event = Some(t);
            }
        }

        let msg = rec.message.as_str();

        if rec.severity == "LOG" {
            if msg.starts_with("connection received") {
                self.connections_received += 1;
            } else if msg.starts_with("disconnection") {
                self.disconnections += 1;
            } else if msg.starts_with("checkpoint starting:") {
                // "time" is the scheduled trigger; everything else (wal,
                // immediate, shutdown, ...) counts as forced
                if msg.contains("time") {
                    self.checkpoints_timed += 1;
                } else {
                    self.checkpoints_forced += 1;
                }
            } else if msg.starts_with("checkpoint complete") {
                if let Some(secs) = checkpoint_duration_secs(msg)
                    && secs > self.longest_checkpoint_secs
                {
                    self.longest_checkpoint_secs = secs;
                }
            } else if let Some(event) = autovacuum_event(msg) {
                if event.is_analyze {
                    self.autoanalyze_count += 1;
                } else {
                    self.autovacuum_count += 1;
                }
                if event.elapsed_secs > self.longest_autovacuum_secs {
                    self.longest_autovacuum_secs = event.elapsed_secs;
                    self.longest_autovacuum_table = event.table_name;
                }
                if let Some((read, write)) = autovacuum_rates(msg) {
                    self.av_read_rate_sum += read;
                    self.av_write_rate_sum += write;
                    self.av_rate_samples += 1;
                }
            } else if let Some(ms) = duration_millis(msg)
                && !duration_is_bind_or_parse(msg)
            {
                self.durations.add(ms);
                self.duration_sum_ms += ms;
            }
        }
    }

    /// Produce the final report. Consumes internal sketch state for the
    /// quantile queries (aggregators are read out once, then discarded).
    pub fn report(mut self) -> StatsReport {
        let mut severity_counts: Vec<(String, u64)> =
            self.severity_counts.drain().collect();
        severity_counts.sort_by(|a, b| {
            crate::record::severity_rank(&a.0)
                .cmp(&crate::record::severity_rank(&b.0))
                .then(a.0.cmp(&b.0))
        });

        let statement_count = self.durations.count();
        StatsReport {
            first_event: self.first_event,
            last_event: self.last_event,
            total_events: self.total_events,
            severity_counts,
            connections_received: self.connections_received,
            disconnections: self.disconnections,
            statement_count,
            statement_total_ms: self.duration_sum_ms,
            statement_p50_ms: self.durations.quantile(0.50),
            statement_p90_ms: self.durations.quantile(0.90),
            statement_p99_ms: self.durations.quantile(0.99),
            checkpoints_timed: self.checkpoints_timed,
            checkpoints_forced: self.checkpoints_forced,
            longest_checkpoint_secs: self.longest_checkpoint_secs,
            autovacuum_count: self.autovacuum_count,
            autoanalyze_count: self.autoanalyze_count,
            longest_autovacuum_secs: self.longest_autovacuum_secs,
            longest_autovacuum_table: self.longest_autovacuum_table,
            avg_autovacuum_read_mbs: if self.av_rate_samples > 0 {
                self.av_read_rate_sum / self.av_rate_samples as f64
            } else {
                0.0
            },
            avg_autovacuum_write_mbs: if self.av_rate_samples > 0 {
                self.av_write_rate_sum / self.av_rate_samples as f64
            } else {
                0.0
            },
        }
    }
}
