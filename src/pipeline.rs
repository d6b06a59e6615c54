//! Per-file processing pipeline: bounded producer/consumer wiring, record
//! filtering, and the skip-file optimization for bounded time ranges.

use std::io;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::assembler::{RawEntry, peek_csv_entry, peek_text_entry, spawn_reader};
use crate::extract::Extractor;
use crate::record::LogRecord;
use crate::util::fits_range;

/// Immutable per-invocation configuration, constructed once from the CLI
/// and passed into the pipeline. Core components never read ambient state.
pub struct AnalyzerConfig {
    /// Minimum severity rank for plain record output.
    pub min_severity_rank: u8,
    /// Inclusive lower/upper time bounds.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Compiled text extraction (default or operator-supplied pattern).
    pub extractor: Extractor,
    /// Treat inputs as csvlog even without a `.csv` suffix.
    pub force_csv: bool,
    /// Extra record filters; every pattern must match the raw entry.
    pub filters: Vec<Regex>,
    /// Grep mode: when set, this pattern alone decides matching.
    pub grep: Option<Regex>,
    /// Keep only system-process entries.
    pub system_only: bool,
    /// Whether checkpointer messages count as system entries.
    pub include_checkpointer: bool,
    /// Keep only statements at least this slow (0 disables).
    pub min_slow_ms: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_severity_rank: 0,
            from: None,
            to: None,
            extractor: Extractor::default(),
            force_csv: false,
            filters: Vec::new(),
            grep: None,
            system_only: false,
            include_checkpointer: true,
            min_slow_ms: 0.0,
        }
    }
}

impl AnalyzerConfig {
    /// Is this path read as csvlog?
    pub fn uses_csv(&self, path: &str) -> bool {
        self.force_csv || path.contains(".csv")
    }
}

/// Layered user filters over one record, evaluated cheapest-first.
///
/// Grep mode short-circuits everything else; system-only mode replaces the
/// severity/time/duration checks.
pub fn record_passes_filters(rec: &LogRecord, cfg: &AnalyzerConfig) -> bool {
    if let Some(grep) = &cfg.grep {
        return grep.is_match(&rec.message);
    }

    if cfg.system_only {
        return rec.is_system_entry(cfg.include_checkpointer);
    }

    if rec.severity_rank() < cfg.min_severity_rank {
        return false;
    }

    if !cfg.filters.is_empty() {
        let text = rec.raw_text();
        if !cfg.filters.iter().all(|f| f.is_match(&text)) {
            return false;
        }
    }

    if !fits_range(rec.time(), cfg.from, cfg.to) {
        return false;
    }

    if cfg.min_slow_ms > 0.0 {
        let duration = crate::extract::message::duration_millis(&rec.message).unwrap_or(0.0);
        if duration < cfg.min_slow_ms {
            return false;
        }
    }

    true
}

/// Read only the first record of a file, without consuming the stream the
/// pipeline will use.
pub fn peek_record(path: &str, cfg: &AnalyzerConfig) -> io::Result<Option<LogRecord>> {
    if cfg.uses_csv(path) {
        return Ok(peek_csv_entry(path)?.map(LogRecord::from_csv));
    }
    let Some(lines) = peek_text_entry(path)? else {
        return Ok(None);
    };
    match cfg.extractor.extract(&lines) {
        Ok(rec) => Ok(Some(rec)),
        Err(e) => {
            warn!("Failed to parse first entry of {}: {}", path, e);
            Ok(None)
        }
    }
}

/// Can the whole file be skipped because its first record already lies
/// past the upper time bound? Peek failures degrade to a warning and the
/// file is processed anyway.
fn file_starts_past_range(path: &str, cfg: &AnalyzerConfig) -> bool {
    let Some(to) = cfg.to else {
        return false;
    };
    match peek_record(path, cfg) {
        Ok(Some(rec)) => match rec.time() {
            Some(t) if t > to => {
                debug!("Skipping {}: first entry {} is past --to", path, rec.log_time);
                true
            }
            _ => false,
        },
        Ok(None) => false,
        Err(e) => {
            warn!("Could not peek at {} ({}), processing anyway", path, e);
            false
        }
    }
}

/// Run the bounded pipeline over one file, invoking the sink once per
/// complete record, in file order.
///
/// One producer thread assembles raw entries and sends small batches over
/// a bounded channel; extraction and classification happen here on the
/// consumer side. Record-level failures are logged and skipped — a bad
/// record never aborts the file, and a bad file never aborts the batch
/// (errors are reported per-file by the caller).
pub fn process_file<F>(path: &str, cfg: &AnalyzerConfig, mut sink: F)
where
    F: FnMut(LogRecord),
{
    debug!("Processing log file: {}", path);

    if path != crate::assembler::STDIN_TOKEN && file_starts_past_range(path, cfg) {
        return;
    }

    let rx = spawn_reader(path.to_string(), cfg.uses_csv(path));

    for batch in rx {
        for raw in batch {
            let rec = match raw {
                RawEntry::Lines(lines) => match cfg.extractor.extract(&lines) {
                    Ok(rec) => rec,
                    Err(e) => {
                        warn!("Skipping unparseable entry in {}: {}", path, e);
                        continue;
                    }
                },
                RawEntry::Csv(csv) => LogRecord::from_csv(csv),
            };

            // Continuation rows never reach a sink as independent events
            if rec.severity.is_empty() {
                warn!("Skipping entry with empty severity in {}", path);
                continue;
            }

            sink(rec);
        }
    }

    debug!("Finished processing log file: {}", path);
}
