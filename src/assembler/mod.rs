//! Multi-line log record assembly.
//!
//! PostgreSQL entries may span several raw lines (statement text, DETAIL,
//! HINT, CONTEXT). The only delimiting signal is the timestamp prefix: a
//! line that starts with one opens a new entry, everything until the next
//! prefixed line belongs to the open entry.
//!
//! Assembly runs on a producer thread per file, sending bounded batches
//! over a small sync channel to the consumer. Ordering within a file is
//! preserved exactly; the channel depth keeps memory bounded when the
//! consumer is slower than the scan.

pub mod reader;

use std::io::BufRead;
use std::sync::LazyLock;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use regex::Regex;
use tracing::{debug, error, warn};

use crate::record::CsvRecord;

pub use reader::{STDIN_TOKEN, open_log_reader};

/// Records per batch sent over the channel.
pub const BATCH_SIZE: usize = 10;

/// Channel depth in batches.
pub const CHANNEL_DEPTH: usize = 3;

/// Anchored timestamp-prefix detector. Recognizes ISO-like timestamps with
/// fractional seconds and a 2-5 char zone token, numeric-offset zones
/// (`+08`), syslog wrappers preceding the real timestamp, and bare epoch
/// floats. Lines that merely contain a timestamp later on do not match.
static RE_TIMESTAMP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-Za-z]{3} [0-9]{1,2} [0-9:]{6,} .*?: \[[0-9\-]+\] )?(?:[\d\-:\. ]{19,23} [A-Z0-9\-\+]{2,5}|[0-9\.]{14})",
    )
    .unwrap()
});

/// Does this line begin a new log entry?
pub fn has_timestamp_prefix(line: &str) -> bool {
    RE_TIMESTAMP_PREFIX.is_match(line)
}

/// One raw assembled entry, before field extraction.
#[derive(Debug, Clone)]
pub enum RawEntry {
    /// Assembled plain-text line group.
    Lines(Vec<String>),
    /// One decoded CSV row (the csv reader is the quote-aware assembler
    /// for that format — rows may span physical lines).
    Csv(CsvRecord),
}

/// Spawn the producer thread for one file and return the batch channel.
///
/// The producer scans lines, assembles entries, and sends batches of at
/// most [`BATCH_SIZE`] over a channel holding at most [`CHANNEL_DEPTH`]
/// batches. I/O errors are logged and terminate this file's stream only.
pub fn spawn_reader(path: String, csv_format: bool) -> Receiver<Vec<RawEntry>> {
    let (tx, rx) = sync_channel(CHANNEL_DEPTH);
    thread::spawn(move || {
        if csv_format {
            produce_csv_entries(&path, &tx);
        } else {
            produce_text_entries(&path, &tx);
        }
    });
    rx
}

/// Scan a plain-text log, grouping continuation lines under their entry.
fn produce_text_entries(path: &str, tx: &SyncSender<Vec<RawEntry>>) {
    debug!("Looking for log entries from plain text log file: {}", path);

    let reader = match open_log_reader(path) {
        Ok(r) => r,
        Err(e) => {
            error!("Error opening file {}: {}", path, e);
            return;
        }
    };

    let mut batch: Vec<RawEntry> = Vec::with_capacity(BATCH_SIZE);
    let mut lines: Vec<String> = Vec::new();
    let mut first_entry_found = false;

    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                error!("Error reading from {}: {}", path, e);
                return;
            }
        };

        // A line without a timestamp prefix continues the previous entry.
        if has_timestamp_prefix(&line) {
            if first_entry_found {
                let group = std::mem::take(&mut lines);
                batch.push(RawEntry::Lines(group));
                if batch.len() == BATCH_SIZE && tx.send(std::mem::take(&mut batch)).is_err() {
                    return; // consumer gone
                }
            }
            first_entry_found = true;
        }
        lines.push(line);
    }

    // End of stream flushes the open entry
    if first_entry_found && !lines.is_empty() {
        batch.push(RawEntry::Lines(lines));
    }
    if !batch.is_empty() {
        let _ = tx.send(batch);
    }
}

/// Read CSV rows; short rows are skipped, decode errors logged per row.
fn produce_csv_entries(path: &str, tx: &SyncSender<Vec<RawEntry>>) {
    debug!("Looking for log entries from CSV log file: {}", path);

    let reader = match open_log_reader(path) {
        Ok(r) => r,
        Err(e) => {
            error!("Error opening file {}: {}", path, e);
            return;
        }
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut batch: Vec<RawEntry> = Vec::with_capacity(BATCH_SIZE);
    for row_result in csv_reader.records() {
        let row = match row_result {
            Ok(r) => r,
            Err(e) => {
                warn!("Error reading CSV record from {}: {}", path, e);
                continue;
            }
        };
        let Some(rec) = CsvRecord::from_row(&row) else {
            continue;
        };
        batch.push(RawEntry::Csv(rec));
        if batch.len() == BATCH_SIZE && tx.send(std::mem::take(&mut batch)).is_err() {
            return;
        }
    }
    if !batch.is_empty() {
        let _ = tx.send(batch);
    }
}

/// Read just the first complete entry of a text log without consuming the
/// rest of the stream (separate short-lived open).
pub fn peek_text_entry(path: &str) -> std::io::Result<Option<Vec<String>>> {
    let reader = open_log_reader(path)?;

    let mut lines: Vec<String> = Vec::new();
    let mut first_entry_found = false;

    for line_result in reader.lines() {
        let line = line_result?;
        if has_timestamp_prefix(&line) {
            if first_entry_found {
                return Ok(Some(lines));
            }
            first_entry_found = true;
        }
        lines.push(line);
    }

    if first_entry_found && !lines.is_empty() {
        return Ok(Some(lines));
    }
    Ok(None)
}

/// Read just the first row of a CSV log.
pub fn peek_csv_entry(path: &str) -> std::io::Result<Option<CsvRecord>> {
    let reader = open_log_reader(path)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    match csv_reader.records().next() {
        Some(Ok(row)) => Ok(CsvRecord::from_row(&row)),
        Some(Err(e)) => {
            warn!("Error reading CSV record from {}: {}", path, e);
            Ok(None)
        }
        None => Ok(None),
    }
}
