//! pgsift - PostgreSQL log analysis library.
//!
//! Turns raw server log output (plain text, syslog-wrapped, or csvlog)
//! into structured records and runs bounded-memory streaming aggregations
//! over them:
//! - `assembler` — multi-line entry assembly over plain/gzip/stdin sources
//! - `extract` — named-capture field extraction and message helpers
//! - `record` — the structured record, severity table, classification
//! - `aggregate` — peaks, histograms, stats, connections, slow statements
//! - `pipeline` — per-file bounded producer/consumer loop and filtering
//! - `files` — input path resolution
//! - `util` — timestamp and human-time parsing

pub mod aggregate;
pub mod assembler;
pub mod extract;
pub mod files;
pub mod pipeline;
pub mod record;
pub mod util;
