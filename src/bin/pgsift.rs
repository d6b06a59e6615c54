//! pgsift - PostgreSQL log analyzer CLI.
//!
//! Subcommands mirror the analysis modes of the library: error triage,
//! slow-query ranking, lock hunting, load-peak detection, time-bucketed
//! histograms, whole-log statistics and connection accounting.
//!
//! Usage:
//!   pgsift errors postgresql.log            # WARNING and higher
//!   pgsift errors top --top 10 pg.log       # most frequent errors
//!   pgsift slow 500ms pg.log                # statements over 500 ms
//!   pgsift peaks --bucket 10m pg.log        # busiest periods
//!   pgsift stats pg.log.gz                  # whole-log summary
//!   cat pg.log | pgsift locks               # reads piped stdin

use std::io::{BufWriter, Stdout, Write};

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use pgsift::aggregate::{
    ConnectionsAggregator, EventBucket, HistogramBucket, SlowEntry, SlowStatementAggregator,
    StatsAggregator, TopErrors, TopN,
};
use pgsift::extract::Extractor;
use pgsift::extract::message::duration_millis;
use pgsift::files::resolve_inputs;
use pgsift::pipeline::{AnalyzerConfig, process_file, record_passes_filters};
use pgsift::record::{LogRecord, severity_rank};
use pgsift::util::{parse_human_time, parse_interval_millis};

/// PostgreSQL log analyzer.
#[derive(Parser)]
#[command(name = "pgsift", about = "PostgreSQL log analyzer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom log_line_prefix extraction regex. Must define named groups
    /// log_time, error_severity and message.
    #[arg(short, long, global = true, value_name = "REGEX")]
    prefix: Option<String>,

    /// Force csvlog input even without a .csv suffix.
    #[arg(long, global = true)]
    csv: bool,

    /// Only entries from this time ("-2h", "today", "2025-05-02 12:00:00 UTC").
    #[arg(long, global = true, value_name = "TIME")]
    from: Option<String>,

    /// Only entries up to this time.
    #[arg(long, global = true, value_name = "TIME")]
    to: Option<String>,

    /// Only entries matching this regex; repeatable, all must match.
    #[arg(long = "filter", global = true, value_name = "REGEX")]
    filters: Vec<String>,

    /// Compact multi-line entries onto one line.
    #[arg(long, global = true)]
    oneline: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show WARNING and higher entries.
    #[command(visible_aliases = ["err", "errs", "error"])]
    Errors {
        /// Minimum severity level to show.
        #[arg(short = 'l', long, default_value = "WARNING")]
        min_level: String,

        /// Show only the N most frequent messages instead of every entry.
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Log files or folders (stdin when piped and omitted).
        paths: Vec<String>,
    },

    /// Show statements slower than a threshold, e.g. `slow 1s pg.log`.
    #[command(visible_alias = "slo")]
    Slow {
        /// Minimum duration ("500", "500ms", "1s").
        min_duration: String,

        /// Show only the N slowest statements.
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Per-command-tag percentile summary instead of raw entries.
        #[arg(long)]
        by_statement: bool,

        paths: Vec<String>,
    },

    /// Only show locking related entries.
    #[command(visible_aliases = ["lock", "deadlocks"])]
    Locks { paths: Vec<String> },

    /// Identify periods where most log entries are emitted, per severity.
    #[command(visible_alias = "busy")]
    Peaks {
        /// Bucket interval.
        #[arg(short, long, default_value = "10m")]
        bucket: String,

        paths: Vec<String>,
    },

    /// Time-bucketed event counts, zero-filled.
    #[command(visible_alias = "hist")]
    Histogram {
        /// Bucket interval.
        #[arg(short, long, default_value = "1h")]
        bucket: String,

        /// Minimum severity level to count.
        #[arg(short = 'l', long, default_value = "WARNING")]
        min_level: String,

        paths: Vec<String>,
    },

    /// Summary of log events.
    #[command(visible_alias = "stat")]
    Stats { paths: Vec<String> },

    /// Show connections summary.
    #[command(visible_aliases = ["conns", "conn"])]
    Connections { paths: Vec<String> },

    /// Show messages by Postgres internal processes.
    System {
        /// Count checkpointer messages as system activity.
        #[arg(long)]
        checkpointer: bool,

        paths: Vec<String>,
    },

    /// Only show entries whose message matches a regex.
    Grep {
        pattern: String,
        paths: Vec<String>,
    },
}

/// Default level keeps analysis output clean; -v opts into diagnostics.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pgsift={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // All configuration is validated here, before any file is opened.
    let extractor = match &cli.prefix {
        Some(pattern) => Extractor::with_pattern(pattern)?,
        None => Extractor::default(),
    };

    let now = Utc::now();
    let from = cli
        .from
        .as_deref()
        .map(|s| parse_human_time(s, now))
        .transpose()?;
    let to = cli
        .to
        .as_deref()
        .map(|s| parse_human_time(s, now))
        .transpose()?;

    let filters = cli
        .filters
        .iter()
        .map(|f| Regex::new(f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cfg = AnalyzerConfig {
        from,
        to,
        extractor,
        force_csv: cli.csv,
        filters,
        ..Default::default()
    };

    let mut out = BufWriter::new(std::io::stdout());

    match cli.command {
        Command::Errors {
            min_level,
            top,
            paths,
        } => {
            cfg.min_severity_rank = severity_rank(&min_level);
            let files = inputs(&paths)?;
            match top {
                Some(n) => run_errors_top(&files, &cfg, n.max(1), &mut out),
                None => run_print_matching(&files, &cfg, cli.oneline, &mut out),
            }
        }
        Command::Slow {
            min_duration,
            top,
            by_statement,
            paths,
        } => {
            cfg.min_slow_ms = parse_interval_millis(&min_duration)? as f64;
            cfg.min_severity_rank = 0; // durations are LOG level
            let files = inputs(&paths)?;
            if by_statement {
                run_slow_by_statement(&files, &cfg, &mut out);
            } else {
                match top {
                    Some(n) => run_slow_top(&files, &cfg, n.max(1), &mut out),
                    None => run_print_matching(&files, &cfg, cli.oneline, &mut out),
                }
            }
        }
        Command::Locks { paths } => {
            let files = inputs(&paths)?;
            run_locks(&files, &cfg, cli.oneline, &mut out);
        }
        Command::Peaks { bucket, paths } => {
            let width = Duration::milliseconds(parse_interval_millis(&bucket)? as i64);
            let files = inputs(&paths)?;
            run_peaks(&files, &cfg, width, &bucket, &mut out);
        }
        Command::Histogram {
            bucket,
            min_level,
            paths,
        } => {
            let width = Duration::milliseconds(parse_interval_millis(&bucket)? as i64);
            let min_rank = severity_rank(&min_level);
            let files = inputs(&paths)?;
            run_histogram(&files, &cfg, width, min_rank, &mut out);
        }
        Command::Stats { paths } => {
            let files = inputs(&paths)?;
            run_stats(&files, &cfg, &mut out);
        }
        Command::Connections { paths } => {
            let files = inputs(&paths)?;
            run_connections(&files, &cfg, &mut out);
        }
        Command::System {
            checkpointer,
            paths,
        } => {
            cfg.system_only = true;
            cfg.include_checkpointer = checkpointer;
            let files = inputs(&paths)?;
            run_print_matching(&files, &cfg, cli.oneline, &mut out);
        }
        Command::Grep { pattern, paths } => {
            cfg.grep = Some(Regex::new(&pattern)?);
            let files = inputs(&paths)?;
            run_print_matching(&files, &cfg, cli.oneline, &mut out);
        }
    }

    out.flush()?;
    Ok(())
}

fn inputs(paths: &[String]) -> Result<Vec<String>, String> {
    let files = resolve_inputs(paths);
    if files.is_empty() {
        return Err("no log files found to process".to_string());
    }
    Ok(files)
}

type Out = BufWriter<Stdout>;

fn output_record(rec: &LogRecord, oneline: bool, out: &mut Out) {
    let text = match &rec.csv {
        Some(csv) => csv.to_csv_line(),
        None => rec.lines.join(if oneline { " " } else { "\n" }),
    };
    let text = if oneline {
        text.replace('\n', " ")
    } else {
        text
    };
    let _ = writeln!(out, "{}", text);
}

/// Print every record that passes the configured filters.
fn run_print_matching(files: &[String], cfg: &AnalyzerConfig, oneline: bool, out: &mut Out) {
    for file in files {
        process_file(file, cfg, |rec| {
            if record_passes_filters(&rec, cfg) {
                output_record(&rec, oneline, out);
            }
        });
    }
}

fn run_locks(files: &[String], cfg: &AnalyzerConfig, oneline: bool, out: &mut Out) {
    for file in files {
        process_file(file, cfg, |rec| {
            if rec.is_locking_related() && record_passes_filters(&rec, cfg) {
                output_record(&rec, oneline, out);
            }
        });
    }
}

fn run_errors_top(files: &[String], cfg: &AnalyzerConfig, n: usize, out: &mut Out) {
    let mut top = TopErrors::new();
    for file in files {
        process_file(file, cfg, |rec| {
            if rec.severity_rank() >= cfg.min_severity_rank {
                top.add(&rec.severity, &rec.message);
            }
        });
    }
    for entry in top.top_n(n) {
        let _ = writeln!(out, "{} {}: {}", entry.count, entry.severity, entry.message);
    }
}

fn run_slow_top(files: &[String], cfg: &AnalyzerConfig, n: usize, out: &mut Out) {
    let mut top = TopN::new(n);
    for file in files {
        process_file(file, cfg, |rec| {
            if rec.severity != "LOG" {
                return;
            }
            let Some(duration_ms) = duration_millis(&rec.message) else {
                return;
            };
            if duration_ms > 0.0 && record_passes_filters(&rec, cfg) {
                top.add(SlowEntry {
                    record: rec,
                    duration_ms,
                });
            }
        });
    }
    for entry in top.into_sorted() {
        let _ = writeln!(
            out,
            "{:>12.3} ms  {}  {}",
            entry.duration_ms, entry.record.log_time, entry.record.message
        );
    }
}

fn run_slow_by_statement(files: &[String], cfg: &AnalyzerConfig, out: &mut Out) {
    let mut agg = SlowStatementAggregator::new();
    for file in files {
        process_file(file, cfg, |rec| {
            if record_passes_filters(&rec, cfg) {
                agg.add(&rec);
            }
        });
    }

    let report = agg.report();
    if report.total_samples == 0 {
        let _ = writeln!(out, "No statement statistics available");
        return;
    }
    for tag in &report.per_tag {
        let _ = writeln!(
            out,
            "{:<12}  p25: {:.2}, p50: {:.2}, p75: {:.2}, p95: {:.2}, samples: {}",
            tag.tag, tag.p25, tag.p50, tag.p75, tag.p95, tag.samples
        );
    }
    let _ = writeln!(
        out,
        "TOTAL (ms)    min: {:.2}, p25: {:.2}, p50: {:.2}, p75: {:.2}, p95: {:.2}, max: {:.2}, samples: {}",
        report.min_ms,
        report.p25_ms,
        report.p50_ms,
        report.p75_ms,
        report.p95_ms,
        report.max_ms,
        report.total_samples
    );
    if report.faults > 0 {
        let _ = writeln!(
            out,
            "WARNING: {} duration entries could not be fully decoded (format drift?)",
            report.faults
        );
    }
}

fn run_peaks(
    files: &[String],
    cfg: &AnalyzerConfig,
    width: Duration,
    bucket_label: &str,
    out: &mut Out,
) {
    let mut peaks = EventBucket::new();
    for file in files {
        process_file(file, cfg, |rec| peaks.add_event(&rec, width));
    }

    let _ = writeln!(out, "Most events per {}:\n", bucket_label);
    for (severity, bucket, count) in peaks.top_buckets_by_severity() {
        let example = peaks.first_time_string(bucket).unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<12}: {:<6} ({}, e.g.: {})",
            severity,
            count,
            bucket.format("%Y-%m-%d %H:%M:%S"),
            example
        );
    }

    if let Some((bucket, count)) = peaks.top_locking_period() {
        let example = peaks.first_time_string(bucket).unwrap_or("-");
        let _ = writeln!(
            out,
            "\n{:<12}: {:<6} ({}, e.g.: {})",
            "LOCKS",
            count,
            bucket.format("%Y-%m-%d %H:%M:%S"),
            example
        );
    }
    if let Some((bucket, count)) = peaks.top_connect_period() {
        let example = peaks.first_time_string(bucket).unwrap_or("-");
        let _ = writeln!(
            out,
            "\n{:<12}: {:<6} ({}, e.g.: {})",
            "CONNECTS",
            count,
            bucket.format("%Y-%m-%d %H:%M:%S"),
            example
        );
    }
}

fn run_histogram(
    files: &[String],
    cfg: &AnalyzerConfig,
    width: Duration,
    min_rank: u8,
    out: &mut Out,
) {
    let mut histogram = HistogramBucket::new(width);
    for file in files {
        process_file(file, cfg, |rec| histogram.add(&rec, min_rank));
    }

    for bucket in histogram.sorted_buckets() {
        let _ = writeln!(
            out,
            "{}  {:>8}",
            bucket.time.format("%Y-%m-%d %H:%M:%S"),
            bucket.count
        );
    }
    let _ = writeln!(out, "TOTAL: {}", histogram.total_events);
}

fn run_stats(files: &[String], cfg: &AnalyzerConfig, out: &mut Out) {
    let mut stats = StatsAggregator::new();
    for file in files {
        process_file(file, cfg, |rec| stats.add_event(&rec));
    }

    let report = stats.report();
    let span = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let _ = writeln!(
        out,
        "Events: {} ({} .. {})",
        report.total_events,
        span(report.first_event),
        span(report.last_event)
    );
    for (severity, count) in &report.severity_counts {
        let _ = writeln!(out, "  {:<12} {}", severity, count);
    }
    let _ = writeln!(
        out,
        "Connections: {} received, {} disconnections",
        report.connections_received, report.disconnections
    );
    if report.statement_count > 0 {
        let fmt_ms = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_default();
        let _ = writeln!(
            out,
            "Statements: {} timed, total {:.2} ms, p50: {} ms, p90: {} ms, p99: {} ms",
            report.statement_count,
            report.statement_total_ms,
            fmt_ms(report.statement_p50_ms),
            fmt_ms(report.statement_p90_ms),
            fmt_ms(report.statement_p99_ms)
        );
    }
    let _ = writeln!(
        out,
        "Checkpoints: {} timed, {} forced, longest {:.2} s",
        report.checkpoints_timed, report.checkpoints_forced, report.longest_checkpoint_secs
    );
    let _ = writeln!(
        out,
        "Autovacuum: {} vacuums, {} analyzes",
        report.autovacuum_count, report.autoanalyze_count
    );
    if report.autovacuum_count > 0 {
        let _ = writeln!(
            out,
            "  longest: {:.2} s ({}), avg rates: read {:.2} MB/s, write {:.2} MB/s",
            report.longest_autovacuum_secs,
            report.longest_autovacuum_table,
            report.avg_autovacuum_read_mbs,
            report.avg_autovacuum_write_mbs
        );
    }
}

fn run_connections(files: &[String], cfg: &AnalyzerConfig, out: &mut Out) {
    let mut conns = ConnectionsAggregator::new();
    for file in files {
        process_file(file, cfg, |rec| conns.add_event(&rec));
    }

    let report = conns.report();
    let _ = writeln!(
        out,
        "Connections: {} received, {} authorized, {} auth failures",
        report.received, report.authorized, report.failures
    );
    if let Some(rate) = report.success_rate {
        let _ = writeln!(out, "Success rate: {:.1}%", rate * 100.0);
    }
    if let Some(rate) = report.ssl_rate {
        let _ = writeln!(out, "SSL usage: {:.1}%", rate * 100.0);
    }
    if let Some((window, count)) = report.busiest_window {
        let _ = writeln!(
            out,
            "Busiest 10m window: {} ({} attempts)",
            window.format("%Y-%m-%d %H:%M:%S"),
            count
        );
    }

    let section = |title: &str, entries: &[(String, u64)], out: &mut Out| {
        if !entries.is_empty() {
            let _ = writeln!(out, "{}:", title);
            for (key, count) in entries {
                let _ = writeln!(out, "  {:<24} {}", key, count);
            }
        }
    };
    section("By host", &report.by_host, out);
    section("By user", &report.by_user, out);
    section("By database", &report.by_database, out);
    section("By application", &report.by_application, out);
}
