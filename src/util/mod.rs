//! Utility modules for pgsift.

pub mod time;

pub use time::{
    TimeParseError, fits_range, parse_human_time, parse_interval_millis, parse_log_time,
};
