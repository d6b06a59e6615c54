//! Time parsing for PostgreSQL log timestamps and human CLI input.
//!
//! Two distinct parsers live here:
//! - [`parse_log_time`] normalizes the timestamp strings PostgreSQL writes
//!   into log lines (fractional-second + zone abbreviation, the RDS variant
//!   without milliseconds, and bare epoch floats from `%n` prefixes).
//! - [`parse_human_time`] converts operator input (`-2h`, `3d`, `today`,
//!   `1 hour ago`, short dates, full timestamps) into absolute times
//!   anchored to a caller-supplied reference.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Error type for human time / interval parsing failures.
#[derive(Debug, Clone)]
pub struct TimeParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to parse time '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for TimeParseError {}

/// Parse a timestamp string as it appears in a PostgreSQL log line.
///
/// Tried in order:
/// 1. Bare float — Unix epoch seconds with fractional sub-second precision
///    (the `log_line_prefix = '%n'` format).
/// 2. `YYYY-MM-DD HH:MM:SS.mmm ZZZ` — the default `%m` format.
/// 3. `YYYY-MM-DD HH:MM:SS ZZZ` — the `%t` format (also what managed-cloud
///    logs emit, without sub-second precision).
///
/// Numeric zone tokens (`+08`, `-0530`, `+05:30`) are applied as fixed
/// offsets; alphabetic abbreviations (EEST, UTC, GMT) keep the wall-clock
/// time as-is. On failure a warning is logged and `None` is returned —
/// `None` is the "unknown time" sentinel and must never be treated as a
/// real epoch-midnight timestamp by range filters.
pub fn parse_log_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Epoch float a la 1748867052.006
    if let Ok(epoch) = s.parse::<f64>() {
        let secs = epoch.trunc() as i64;
        let nanos = ((epoch - epoch.trunc()) * 1e9) as u32;
        return Utc.timestamp_opt(secs, nanos).single();
    }

    // Split the trailing zone token off: "2025-04-28 00:20:02.274 EEST"
    let (datetime_part, zone_part) = match s.rsplit_once(' ') {
        Some((dt, zone)) if !zone.is_empty() => (dt, zone),
        _ => {
            warn!("Failed to parse log time string '{}'", s);
            return None;
        }
    };

    let naive = NaiveDateTime::parse_from_str(datetime_part, "%Y-%m-%d %H:%M:%S%.3f")
        .or_else(|_| NaiveDateTime::parse_from_str(datetime_part, "%Y-%m-%d %H:%M:%S"));
    let naive = match naive {
        Ok(n) => n,
        Err(_) => {
            warn!("Failed to parse log time string '{}'", s);
            return None;
        }
    };

    if let Some(offset) = parse_numeric_zone(zone_part) {
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc));
    }

    // Alphabetic abbreviation: keep the wall-clock reading
    Some(Utc.from_utc_datetime(&naive))
}

/// Parses `+08`, `-05`, `+0530`, `+05:30` into a fixed offset.
fn parse_numeric_zone(zone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match zone.bytes().next()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits = digits.replace(':', "");
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (
            digits[..2].parse::<i32>().ok()?,
            digits[2..].parse::<i32>().ok()?,
        ),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a human time expression into an absolute time.
///
/// Supported, tried in order:
/// - `today` — midnight of the reference day
/// - relative deltas: `-2h`, `-10m`, `5 min`, `30s` (a delta without a sign
///   is also interpreted as "that long ago"); day units (`3d`, `2 days`)
///   are converted to hours first since the duration grammar has no day unit
/// - full timestamps (same formats as [`parse_log_time`])
/// - short dates: `2025-05-02` (midnight)
/// - natural phrases: `1 hour ago`, `2 days ago`
pub fn parse_human_time(
    input: &str,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimeParseError {
            input: input.to_string(),
            message: "empty time expression".to_string(),
        });
    }

    if input.eq_ignore_ascii_case("today") {
        let midnight = reference.date_naive().and_hms_opt(0, 0, 0).unwrap();
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    if let Some(delta) = try_parse_delta(input) {
        // Deltas always point into the past relative to the reference
        return Ok(reference - Duration::milliseconds(delta.unsigned_abs() as i64));
    }

    if let Some(t) = parse_log_time_quiet(input) {
        return Ok(t);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    if let Some(delta_ms) = try_parse_ago_phrase(input) {
        return Ok(reference - Duration::milliseconds(delta_ms as i64));
    }

    Err(TimeParseError {
        input: input.to_string(),
        message: "unsupported time delta / timestamp format. Use: relative \
                  (-2h, 3d, 5 min), 'today', a date (2025-05-02), a full \
                  timestamp (2025-05-02 12:00:00.000 UTC), or '1 hour ago'"
            .to_string(),
    })
}

/// `parse_log_time` without the warning, for probing alternate formats.
fn parse_log_time_quiet(s: &str) -> Option<DateTime<Utc>> {
    if s.parse::<f64>().is_ok() {
        return parse_log_time(s);
    }
    let (datetime_part, zone_part) = s.rsplit_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(datetime_part, "%Y-%m-%d %H:%M:%S%.3f")
        .or_else(|_| NaiveDateTime::parse_from_str(datetime_part, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    if let Some(offset) = parse_numeric_zone(zone_part) {
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc));
    }
    Some(Utc.from_utc_datetime(&naive))
}

/// Parse `-2h` / `5m` / `3d` / `5 min` into signed milliseconds.
fn try_parse_delta(input: &str) -> Option<i64> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let (sign, rest) = match compact.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, compact.as_str()),
    };

    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let number: i64 = rest[..digits_end].parse().ok()?;
    let unit_ms = unit_to_millis(&rest[digits_end..])?;
    Some(sign * number * unit_ms)
}

/// Parse `1 hour ago` / `2 days ago` into milliseconds before the reference.
fn try_parse_ago_phrase(input: &str) -> Option<u64> {
    let rest = input.strip_suffix("ago")?.trim();
    let (number_str, unit) = rest.split_once(' ')?;
    let number: u64 = match number_str {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };
    let unit_ms = unit_to_millis(unit.trim())? as u64;
    Some(number * unit_ms)
}

/// Millisecond multiplier for a duration unit, including common aliases.
fn unit_to_millis(unit: &str) -> Option<i64> {
    let unit = unit.to_ascii_lowercase();
    if matches!(unit.as_str(), "ms" | "msec" | "msecs" | "millis") {
        return Some(1);
    }
    // Plural aliases collapse onto the singular ("mins" -> "min")
    match unit.trim_end_matches('s') {
        "" | "sec" | "second" => Some(1000), // bare "s" is stripped to ""
        "m" | "min" | "minute" => Some(60_000),
        "h" | "hr" | "hour" => Some(3_600_000),
        "d" | "day" => Some(86_400_000),
        "w" | "week" => Some(604_800_000),
        _ => None,
    }
}

/// Parse an interval like `500`, `1s`, `5 min`, `2h` into milliseconds.
///
/// A bare number is taken as milliseconds.
pub fn parse_interval_millis(interval: &str) -> Result<u64, TimeParseError> {
    let compact: String = interval.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(TimeParseError {
            input: interval.to_string(),
            message: "empty interval".to_string(),
        });
    }

    if let Ok(ms) = compact.parse::<u64>() {
        return Ok(ms);
    }

    let digits_end = compact
        .find(|c: char| !c.is_ascii_digit())
        .filter(|&i| i > 0)
        .ok_or_else(|| TimeParseError {
            input: interval.to_string(),
            message: "expected a number followed by a unit (ms, s, m, h, d)".to_string(),
        })?;
    let number: u64 = compact[..digits_end].parse().map_err(|_| TimeParseError {
        input: interval.to_string(),
        message: "invalid number".to_string(),
    })?;
    let unit_ms = unit_to_millis(&compact[digits_end..]).ok_or_else(|| TimeParseError {
        input: interval.to_string(),
        message: format!("unknown unit '{}'", &compact[digits_end..]),
    })?;

    Ok(number * unit_ms as u64)
}

/// Range check with the unknown-time rule: when either bound is set, a
/// record whose time could not be parsed is excluded rather than compared
/// as if it were the epoch.
pub fn fits_range(
    t: Option<DateTime<Utc>>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(t) = t else {
        return false;
    };
    if let Some(from) = from
        && t < from
    {
        return false;
    }
    if let Some(to) = to
        && t > to
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_time_with_millis_and_abbreviation() {
        let t = parse_log_time("2025-05-02 12:27:52.634 EEST").unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 634);
        assert_eq!(t.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-05-02 12:27:52");
    }

    #[test]
    fn test_log_time_without_millis() {
        let t = parse_log_time("2025-05-05 06:00:51 UTC").unwrap();
        assert_eq!(t.format("%H:%M:%S").to_string(), "06:00:51");
    }

    #[test]
    fn test_log_time_epoch_float() {
        let t = parse_log_time("1748867052.047").unwrap();
        assert_eq!(t.timestamp(), 1748867052);
        assert_eq!(t.timestamp_subsec_millis(), 46); // float truncation
    }

    #[test]
    fn test_log_time_numeric_offset() {
        let t = parse_log_time("2022-02-19 14:47:24 +08").unwrap();
        assert_eq!(t.format("%H:%M:%S").to_string(), "06:47:24");
    }

    #[test]
    fn test_log_time_garbage_is_none() {
        assert!(parse_log_time("").is_none());
        assert!(parse_log_time("not a time").is_none());
        assert!(parse_log_time("2025-13-99 99:99:99 UTC").is_none());
    }

    #[test]
    fn test_human_time_deltas() {
        let now = Utc::now();
        let cases = [
            ("-2h", 2 * 3600),
            ("-10m", 600),
            ("5m", 300),
            ("-48h", 48 * 3600),
            ("-30s", 30),
            ("5 min", 300),
        ];
        for (input, secs_ago) in cases {
            let got = parse_human_time(input, now).unwrap();
            assert_eq!(got, now - Duration::seconds(secs_ago), "input {}", input);
        }
    }

    #[test]
    fn test_human_time_day_units() {
        let now = Utc::now();
        assert_eq!(
            parse_human_time("3d", now).unwrap(),
            now - Duration::days(3)
        );
        assert_eq!(
            parse_human_time("-1d", now).unwrap(),
            now - Duration::days(1)
        );
    }

    #[test]
    fn test_human_time_today() {
        let reference = Utc.with_ymd_and_hms(2025, 5, 2, 18, 30, 0).unwrap();
        let got = parse_human_time("today", reference).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_human_time_ago_phrase() {
        let reference = Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap();
        assert_eq!(
            parse_human_time("1 hour ago", reference).unwrap(),
            reference - Duration::hours(1)
        );
        assert_eq!(
            parse_human_time("2 days ago", reference).unwrap(),
            reference - Duration::days(2)
        );
    }

    #[test]
    fn test_human_time_absolute() {
        let reference = Utc::now();
        let got = parse_human_time("2025-05-02 12:00:00.000 UTC", reference).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap());

        let got = parse_human_time("2025-05-02", reference).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_human_time_invalid() {
        assert!(parse_human_time("", Utc::now()).is_err());
        assert!(parse_human_time("gibberish", Utc::now()).is_err());
    }

    #[test]
    fn test_interval_millis() {
        assert_eq!(parse_interval_millis("500").unwrap(), 500);
        assert_eq!(parse_interval_millis("1s").unwrap(), 1000);
        assert_eq!(parse_interval_millis("5 min").unwrap(), 300_000);
        assert_eq!(parse_interval_millis("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_millis("1d").unwrap(), 86_400_000);
        assert!(parse_interval_millis("five").is_err());
        assert!(parse_interval_millis("").is_err());
    }

    #[test]
    fn test_fits_range_unknown_time() {
        let from = Some(Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
        let to = Some(Utc.with_ymd_and_hms(2025, 5, 3, 0, 0, 0).unwrap());
        let inside = Some(Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap());

        assert!(fits_range(inside, from, to));
        assert!(fits_range(inside, None, None));
        // Unknown time is excluded once any bound is set, on either side
        assert!(!fits_range(None, from, None));
        assert!(!fits_range(None, None, to));
        assert!(fits_range(None, None, None));
    }

    #[test]
    fn test_fits_range_bounds() {
        let from = Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 5, 3, 0, 0, 0).unwrap();
        let before = Some(from - Duration::hours(1));
        let after = Some(to + Duration::hours(1));

        assert!(!fits_range(before, Some(from), Some(to)));
        assert!(!fits_range(after, Some(from), Some(to)));
        assert!(fits_range(before, None, Some(to)));
        assert!(fits_range(after, Some(from), None));
    }
}
