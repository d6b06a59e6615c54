//! Field extraction helpers over already-parsed message bodies: statement
//! durations, checkpoint/autovacuum metrics, connection key=value fields.

use std::sync::LazyLock;

use regex::Regex;

/// `duration: 0.211 ms`
static RE_DURATION_MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"duration:\s*([\d\.]+)\s*ms").unwrap());

/// Durations logged for the bind/parse protocol phases, which are not
/// statement executions.
static RE_DURATION_BIND_PARSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"duration:\s*[\d\.]+\s*ms\s+(?:bind|parse)\b").unwrap());

/// `... write=6.468 s, sync=0.036 s, total=6.517 s; ...`
static RE_CHECKPOINT_TOTAL_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"total=([\d\.]+) s;").unwrap());

/// `automatic vacuum of table "db.schema.tbl": ... elapsed: 2326.38 s`
static RE_AUTOVACUUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^automatic (analyze|vacuum) of table "(?P<table_name>[\w\.\-]+)".* elapsed: (?P<duration>[\d\.]+) s$"#,
    )
    .unwrap()
});

/// `avg read rate: 5.492 MB/s, avg write rate: 4.932 MB/s`
static RE_AUTOVACUUM_RATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"avg read rate: ([\d\.]+) MB/s, avg write rate: ([\d\.]+) MB/s").unwrap()
});

/// Statement duration in milliseconds, or `None` when the message carries
/// no duration.
pub fn duration_millis(message: &str) -> Option<f64> {
    let caps = RE_DURATION_MILLIS.captures(message)?;
    caps[1].parse().ok()
}

/// True for `duration: ... ms bind/parse` sub-messages, which log protocol
/// phases rather than statement executions.
pub fn duration_is_bind_or_parse(message: &str) -> bool {
    RE_DURATION_BIND_PARSE.is_match(message)
}

/// Total duration of a completed checkpoint in seconds.
pub fn checkpoint_duration_secs(message: &str) -> Option<f64> {
    let caps = RE_CHECKPOINT_TOTAL_SECONDS.captures(message)?;
    caps[1].parse().ok()
}

/// A completed autovacuum or autoanalyze run.
#[derive(Debug, Clone, PartialEq)]
pub struct AutovacuumEvent {
    pub is_analyze: bool,
    pub table_name: String,
    pub elapsed_secs: f64,
}

/// Parse an `automatic vacuum/analyze of table ...` completion message.
pub fn autovacuum_event(message: &str) -> Option<AutovacuumEvent> {
    let caps = RE_AUTOVACUUM.captures(message)?;
    let elapsed_secs: f64 = caps.name("duration")?.as_str().parse().ok()?;
    Some(AutovacuumEvent {
        is_analyze: &caps[1] == "analyze",
        table_name: caps.name("table_name")?.as_str().to_string(),
        elapsed_secs,
    })
}

/// Average read/write rates (MB/s) from an autovacuum completion message.
pub fn autovacuum_rates(message: &str) -> Option<(f64, f64)> {
    let caps = RE_AUTOVACUUM_RATES.captures(message)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Host from a `connection received: host=... port=...` message.
/// `[local]` (Unix socket) is reported as `local`.
pub fn connect_host(message: &str) -> Option<String> {
    let host = scan_value(message, "host=", &[' '])?;
    Some(if host == "[local]" {
        "local".to_string()
    } else {
        host
    })
}

/// Fields scanned from a `connection authorized: ...` message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizedConnection {
    pub user: String,
    pub database: String,
    pub application_name: String,
    pub ssl: bool,
}

/// Simple key=value scan of a `connection authorized` message — not a full
/// parse; the application name runs to end of line since it may itself
/// contain spaces.
pub fn connect_authorized_fields(message: &str) -> AuthorizedConnection {
    AuthorizedConnection {
        user: scan_value(message, "user=", &[' ']).unwrap_or_default(),
        database: scan_value(message, "database=", &[' ']).unwrap_or_default(),
        application_name: scan_value(message, "application_name=", &['\n']).unwrap_or_default(),
        ssl: message.contains("SSL enabled"),
    }
}

/// Value after `key` up to the first terminator (or end of string).
fn scan_value(message: &str, key: &str, terminators: &[char]) -> Option<String> {
    let start = message.find(key)? + key.len();
    let rest = &message[start..];
    let end = rest.find(terminators).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_millis() {
        let cases = [
            ("duration: 123 ms statement: SELECT * FROM table", Some(123.0)),
            ("2025-05-16 14:26:01.872 UTC [3076] LOG:  duration: 18.237 ms", Some(18.237)),
            ("LOG: statement executed, duration: 5.678 ms", Some(5.678)),
            ("LOG: statement executed without timing info", None),
        ];
        for (message, expected) in cases {
            assert_eq!(duration_millis(message), expected, "message: {}", message);
        }
    }

    #[test]
    fn test_duration_bind_parse_excluded() {
        assert!(duration_is_bind_or_parse("duration: 0.025 ms  parse <unnamed>: SELECT 1"));
        assert!(duration_is_bind_or_parse("duration: 0.012 ms  bind <unnamed>: SELECT 1"));
        assert!(!duration_is_bind_or_parse("duration: 18.237 ms"));
        assert!(!duration_is_bind_or_parse(
            "duration: 41147.417 ms execute <unnamed>: SELECT 1"
        ));
    }

    #[test]
    fn test_checkpoint_duration() {
        let msg = "checkpoint complete: wrote 66 buffers (0.4%); 0 WAL file(s) added, 0 removed, 0 recycled; write=6.468 s, sync=0.036 s, total=6.517 s; sync files=48, longest=0.009 s, average=0.001 s; distance=152 kB, estimate=152 kB";
        assert_eq!(checkpoint_duration_secs(msg), Some(6.517));
        assert_eq!(checkpoint_duration_secs("checkpoint starting: time"), None);
    }

    #[test]
    fn test_autovacuum_event() {
        let msg = "automatic vacuum of table \"shop.public.orders\": index scans: 1\n\tpages: 0 removed, 2153 remain\n\tavg read rate: 5.492 MB/s, avg write rate: 4.932 MB/s\n\tsystem usage: CPU: user: 0.01 s, system: 0.00 s, elapsed: 2326.38 s";
        let event = autovacuum_event(msg).unwrap();
        assert!(!event.is_analyze);
        assert_eq!(event.table_name, "shop.public.orders");
        assert_eq!(event.elapsed_secs, 2326.38);
        assert_eq!(autovacuum_rates(msg), Some((5.492, 4.932)));
    }

    #[test]
    fn test_autoanalyze_event() {
        let msg = "automatic analyze of table \"shop.public.orders\": system usage: CPU: user: 0.05 s, system: 0.01 s, elapsed: 12.77 s";
        let event = autovacuum_event(msg).unwrap();
        assert!(event.is_analyze);
        assert_eq!(event.elapsed_secs, 12.77);
        assert_eq!(autovacuum_rates(msg), None);
    }

    #[test]
    fn test_connect_host() {
        assert_eq!(
            connect_host("connection received: host=127.0.0.1 port=44410").as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(
            connect_host("connection received: host=[local]").as_deref(),
            Some("local")
        );
        assert_eq!(connect_host("disconnection: session time"), None);
    }

    #[test]
    fn test_connect_authorized_fields() {
        let fields = connect_authorized_fields(
            "connection authorized: user=krl database=postgres application_name=psql",
        );
        assert_eq!(fields.user, "krl");
        assert_eq!(fields.database, "postgres");
        assert_eq!(fields.application_name, "psql");
        assert!(!fields.ssl);

        let fields = connect_authorized_fields(
            "connection authorized: user=monitor database=bench SSL enabled (protocol=TLSv1.3, cipher=TLS_AES_256_GCM_SHA384, bits=256)",
        );
        assert_eq!(fields.user, "monitor");
        assert_eq!(fields.database, "bench");
        assert!(fields.ssl);
    }

    #[test]
    fn test_connect_authorized_appname_stops_at_newline() {
        let fields = connect_authorized_fields(
            "connection authorized: user=postgres database=postgres application_name=x\nERR:",
        );
        assert_eq!(fields.user, "postgres");
        assert_eq!(fields.database, "postgres");
        assert_eq!(fields.application_name, "x");
        assert!(!fields.ssl);
    }
}
