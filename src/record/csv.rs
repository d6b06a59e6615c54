//! PostgreSQL CSV log (csvlog) row schema.
//!
//! Column order is fixed by the server (the file-fdw documented layout).
//! Three schema widths exist: 23 columns through v12, 24 with
//! `backend_type` (v13), 26 with `leader_pid` and `query_id` (v14+).
//! The decoded struct is tagged with the observed width so pass-through
//! output reproduces the original schema exactly.

use tracing::warn;

/// Minimum number of columns for a valid csvlog row.
pub const MIN_CSV_COLUMNS: usize = 23;

/// One decoded csvlog row with every column by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRecord {
    /// Number of columns in the source row (23, 24 or 26).
    pub column_count: usize,
    pub log_time: String,
    pub user_name: String,
    pub database_name: String,
    pub process_id: String,
    pub connection_from: String,
    pub session_id: String,
    pub session_line_num: String,
    pub command_tag: String,
    pub session_start_time: String,
    pub virtual_transaction_id: String,
    pub transaction_id: String,
    pub error_severity: String,
    pub sql_state_code: String,
    pub message: String,
    pub detail: String,
    pub hint: String,
    pub internal_query: String,
    pub internal_query_pos: String,
    pub context: String,
    pub query: String,
    pub query_pos: String,
    pub location: String,
    pub application_name: String,
    /// v13+
    pub backend_type: String,
    /// v14+
    pub leader_pid: String,
    /// v14+
    pub query_id: String,
}

impl CsvRecord {
    /// Decode a row. Rows shorter than [`MIN_CSV_COLUMNS`] are malformed
    /// and yield `None` (skipped upstream, never fatal).
    pub fn from_row(row: &csv::StringRecord) -> Option<Self> {
        if row.len() < MIN_CSV_COLUMNS {
            warn!(
                "Skipping incomplete CSV record: {} fields, expected at least {}",
                row.len(),
                MIN_CSV_COLUMNS
            );
            return None;
        }

        let field = |i: usize| row.get(i).unwrap_or("").to_string();

        let mut rec = Self {
            column_count: row.len(),
            log_time: field(0),
            user_name: field(1),
            database_name: field(2),
            process_id: field(3),
            connection_from: field(4),
            session_id: field(5),
            session_line_num: field(6),
            command_tag: field(7),
            session_start_time: field(8),
            virtual_transaction_id: field(9),
            transaction_id: field(10),
            error_severity: field(11),
            sql_state_code: field(12),
            message: field(13),
            detail: field(14),
            hint: field(15),
            internal_query: field(16),
            internal_query_pos: field(17),
            context: field(18),
            query: field(19),
            query_pos: field(20),
            location: field(21),
            application_name: field(22),
            ..Default::default()
        };
        if row.len() >= 24 {
            rec.backend_type = field(23);
        }
        if row.len() >= 26 {
            rec.leader_pid = field(24);
            rec.query_id = field(25);
        }
        Some(rec)
    }

    /// All fields in column order, truncated to the observed width.
    pub fn fields(&self) -> Vec<&str> {
        let all = [
            self.log_time.as_str(),
            self.user_name.as_str(),
            self.database_name.as_str(),
            self.process_id.as_str(),
            self.connection_from.as_str(),
            self.session_id.as_str(),
            self.session_line_num.as_str(),
            self.command_tag.as_str(),
            self.session_start_time.as_str(),
            self.virtual_transaction_id.as_str(),
            self.transaction_id.as_str(),
            self.error_severity.as_str(),
            self.sql_state_code.as_str(),
            self.message.as_str(),
            self.detail.as_str(),
            self.hint.as_str(),
            self.internal_query.as_str(),
            self.internal_query_pos.as_str(),
            self.context.as_str(),
            self.query.as_str(),
            self.query_pos.as_str(),
            self.location.as_str(),
            self.application_name.as_str(),
            self.backend_type.as_str(),
            self.leader_pid.as_str(),
            self.query_id.as_str(),
        ];
        let count = self.column_count.clamp(MIN_CSV_COLUMNS, all.len());
        all[..count].to_vec()
    }

    /// Re-serialize at the exact observed column count, with RFC4180
    /// doubled-quote escaping for fields containing commas, quotes or
    /// newlines. No trailing newline.
    pub fn to_csv_line(&self) -> String {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        // Writing a record of strings cannot fail on a Vec sink
        writer
            .write_record(self.fields())
            .expect("csv write to memory");
        let bytes = writer.into_inner().expect("csv flush to memory");
        let mut line = String::from_utf8(bytes).expect("csv output is utf-8");
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW_23: &str = "2025-05-02 18:18:26.523 EEST,krl,postgres,2240722,127.0.0.1:44410,6814f2a2.222f2,1,SELECT,2025-05-02 18:18:20 EEST,3/44,0,ERROR,42703,column does not exist,,,,,,select asdasd,8,,psql";

    fn decode(line: &str) -> CsvRecord {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        let row = rdr.records().next().unwrap().unwrap();
        CsvRecord::from_row(&row).unwrap()
    }

    #[test]
    fn test_decode_23_columns() {
        let rec = decode(ROW_23);
        assert_eq!(rec.column_count, 23);
        assert_eq!(rec.log_time, "2025-05-02 18:18:26.523 EEST");
        assert_eq!(rec.user_name, "krl");
        assert_eq!(rec.error_severity, "ERROR");
        assert_eq!(rec.message, "column does not exist");
        assert_eq!(rec.application_name, "psql");
        assert_eq!(rec.backend_type, "");
    }

    #[test]
    fn test_decode_26_columns() {
        let line = format!("{},client backend,,123", ROW_23);
        let rec = decode(&line);
        assert_eq!(rec.column_count, 26);
        assert_eq!(rec.backend_type, "client backend");
        assert_eq!(rec.leader_pid, "");
        assert_eq!(rec.query_id, "123");
    }

    #[test]
    fn test_too_short_row_rejected() {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader("a,b,c".as_bytes());
        let row = rdr.records().next().unwrap().unwrap();
        assert!(CsvRecord::from_row(&row).is_none());
    }

    #[test]
    fn test_round_trip_plain_row() {
        let rec = decode(ROW_23);
        assert_eq!(rec.to_csv_line(), ROW_23);
    }

    #[test]
    fn test_round_trip_quoted_fields() {
        let line = r#"2025-05-02 18:18:26.523 EEST,krl,postgres,1,host,sid,1,SELECT,start,3/44,0,ERROR,42703,"relation ""users"" does not exist",,,,,,"select a, b",8,,psql"#;
        let rec = decode(line);
        assert_eq!(rec.message, r#"relation "users" does not exist"#);
        assert_eq!(rec.query, "select a, b");
        assert_eq!(rec.to_csv_line(), line);
    }

    #[test]
    fn test_round_trip_embedded_newline() {
        let line = "t,u,d,1,h,s,1,SELECT,st,3/44,0,LOG,00000,\"line one\nline two\",,,,,,q,8,,app";
        let rec = decode(line);
        assert_eq!(rec.message, "line one\nline two");
        assert_eq!(rec.to_csv_line(), line);
    }

    #[test]
    fn test_round_trip_preserves_width() {
        let line24 = format!("{},client backend", ROW_23);
        let rec = decode(&line24);
        assert_eq!(rec.column_count, 24);
        assert_eq!(rec.to_csv_line(), line24);
    }
}
