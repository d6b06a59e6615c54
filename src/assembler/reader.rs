//! Byte sources for the assembler: plain files, stdin, transparent gzip.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use flate2::read::GzDecoder;

/// Path token meaning "read standard input".
pub const STDIN_TOKEN: &str = "stdin";

/// Open a line source for a log file path.
///
/// `stdin` reads standard input; a `.gz` suffix gets a transparent
/// decompression wrapper. The reader owns every handle it wraps, so close
/// happens on all exit paths, including mid-scan errors.
pub fn open_log_reader(path: &str) -> io::Result<Box<dyn BufRead + Send>> {
    if path == STDIN_TOKEN {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path)?;
    if path.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
