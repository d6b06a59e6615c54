//! Input path resolution: the "which files, in what order" collaborator.
//!
//! Explicit file arguments are kept in the order given; directories are
//! expanded recursively with the newest files first. When no paths are
//! given and stdin is piped, the stdin token is returned instead.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::assembler::STDIN_TOKEN;

/// Resolve CLI path arguments into an ordered list of log files.
///
/// Missing paths warn and are skipped — one bad argument must not prevent
/// the rest from being processed.
pub fn resolve_inputs(args: &[String]) -> Vec<String> {
    if args.is_empty() {
        if stdin_is_piped() {
            return vec![STDIN_TOKEN.to_string()];
        }
        return Vec::new();
    }

    let mut files = Vec::new();
    for arg in args {
        debug!("Checking input path: {}", arg);
        let path = Path::new(arg);
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => match log_files_newest_first(path) {
                Ok(found) => {
                    debug!("Found {} log files under {}", found.len(), arg);
                    files.extend(found);
                }
                Err(e) => warn!("Error scanning for log files in {}: {}", arg, e),
            },
            Ok(_) => files.push(arg.clone()),
            Err(e) => warn!("Error accessing path {}: {}", arg, e),
        }
    }
    files
}

/// Is data being piped into us?
pub fn stdin_is_piped() -> bool {
    !std::io::stdin().is_terminal()
}

/// All files under a directory, recursively, newest modification first.
fn log_files_newest_first(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    collect_files(dir, &mut found)?;
    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found
        .into_iter()
        .filter_map(|(_, p)| p.to_str().map(|s| s.to_string()))
        .collect())
}

fn collect_files(dir: &Path, found: &mut Vec<(SystemTime, PathBuf)>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_files(&path, found)?;
        } else {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((mtime, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_files_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "y").unwrap();

        let args = vec![
            b.to_str().unwrap().to_string(),
            a.to_str().unwrap().to_string(),
        ];
        let files = resolve_inputs(&args);
        assert_eq!(files, args);
    }

    #[test]
    fn test_directory_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(dir.path().join("one.log"), "x").unwrap();
        std::fs::write(sub.join("two.log"), "y").unwrap();

        let files = resolve_inputs(&[dir.path().to_str().unwrap().to_string()]);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_missing_path_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.log");
        std::fs::write(&real, "x").unwrap();

        let files = resolve_inputs(&[
            "/nonexistent/whatever.log".to_string(),
            real.to_str().unwrap().to_string(),
        ]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("real.log"));
    }
}
