//! External IBIS checker invocation.
//!
//! The checker is a user-supplied executable (`--ibischk PATH`); it consumes
//! the emitted `.ibs` file and reports through its exit code and log text.
//! Both are preserved: the raw log next to the model, plus a structured JSON
//! summary.

use crate::error::EmitError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Parsed outcome of one checker run.
#[derive(Clone, Debug, Serialize)]
pub struct CheckSummary {
    pub checker: String,
    pub target: PathBuf,
    pub exit_code: i32,
    pub errors: usize,
    pub warnings: usize,
    pub log_file: PathBuf,
}

impl CheckSummary {
    pub fn clean(&self) -> bool {
        self.exit_code == 0 && self.errors == 0
    }
}

/// Run the checker over `ibs_path`, writing `{file_stem}.ibischk_log.txt`
/// and `{file_stem}.ibischk_summary.json` into `outdir`.
pub fn run_checker(
    checker: &Path,
    ibs_path: &Path,
    outdir: &Path,
) -> Result<CheckSummary, EmitError> {
    let output = Command::new(checker)
        .arg(ibs_path)
        .output()
        .map_err(|source| EmitError::Checker {
            command: checker.display().to_string(),
            source,
        })?;

    let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
    log.push_str(&String::from_utf8_lossy(&output.stderr));

    let stem = ibs_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let log_file = outdir.join(format!("{stem}.ibischk_log.txt"));
    std::fs::write(&log_file, &log).map_err(|source| EmitError::Write {
        path: log_file.clone(),
        source,
    })?;

    let summary = CheckSummary {
        checker: checker.display().to_string(),
        target: ibs_path.to_path_buf(),
        exit_code: output.status.code().unwrap_or(-1),
        errors: count_marked_lines(&log, "ERROR"),
        warnings: count_marked_lines(&log, "WARNING"),
        log_file: log_file.clone(),
    };

    let json_file = outdir.join(format!("{stem}.ibischk_summary.json"));
    let json = serde_json::to_string_pretty(&summary).expect("summary serializes");
    std::fs::write(&json_file, json).map_err(|source| EmitError::Write {
        path: json_file,
        source,
    })?;

    if summary.clean() {
        tracing::info!(log = %log_file.display(), "checker passed");
    } else {
        tracing::warn!(
            errors = summary.errors,
            warnings = summary.warnings,
            exit = summary.exit_code,
            log = %log_file.display(),
            "checker reported problems"
        );
    }
    Ok(summary)
}

fn count_marked_lines(log: &str, marker: &str) -> usize {
    log.lines()
        .filter(|l| l.to_ascii_uppercase().contains(marker))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_summary_counts_markers() {
        let dir = tempfile::tempdir().unwrap();
        let ibs = dir.path().join("buf.ibs");
        std::fs::write(&ibs, "[IBIS Ver] 3.2\n[End]\n").unwrap();

        // stand-in checker: cat prints the file, exit 0
        let summary = run_checker(Path::new("cat"), &ibs, dir.path()).unwrap();
        assert_eq!(summary.exit_code, 0);
        assert_eq!(summary.errors, 0);
        assert!(summary.clean());
        assert!(summary.log_file.exists());
        assert!(dir.path().join("buf.ibischk_summary.json").exists());
    }

    #[test]
    fn test_missing_checker_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ibs = dir.path().join("buf.ibs");
        std::fs::write(&ibs, "[End]\n").unwrap();
        let err = run_checker(Path::new("/nonexistent/ibischk"), &ibs, dir.path());
        assert!(matches!(err, Err(EmitError::Checker { .. })));
    }
}
