//! Error types for emission and checking.

use std::path::PathBuf;
use thiserror::Error;

/// The emitter could not write the output file, or the external checker
/// could not be launched. Fatal.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot run checker '{command}': {source}")]
    Checker {
        command: String,
        source: std::io::Error,
    },
}
