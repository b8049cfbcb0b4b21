//! Error types for simulator invocation and result parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Failures at the simulator boundary. These are captured per plan item;
/// the pipeline records the affected curve as NA and continues.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The simulator exited without producing a usable result file, or the
    /// run hit an abort / non-convergence marker. The message log is
    /// preserved regardless of the cleanup policy.
    #[error("simulation failed for {deck}: {detail}")]
    SimulationFailed { deck: PathBuf, detail: String },

    /// Simulator output could not be interpreted in the declared dialect.
    #[error("cannot parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    /// External cancellation (or wall-clock timeout, which shares the same
    /// termination path). Intermediate files are left in place.
    #[error("simulation cancelled")]
    Cancelled,
}

impl SimError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
