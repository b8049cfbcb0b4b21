//! Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incomplete configuration input. Fatal at detection time; no
/// simulation is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Syntax error in the flat keyword form.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Structured-form deserialization failure.
    #[error("invalid {format} configuration: {message}")]
    InvalidFormat { format: &'static str, message: String },

    /// A required field or section is absent.
    #[error("missing required {kind}: {name}")]
    Missing { kind: &'static str, name: String },

    /// A value could not be interpreted as a number.
    #[error("invalid numeric value for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },

    /// A model type string outside the enumerated set.
    #[error("unknown model type '{0}'")]
    UnknownModelType(String),

    /// A pin references a model that is neither declared nor reserved.
    #[error("pin '{pin}' references unknown model '{model}'")]
    UnresolvedModel { pin: String, model: String },

    /// An enable/input/series directive names a pin that does not exist.
    #[error("pin '{pin}' references missing {role} pin '{target}'")]
    UnresolvedPin {
        pin: String,
        role: &'static str,
        target: String,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Missing or unreadable external resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("include file not found: {0}")]
    MissingInclude(PathBuf),

    #[error("SPICE netlist not found: {0}")]
    MissingSpiceFile(PathBuf),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Missing {
            kind,
            name: name.into(),
        }
    }
}
