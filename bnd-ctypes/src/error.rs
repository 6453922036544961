//! Error kinds raised by the type engine and the configuration loader.
//!
//! Per-declaration errors are recovered where they occur (logged, replaced by
//! the opaque-pointer fallback). Only configuration errors abort a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unbalanced brackets/parentheses or an unusable array dimension.
    #[error("malformed type spelling `{spelling}`: {reason}")]
    MalformedTypeSpelling { spelling: String, reason: String },

    /// An alias chain that never reaches a non-alias spelling.
    #[error("typedef `{alias}` is part of a cyclic alias chain")]
    CyclicTypedef { alias: String },

    #[error("config file {} not found", path.display())]
    MissingConfig { path: PathBuf },

    #[error("config file {}: {reason}", path.display())]
    MalformedConfig { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn malformed(spelling: &str, reason: impl Into<String>) -> Self {
        Error::MalformedTypeSpelling {
            spelling: spelling.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
