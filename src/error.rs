//! Error taxonomy for an organization run.
//!
//! Errors are split by how far they are allowed to travel:
//! - [`ExtractionError`] never leaves the sampler; it degrades to an empty sample.
//! - [`OracleError`] never leaves the stage that called the oracle; it degrades
//!   to that stage's fallback.
//! - [`OrganizeError`] stops the current file (it is reported as skipped), except
//!   for [`OrganizeError::InvalidRoot`], which aborts the whole run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to pull a text sample out of a file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("text extraction failed for {path}: {source}")]
    Oracle { path: PathBuf, source: OracleError },
}

/// Failure of an external judgment service.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The oracle is not configured (no API key, binary missing, ...).
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle request failed: {0}")]
    Http(String),

    #[error("oracle process failed: {0}")]
    Process(String),

    /// The oracle answered, but not in the shape we asked for.
    #[error("malformed oracle reply: {0}")]
    Malformed(String),
}

/// Result type for oracle calls.
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors that can occur while organizing files.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root directory itself cannot be used. This is the only run-level abort.
    #[error("invalid root directory {path}: {source}")]
    InvalidRoot { path: PathBuf, source: io::Error },

    #[error("filesystem error on {path}: {source}")]
    Filesystem { path: PathBuf, source: io::Error },

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to move {from} to {to}: {source}")]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Something appeared at the destination between resolution and the move.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("no free name for '{base}{ext}' in {dir} after {attempts} attempts")]
    ConflictExhausted {
        dir: PathBuf,
        base: String,
        ext: String,
        attempts: u32,
    },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl OrganizeError {
    /// Wraps an IO error that happened while handling `path`.
    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_exhausted_message() {
        let err = OrganizeError::ConflictExhausted {
            dir: PathBuf::from("/tmp/Docs"),
            base: "Report".to_string(),
            ext: ".pdf".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "no free name for 'Report.pdf' in /tmp/Docs after 3 attempts"
        );
    }

    #[test]
    fn test_oracle_timeout_message() {
        let err = OracleError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "oracle timed out after 5s");
    }
}
