use std::path::PathBuf;
use thiserror::Error;

/// Journal failures
///
/// Absent files are not errors: loads return `None` and scans skip.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to overwrite existing file {0}")]
    AlreadyExists(PathBuf),
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }
}
