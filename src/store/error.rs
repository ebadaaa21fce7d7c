use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures that must reach the caller: the in-memory readings and the last
/// file on disk stay authoritative when one of these is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not locate home directory")]
    NoHomeDirectory,

    #[error("cannot write {}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode JSON")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Adapter for `map_err` that tags an I/O failure with the path involved.
    pub(crate) fn at(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Recoverable outcomes of reading the data file. Every variant means "start
/// with an empty list", but callers can tell a brand-new location apart from a
/// damaged one.
#[derive(Debug, Error)]
pub enum LoadIssue {
    #[error("no data file at {} yet", .0.display())]
    Missing(PathBuf),

    #[error("data file {} could not be read", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("data file {} is not a list of readings", .path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadIssue {
    pub fn is_corrupted(&self) -> bool {
        matches!(self, LoadIssue::Corrupted { .. })
    }
}
