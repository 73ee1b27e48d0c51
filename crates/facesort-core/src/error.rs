use std::path::PathBuf;
use thiserror::Error;

use crate::types::ExtractError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid image path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },
    #[error("invalid directory {}: {reason}", .path.display())]
    InvalidDirectory { path: PathBuf, reason: String },
    #[error("no face recognised in training image {}", .0.display())]
    NoFaceDetected(PathBuf),
    #[error("no encoding cache found under {}", .0.display())]
    CacheMissing(PathBuf),
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("malformed encoding file {}: {reason}", .path.display())]
    Encoding { path: PathBuf, reason: String },
    #[error("feature extraction failed for {}: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("bad layout configuration: {0}")]
    Layout(String),
}

impl Error {
    /// Wrap an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_dir(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidDirectory {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
