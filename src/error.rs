//! Error type shared by the launcher components.

use std::path::PathBuf;

use pyo3::PyErr;
use thiserror::Error;

/// Failures that stop the launcher before or while running the entry script.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A mandatory environment variable was not set by the host.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The working directory could not be changed to the argument root.
    #[error("cannot change directory to {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry script could not be opened for reading.
    #[error("cannot open entry script {path}: {source}")]
    EntryScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The interpreter rejected a bootstrap step.
    #[error("python: {0}")]
    Python(#[from] PyErr),
}

pub type Result<T> = std::result::Result<T, LaunchError>;
