use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating, reading and processing raw instrument data.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw-data folder holds no file following the experiment naming scheme.
    #[error("no experiments found in {}", folder.display())]
    NoExperimentsFound { folder: PathBuf },

    /// The requested experiment is neither a known label nor a known key.
    #[error("unknown experiment: {0}")]
    UnknownExperiment(String),

    /// A raw file name does not follow `<name>_<YYMMDD>_<HHMMSS>_c<cycle>_v<vial>`.
    #[error("file name does not match the raw data naming scheme: {}", path.display())]
    FilenamePatternMismatch { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raw payloads are flat f64 arrays, so the size must be a positive multiple of 8.
    #[error("{}: size of {size} bytes is not a positive multiple of 8", path.display())]
    InvalidFileSize { path: PathBuf, size: u64 },

    #[error("metadata table {}: {reason}", path.display())]
    MetadataParse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A run stamp that is not a `YYYYMMDDHHMMSS` instant.
    #[error("invalid run timestamp '{stamp}': {reason}")]
    InvalidTimestamp { stamp: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MetadataParse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Per-file failures collected during a run
// ---------------------------------------------------------------------------

/// A raw file that could not be turned into a measurement.
///
/// Failures are isolated to their file: the run keeps going and reports
/// them next to the peaks that were produced.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

impl FileFailure {
    /// Whether the file was skipped for its name rather than its content.
    pub fn is_name_mismatch(&self) -> bool {
        matches!(self.error, Error::FilenamePatternMismatch { .. })
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
