use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync line not found: {0}")]
    LineNotFound(String),
    #[error("only {matched} barcode(s) shared between clocks; need at least 2 to align")]
    InsufficientOverlap { matched: usize },
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("no epoch within {tolerance_pct}% of {expected} frames for stimulus {stimulus}")]
    EpochMatch {
        stimulus: usize,
        expected: usize,
        tolerance_pct: f64,
    },
    #[error("failed to read {}: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metrics table: {0}")]
    Csv(#[from] csv::Error),
    #[error("bad metrics table {}: {reason}", path.display())]
    Metrics { path: PathBuf, reason: String },
    #[error("config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("probe worker panicked")]
    WorkerPanicked,
}
impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}
