// Persistence errors

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode time series: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encode table: {0}")]
    Csv(#[from] csv::Error),
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Finalization failed; carries what the session had collected by then.
#[derive(Debug, thiserror::Error)]
#[error("finalize after {samples} samples ({failed_writes} failed writes): {source}")]
pub struct SessionError {
    pub samples: usize,
    pub failed_writes: u64,
    #[source]
    pub source: WriteError,
}
