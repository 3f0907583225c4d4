use std::path::PathBuf;

/// Errors surfaced by the classloading engine.
///
/// `NotFound` is recoverable at exactly two protocol points: the task
/// loader's upward delegation and the dependency loader's reverse edge.
/// Everywhere else it propagates unchanged. `PoolClosed` and
/// `StagingFailure` are always surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("class or resource not found: {0}")]
    NotFound(String),

    #[error("loader pool is closed; clear caches and retry")]
    PoolClosed,

    #[error("failed to stage native library '{name}' from {source_path}: {source}")]
    StagingFailure {
        name: String,
        source_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound(name.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
