use thiserror::Error;

/// Storage read failure, surfaced as the loader's `Errored` phase.
///
/// Never retried automatically; the next visibility transition or an
/// explicit `reload()` retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Storage read failed: {0}")]
    Storage(String),

    #[error("Scope not found: {0}")]
    NotFound(String),
}

/// Storage write failure, surfaced as the saver's `Failed` status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("Storage write failed: {0}")]
    Storage(String),

    #[error("Update rejected: {0}")]
    Rejected(String),
}
