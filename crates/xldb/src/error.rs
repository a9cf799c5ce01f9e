use thiserror::Error;

/// Errors that can abort a reload. Per the loader's failure-handling
/// contract, only a failure to obtain the snapshot tag aborts with no
/// mutation; anything from the record stream after that point is logged,
/// not propagated (see [`crate::load`]).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read snapshot tag: {0}")]
    SnapshotTag(#[source] anyhow::Error),

    #[error("failed to open record stream: {0}")]
    RecordStreamOpen(#[source] anyhow::Error),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
