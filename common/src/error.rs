use thiserror::Error;

/// Errors produced by a `Chain` storage collaborator.
///
/// Kept separate from the engine's own `FetcherError` (in the `daemon`
/// crate) because a `Chain` implementation is supplied by the caller and may
/// be reused across more than one fetcher instance.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("parent header not found for block {0}")]
    ParentHeaderMissing(String),

    #[error("header {0} rejected: {1}")]
    Rejected(String, String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
