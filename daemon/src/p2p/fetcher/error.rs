use thiserror::Error;

/// Errors the engine itself can raise or receive from a collaborator.
///
/// Mirrors `chainfetch_common::error::ChainError` in spirit: a small typed
/// taxonomy rather than a single opaque string, so callers can match on the
/// irrecoverable cases without scraping messages.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("peer {0} sent an empty or missing reply")]
    EmptyOrMissingReply(String),

    #[error("peer {0} sent a malformed reply: {1}")]
    MalformedReply(String, String),

    #[error("request to peer {0} failed: {1}")]
    RequestError(String, String),

    #[error("request to peer {0} timed out")]
    Timeout(String),

    #[error("storage reported a reorg while storing job {0}")]
    ReorgHint(u64),

    #[error("storage rejected a write: {0}")]
    StoreError(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(&'static str),
}

impl FetcherError {
    /// Whether this error should stop the engine outright (spec §7) rather
    /// than simply recycle the job and peer.
    ///
    /// `EmptyOrMissingReply`, `MalformedReply`, `RequestError`, and `Timeout`
    /// are all recoverable: the job is re-queued and, for `Timeout`, the peer
    /// is banned, but the fetcher keeps running. `ReorgHint` is handled
    /// entirely outside this check (the sink rewrites the task and
    /// re-enqueues it without ever constructing a `FetcherError`). Only a
    /// rejected write or a violated invariant stops the engine.
    pub fn is_irrecoverable(&self) -> bool {
        matches!(
            self,
            FetcherError::StoreError(_) | FetcherError::InternalInvariantViolation(_)
        )
    }
}
