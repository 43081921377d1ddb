use async_trait::async_trait;

use super::error::FetcherError;

/// Notifications the engine raises as it runs (spec §4.7, §4.6).
///
/// Kept as an enum rather than one method per event so a single `Events`
/// implementor can match exhaustively and so adding an event later doesn't
/// change the trait's method set.
#[derive(Debug)]
pub enum FetchEvent<'a> {
    /// Raised whenever a recoverable or irrecoverable error occurs while the
    /// engine is still running, carrying the job index and peer description
    /// that were involved, if any.
    FetcherError {
        error: &'a FetcherError,
        job_index: u64,
        peer: Option<String>,
    },

    /// Raised by the header specialization after `Chain::put_headers`
    /// accepts a (possibly partial) prefix of a reply.
    FetchedHeaders { accepted: usize },
}

/// External collaborator notified of engine activity (spec §6 "Events").
///
/// Implementations typically forward these onto an application-wide event
/// bus; the default no-op lets tests and small embeddings ignore them.
#[async_trait]
pub trait Events: Send + Sync {
    async fn notify(&self, event: FetchEvent<'_>);
}

/// An `Events` implementation that drops everything on the floor.
pub struct NullEvents;

#[async_trait]
impl Events for NullEvents {
    async fn notify(&self, _event: FetchEvent<'_>) {}
}
