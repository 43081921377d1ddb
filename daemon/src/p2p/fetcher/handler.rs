use async_trait::async_trait;

use super::error::FetcherError;
use super::job::{Job, RangeTask};
use super::peer::PeerPool;

/// What `FetchHandler::process` made of one resolved reply.
pub enum ProcessOutcome<I> {
    /// The reply, combined with any earlier partial result, covers the
    /// job's full task. Ready to hand to storage.
    Complete(Vec<I>),

    /// The reply covered only a prefix of the task. `items` is the new,
    /// full accumulated partial result (not just the new increment); the
    /// job is re-enqueued and dispatched again for the remainder.
    Partial(Vec<I>),

    /// The reply, once interpreted, carried nothing at all. Distinct from
    /// `Malformed` because the spec gives it different peer-release timing:
    /// the peer is released only after `interval`, not immediately.
    Empty,

    /// The reply could not be interpreted. The job is re-enqueued unchanged.
    Malformed,
}

/// What storage made of a completed job's items (spec §4.5).
pub enum StoreOutcome {
    /// `accepted` items were durably written.
    Stored(usize),

    /// Storage detected that the job's range no longer attaches to its
    /// chain tip. The engine rewinds the job's task and re-enqueues it.
    Reorg,

    /// Storage rejected the write outright; treated as irrecoverable.
    Fatal(FetcherError),
}

/// The specialization point: everything about *what* is being fetched, as
/// opposed to the engine's generic *how* (spec §4 intro, §6).
///
/// One `Engine<H>` is generic over exactly one `FetchHandler`, matching the
/// spec's framing of the header-fetch flow (§4.6) as one instantiation of a
/// reusable core rather than a bespoke implementation.
#[async_trait]
pub trait FetchHandler: Send + Sync {
    type Task: RangeTask;
    type Reply: Send + 'static;
    type Item: Clone + Send + Sync + 'static;
    type Pool: PeerPool;

    fn pool(&self) -> &Self::Pool;

    /// Picks a peer to serve `job`. Defaults to any idle pool member;
    /// specializations with stricter requirements (e.g. only peers that
    /// serve headers) override this.
    async fn peer(&self, _job: &Job<Self::Task, Self::Item>) -> Option<<Self::Pool as PeerPool>::Peer> {
        self.pool().idle(None).await
    }

    /// Sends the request for `job` to `peer`. Returns `Ok(None)` when the
    /// handler decides, after inspecting the peer, that it cannot actually
    /// serve this job right now (the job is simply re-enqueued with no
    /// error and no ban).
    async fn request(
        &self,
        job: &Job<Self::Task, Self::Item>,
        peer: &<Self::Pool as PeerPool>::Peer,
    ) -> Result<Option<Self::Reply>, FetcherError>;

    /// Interprets a resolved, non-empty-at-the-wire reply.
    async fn process(
        &self,
        job: &Job<Self::Task, Self::Item>,
        reply: Self::Reply,
    ) -> ProcessOutcome<Self::Item>;

    /// Durably stores a completed job's items, in emit order.
    async fn store(&self, items: Vec<Self::Item>) -> StoreOutcome;

    /// Called once per scheduler tick before dispatch; a handler may push
    /// additional tasks here (e.g. once storage's tip has advanced) via
    /// `enqueue`.
    async fn next_tasks(&self, _enqueue: &mut dyn FnMut(Self::Task)) {}
}
