//! Pipelined, multi-peer fetch engine that reconstructs a contiguous range
//! of artifacts in order, one job per sub-range, with several requests
//! concurrently in flight (spec §1).
//!
//! The engine runs on a single logical task: concurrency comes from having
//! several requests awaiting replies at once (`FuturesUnordered`), not from
//! spawning extra tasks. All state below is mutated from exactly one place,
//! `fetch`'s loop, which is why none of it needs a lock.

mod assembler;
mod config;
mod emit;
mod error;
mod events;
mod failure;
mod handler;
mod job;
mod peer;
mod queue;
mod scheduler;
mod sink;

pub use config::EngineConfig;
pub use error::FetcherError;
pub use events::{Events, FetchEvent, NullEvents};
pub use handler::{FetchHandler, ProcessOutcome, StoreOutcome};
pub use job::{BlockRange, Job, JobState, RangeTask};
pub use peer::{PeerHandle, PeerPool};
pub use queue::OrderedQueue;

pub mod header;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::time::{error::Elapsed, Instant};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Result of one in-flight request once it resolves (or times out).
type Completion<H> = (
    u64,
    u64,
    <<H as FetchHandler>::Pool as PeerPool>::Peer,
    Result<Result<Option<<H as FetchHandler>::Reply>, FetcherError>, Elapsed>,
);

/// A peer whose return to the idle pool is deferred until `at` (spec §4.4,
/// empty-reply release timing).
struct DelayedRelease<P> {
    at: Instant,
    peer: P,
}

impl<P> PartialEq for DelayedRelease<P> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}
impl<P> Eq for DelayedRelease<P> {}
impl<P> PartialOrd for DelayedRelease<P> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<P> Ord for DelayedRelease<P> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at)
    }
}

/// A job kept out of the ordered queues while a request for it is in flight,
/// paired with the peer serving it (spec §3 invariant 2: a job lives in
/// exactly one of inbound, outbound, or "active").
struct ActiveJob<H: FetchHandler> {
    job: Job<H::Task, H::Item>,
    peer: <H::Pool as PeerPool>::Peer,
}

/// The engine itself. Generic over one `FetchHandler`, which supplies the
/// task/reply/item types and the request/process/store behavior; everything
/// else here is the reusable core (spec §1, §4).
pub struct Engine<H: FetchHandler> {
    handler: Arc<H>,
    config: EngineConfig,
    events: Arc<dyn Events>,

    inbound: OrderedQueue<H::Task, H::Item>,
    outbound: OrderedQueue<H::Task, H::Item>,
    active: HashMap<u64, ActiveJob<H>>,
    in_flight: FuturesUnordered<BoxFuture<Completion<H>>>,
    delayed_releases: BinaryHeap<Reverse<DelayedRelease<<H::Pool as PeerPool>::Peer>>>,

    emit_tx: mpsc::Sender<Job<H::Task, H::Item>>,
    emit_rx: mpsc::Receiver<Job<H::Task, H::Item>>,

    next_index: u64,
    total: u64,
    processed: u64,
    finished: u64,
    running: bool,
    errored: Option<FetcherError>,
}

impl<H: FetchHandler> Engine<H> {
    pub fn new(handler: H, config: EngineConfig) -> Self {
        Self::with_events(handler, config, Arc::new(NullEvents))
    }

    pub fn with_events(handler: H, config: EngineConfig, events: Arc<dyn Events>) -> Self {
        let (emit_tx, emit_rx) = mpsc::channel(config.max_queue.max(1));
        Self {
            handler: Arc::new(handler),
            config,
            events,
            inbound: OrderedQueue::new(),
            outbound: OrderedQueue::new(),
            active: HashMap::new(),
            in_flight: FuturesUnordered::new(),
            delayed_releases: BinaryHeap::new(),
            emit_tx,
            emit_rx,
            next_index: 0,
            total: 0,
            processed: 0,
            finished: 0,
            running: false,
            errored: None,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Enqueues one more task, assigning it the next job index.
    pub fn enqueue(&mut self, task: H::Task) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.total += 1;
        self.inbound.push(Job::new(index, task));
        index
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn finished(&self) -> u64 {
        self.finished
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn done(&self) -> bool {
        self.inbound.is_empty()
            && self.outbound.is_empty()
            && self.active.is_empty()
            && self.in_flight.is_empty()
            && self.finished >= self.total
    }

    async fn emit_event(&self, event: FetchEvent<'_>) {
        if self.running || matches!(event, FetchEvent::FetchedHeaders { .. }) {
            self.events.notify(event).await;
        }
    }
}
