//! Header specialization (spec §4.6): a light-client flow-controlled header
//! fetch built on the generic engine, wired to a `BlockRange` task and a
//! `Header` item.

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use chainfetch_common::error::ChainError;

use super::error::FetcherError;
use super::handler::{FetchHandler, ProcessOutcome, StoreOutcome};
use super::job::{BlockRange, Job};
use super::peer::{PeerHandle, PeerPool};

/// One header, opaque to the engine beyond what reorg detection needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub number: BigUint,
    pub hash: String,
    pub parent_hash: String,
}

/// Wire shape of a `GetBlockHeaders` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderReply {
    pub headers: Vec<Header>,
}

/// The network-capable half of a peer: whatever lets the handler actually
/// send a `GetBlockHeaders` request (spec §6 collaborator framing; the
/// bookkeeping half is `PeerPool`/`PeerHandle`).
#[async_trait]
pub trait HeaderPeer: PeerHandle {
    /// Whether this peer advertises the `serve_headers` capability.
    /// Defaults to `true` for peer handles that don't model capability
    /// flags at all.
    fn serves_headers(&self) -> bool {
        true
    }

    async fn get_block_headers(
        &self,
        start: &BigUint,
        count: u32,
        reverse: bool,
    ) -> Result<HeaderReply, FetcherError>;
}

/// Light-client flow control over header requests (spec §6 "FlowControl"):
/// caps how many headers may be requested of a peer in one round, and is
/// told how expensive the reply actually was so it can adjust its budget.
#[async_trait]
pub trait FlowControl<P>: Send + Sync {
    async fn max_request_count(&self, peer: &P, message_name: &str) -> u32;
    async fn handle_reply(&self, peer: &P, served: u32);
}

/// Storage for accepted headers (spec §6 "Chain").
#[async_trait]
pub trait Chain: Send + Sync {
    /// Stores as much of `headers` (an ordered prefix) as attaches to the
    /// chain's current tip, returning how many were accepted.
    async fn put_headers(&self, headers: Vec<Header>) -> Result<usize, ChainError>;
}

/// The `FetchHandler` for fetching headers (spec §4.6).
pub struct HeaderFetchHandler<P, F, C>
where
    P: PeerPool,
    P::Peer: HeaderPeer,
    F: FlowControl<P::Peer>,
    C: Chain,
{
    pool: P,
    flow_control: F,
    chain: C,
    /// Upper bound on how many headers one request may ask for, and the
    /// threshold a peer's flow-control credit must clear before it's used
    /// at all (spec §4.6, §6 "max_per_request").
    max_per_request: u32,
}

impl<P, F, C> HeaderFetchHandler<P, F, C>
where
    P: PeerPool,
    P::Peer: HeaderPeer,
    F: FlowControl<P::Peer>,
    C: Chain,
{
    pub fn new(pool: P, flow_control: F, chain: C, max_per_request: u32) -> Self {
        Self {
            pool,
            flow_control,
            chain,
            max_per_request,
        }
    }
}

#[async_trait]
impl<P, F, C> FetchHandler for HeaderFetchHandler<P, F, C>
where
    P: PeerPool,
    P::Peer: HeaderPeer,
    F: FlowControl<P::Peer>,
    C: Chain,
{
    type Task = BlockRange;
    type Reply = HeaderReply;
    type Item = Header;
    type Pool = P;

    fn pool(&self) -> &Self::Pool {
        &self.pool
    }

    async fn peer(&self, _job: &Job<Self::Task, Self::Item>) -> Option<P::Peer> {
        self.pool
            .idle(Some(|peer: &P::Peer| HeaderPeer::serves_headers(peer)))
            .await
    }

    async fn request(
        &self,
        job: &Job<Self::Task, Self::Item>,
        peer: &P::Peer,
    ) -> Result<Option<Self::Reply>, FetcherError> {
        let effective = job.effective_task();
        let allowed = self
            .flow_control
            .max_request_count(peer, "GetBlockHeaders")
            .await;
        if allowed < self.max_per_request {
            return Ok(None);
        }

        let count = effective.count.min(self.max_per_request);
        let reply = peer
            .get_block_headers(effective.start(), count, effective.reverse)
            .await?;

        self.flow_control
            .handle_reply(peer, reply.headers.len() as u32)
            .await;

        Ok(Some(reply))
    }

    async fn process(
        &self,
        job: &Job<Self::Task, Self::Item>,
        reply: Self::Reply,
    ) -> ProcessOutcome<Self::Item> {
        if reply.headers.is_empty() {
            return ProcessOutcome::Empty;
        }

        let mut combined = job.partial_result().map(|p| p.to_vec()).unwrap_or_default();
        combined.extend(reply.headers);

        let target = job.effective_task().count;
        if combined.len() as u32 >= target {
            combined.truncate(target as usize);
            ProcessOutcome::Complete(combined)
        } else {
            ProcessOutcome::Partial(combined)
        }
    }

    async fn store(&self, items: Vec<Self::Item>) -> StoreOutcome {
        match self.chain.put_headers(items).await {
            Ok(accepted) => StoreOutcome::Stored(accepted),
            Err(ChainError::ParentHeaderMissing(_)) => StoreOutcome::Reorg,
            Err(ChainError::Backend(msg)) if looks_like_reorg(&msg) => StoreOutcome::Reorg,
            Err(other) => StoreOutcome::Fatal(FetcherError::StoreError(other.to_string())),
        }
    }
}

/// Last-resort fallback for `Chain` implementations that don't surface a
/// typed `ParentHeaderMissing`, matching the generic `Backend` message
/// against the shape storage errors take when a parent is missing.
fn looks_like_reorg(message: &str) -> bool {
    let lower = message.to_lowercase();
    (lower.contains("parent") || lower.contains("tip")) && (lower.contains("missing") || lower.contains("not found"))
}
