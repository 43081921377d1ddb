// Hand-written fakes shared by the scenario tests in header_fetch.rs.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use tokio::sync::Mutex;

use chainfetch_common::error::ChainError;
use chainfetch_daemon::p2p::fetcher::header::{Chain, FlowControl, Header, HeaderPeer, HeaderReply};
use chainfetch_daemon::p2p::fetcher::{FetcherError, PeerPool};

pub fn header(number: u64) -> Header {
    Header {
        number: BigUint::from(number),
        hash: format!("block-{number}"),
        parent_hash: format!("block-{}", number.saturating_sub(1)),
    }
}

pub fn headers(range: std::ops::Range<u64>) -> Vec<Header> {
    range.map(header).collect()
}

/// What a `ScriptedPeer` does the next time it's asked for headers.
pub enum PeerAction {
    Reply(Vec<Header>),
    /// Resolves with `Reply` only after `delay` has elapsed, so tests can
    /// force a specific completion order across several in-flight peers.
    DelayedReply(Duration, Vec<Header>),
    Empty,
    /// Never resolves; the engine's own timeout is what ends the wait.
    Hang,
    /// The wire-level reply was missing entirely (`FetcherError::EmptyOrMissingReply`).
    NoReply,
    /// The wire-level reply couldn't be decoded (`FetcherError::MalformedReply`).
    Malformed(String),
    /// The request itself failed in transport (`FetcherError::RequestError`).
    TransportError(String),
}

#[derive(Clone)]
pub struct ScriptedPeer {
    pub id: u64,
    actions: Arc<Mutex<VecDeque<PeerAction>>>,
    serves_headers: bool,
}

impl ScriptedPeer {
    pub fn new(id: u64, actions: Vec<PeerAction>) -> Self {
        Self {
            id,
            actions: Arc::new(Mutex::new(actions.into())),
            serves_headers: true,
        }
    }

    pub fn without_header_capability(id: u64, actions: Vec<PeerAction>) -> Self {
        Self {
            id,
            actions: Arc::new(Mutex::new(actions.into())),
            serves_headers: false,
        }
    }
}

impl std::fmt::Display for ScriptedPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scripted-peer#{}", self.id)
    }
}

impl PartialEq for ScriptedPeer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[async_trait]
impl HeaderPeer for ScriptedPeer {
    fn serves_headers(&self) -> bool {
        self.serves_headers
    }

    async fn get_block_headers(
        &self,
        _start: &BigUint,
        _count: u32,
        _reverse: bool,
    ) -> Result<HeaderReply, FetcherError> {
        let action = self.actions.lock().await.pop_front().unwrap_or(PeerAction::Empty);
        match action {
            PeerAction::Reply(headers) => Ok(HeaderReply { headers }),
            PeerAction::DelayedReply(delay, headers) => {
                tokio::time::sleep(delay).await;
                Ok(HeaderReply { headers })
            }
            PeerAction::Empty => Ok(HeaderReply { headers: vec![] }),
            PeerAction::Hang => std::future::pending().await,
            PeerAction::NoReply => Err(FetcherError::EmptyOrMissingReply(self.id.to_string())),
            PeerAction::Malformed(reason) => Err(FetcherError::MalformedReply(self.id.to_string(), reason)),
            PeerAction::TransportError(reason) => Err(FetcherError::RequestError(self.id.to_string(), reason)),
        }
    }
}

/// A pool that hands out scripted peers in FIFO order (subject to an
/// optional capability filter) and records bans.
pub struct ScriptedPool {
    idle: Mutex<VecDeque<ScriptedPeer>>,
    pub banned: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedPool {
    pub fn new(peers: Vec<ScriptedPeer>) -> Self {
        Self {
            idle: Mutex::new(peers.into()),
            banned: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl PeerPool for ScriptedPool {
    type Peer = ScriptedPeer;

    async fn idle(&self, filter: Option<fn(&ScriptedPeer) -> bool>) -> Option<ScriptedPeer> {
        let mut idle = self.idle.lock().await;
        match filter {
            None => idle.pop_front(),
            Some(matches) => {
                let position = idle.iter().position(|peer| matches(peer))?;
                idle.remove(position)
            }
        }
    }

    async fn release(&self, peer: &ScriptedPeer) {
        self.idle.lock().await.push_back(peer.clone());
    }

    async fn ban(&self, peer: &ScriptedPeer, _duration: Duration) {
        self.banned.lock().await.push(peer.id);
    }

    async fn contains(&self, _peer: &ScriptedPeer) -> bool {
        true
    }
}

pub struct NoFlowControl;

#[async_trait]
impl FlowControl<ScriptedPeer> for NoFlowControl {
    async fn max_request_count(&self, _peer: &ScriptedPeer, _message_name: &str) -> u32 {
        u32::MAX
    }

    async fn handle_reply(&self, _peer: &ScriptedPeer, _served: u32) {}
}

/// A `Chain` that records every accepted write and can be scripted to
/// reject the next write with a reorg or a fatal error.
pub struct RecordingChain {
    pub stored: Arc<Mutex<Vec<Vec<Header>>>>,
    reject_next: Mutex<Option<ChainError>>,
}

impl RecordingChain {
    pub fn new() -> Self {
        Self {
            stored: Arc::new(Mutex::new(Vec::new())),
            reject_next: Mutex::new(None),
        }
    }

    pub async fn reject_next_with(&self, err: ChainError) {
        *self.reject_next.lock().await = Some(err);
    }
}

#[async_trait]
impl Chain for RecordingChain {
    async fn put_headers(&self, headers: Vec<Header>) -> Result<usize, ChainError> {
        if let Some(err) = self.reject_next.lock().await.take() {
            return Err(err);
        }
        let count = headers.len();
        self.stored.lock().await.push(headers);
        Ok(count)
    }
}
