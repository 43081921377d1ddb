// Small runnable demonstration of the fetch engine wired to in-memory fakes.
// Not a production peer-to-peer client: it exists to exercise the engine
// end-to-end without a real network stack.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use tokio::sync::Mutex;

use chainfetch_common::error::ChainError;
use chainfetch_daemon::p2p::fetcher::header::{Chain, FlowControl, Header, HeaderFetchHandler, HeaderPeer, HeaderReply};
use chainfetch_daemon::p2p::fetcher::{BlockRange, Engine, EngineConfig, Events, FetchEvent, PeerPool};

#[derive(Parser, Debug)]
#[command(about = "Fetches a contiguous range of headers from fake in-memory peers")]
struct Args {
    /// First header number to fetch.
    #[arg(long, default_value = "0")]
    start: u64,

    /// How many headers to fetch in total.
    #[arg(long, default_value = "200")]
    count: u32,

    /// How many headers a job should cover at most.
    #[arg(long, default_value = "20")]
    chunk: u32,

    /// Number of simulated peers.
    #[arg(long, default_value = "4")]
    peers: usize,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

#[derive(Clone)]
struct FakePeer {
    id: u64,
    chain: Arc<Vec<Header>>,
}

impl std::fmt::Display for FakePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.id)
    }
}

impl PartialEq for FakePeer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[async_trait]
impl HeaderPeer for FakePeer {
    fn serves_headers(&self) -> bool {
        true
    }

    async fn get_block_headers(
        &self,
        start: &BigUint,
        count: u32,
        _reverse: bool,
    ) -> Result<HeaderReply, chainfetch_daemon::p2p::fetcher::FetcherError> {
        let start_idx: usize = start.to_usize().unwrap_or(usize::MAX);
        let headers = self
            .chain
            .iter()
            .skip(start_idx)
            .take(count as usize)
            .cloned()
            .collect();
        Ok(HeaderReply { headers })
    }
}

struct FakePool {
    idle: Mutex<VecDeque<FakePeer>>,
}

#[async_trait]
impl PeerPool for FakePool {
    type Peer = FakePeer;

    async fn idle(&self, filter: Option<fn(&FakePeer) -> bool>) -> Option<FakePeer> {
        let mut idle = self.idle.lock().await;
        match filter {
            None => idle.pop_front(),
            Some(matches) => {
                let position = idle.iter().position(|peer| matches(peer))?;
                idle.remove(position)
            }
        }
    }

    async fn release(&self, peer: &FakePeer) {
        self.idle.lock().await.push_back(peer.clone());
    }

    async fn ban(&self, peer: &FakePeer, duration: Duration) {
        log::warn!("banning {peer} for {duration:?} (demo: ban is a no-op)");
    }

    async fn contains(&self, _peer: &FakePeer) -> bool {
        true
    }
}

struct FixedFlowControl {
    /// Credit handed out per round; must clear `HeaderFetchHandler`'s own
    /// `max_per_request` threshold for a peer to be used at all.
    credit_per_round: u32,
}

#[async_trait]
impl FlowControl<FakePeer> for FixedFlowControl {
    async fn max_request_count(&self, _peer: &FakePeer, _message_name: &str) -> u32 {
        self.credit_per_round
    }

    async fn handle_reply(&self, _peer: &FakePeer, _served: u32) {}
}

struct InMemoryChain {
    headers: Mutex<Vec<Header>>,
}

#[async_trait]
impl Chain for InMemoryChain {
    async fn put_headers(&self, headers: Vec<Header>) -> Result<usize, ChainError> {
        let mut stored = self.headers.lock().await;
        stored.extend(headers.iter().cloned());
        Ok(headers.len())
    }
}

struct LoggingEvents;

#[async_trait]
impl Events for LoggingEvents {
    async fn notify(&self, event: FetchEvent<'_>) {
        match event {
            FetchEvent::FetcherError { error, job_index, peer } => {
                log::warn!("job {job_index} ({peer:?}): {error}");
            }
            FetchEvent::FetchedHeaders { accepted } => {
                log::info!("accepted {accepted} headers");
            }
        }
    }
}

fn synthetic_chain(len: u64) -> Vec<Header> {
    let mut chain = Vec::with_capacity(len as usize);
    let mut parent_hash = "genesis".to_string();
    for number in 0..len {
        let hash = format!("block-{number}");
        chain.push(Header {
            number: BigUint::from(number),
            hash: hash.clone(),
            parent_hash,
        });
        parent_hash = hash;
    }
    chain
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    chainfetch_common::logger::init(args.log_level)?;

    let chain_data = Arc::new(synthetic_chain(args.start + args.count as u64));
    let peers: VecDeque<FakePeer> = (0..args.peers)
        .map(|id| FakePeer {
            id: id as u64,
            chain: chain_data.clone(),
        })
        .collect();

    let pool = FakePool {
        idle: Mutex::new(peers),
    };
    let flow_control = FixedFlowControl { credit_per_round: 32 };
    let chain = InMemoryChain {
        headers: Mutex::new(Vec::new()),
    };

    let handler = HeaderFetchHandler::new(pool, flow_control, chain, 20);
    let mut config = EngineConfig::default();
    config.max_queue = 8;

    let mut engine = Engine::with_events(handler, config, Arc::new(LoggingEvents));

    let mut remaining = args.count;
    let mut cursor = BigUint::from(args.start);
    while remaining > 0 {
        let chunk = remaining.min(args.chunk);
        engine.enqueue(BlockRange::new(cursor.clone(), chunk, false));
        cursor += chunk;
        remaining -= chunk;
    }

    engine.fetch().await?;

    log::info!(
        "done: {} jobs processed, {} jobs finished",
        engine.processed(),
        engine.finished()
    );

    Ok(())
}
