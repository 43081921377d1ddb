mod support;

use chainfetch_common::error::ChainError;
use chainfetch_daemon::p2p::fetcher::header::HeaderFetchHandler;
use chainfetch_daemon::p2p::fetcher::{BlockRange, Engine, EngineConfig};
use num_bigint::BigUint;
use std::time::Duration;

use support::{headers, NoFlowControl, PeerAction, RecordingChain, ScriptedPeer, ScriptedPool};

fn config() -> EngineConfig {
    EngineConfig {
        timeout: Duration::from_millis(200),
        interval: Duration::from_millis(50),
        ban_time: Duration::from_millis(500),
        max_queue: 8,
        ..EngineConfig::default()
    }
}

/// A `max_per_request` threshold low enough that `NoFlowControl`'s unlimited
/// credit always clears it.
const MAX_PER_REQUEST: u32 = 50;

/// S1 — happy path, single peer.
#[tokio::test(start_paused = true)]
async fn s1_happy_path_single_peer() {
    let peer = ScriptedPeer::new(1, vec![PeerAction::Reply(headers(0..10))]);
    let pool = ScriptedPool::new(vec![peer]);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(0u32), 10, false));

    engine.fetch().await.expect("fetch should succeed");

    assert_eq!(engine.total(), 1);
    assert_eq!(engine.finished(), 1);
    assert_eq!(*stored.lock().await, vec![headers(0..10)]);
}

/// S2 — partial replies combine in order across two dispatches.
#[tokio::test(start_paused = true)]
async fn s2_partial_replies_combine_in_order() {
    let peer = ScriptedPeer::new(
        1,
        vec![
            PeerAction::Reply(headers(100..120)),
            PeerAction::Reply(headers(120..150)),
        ],
    );
    let pool = ScriptedPool::new(vec![peer]);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(100u32), 50, false));

    engine.fetch().await.expect("fetch should succeed");

    assert_eq!(engine.finished(), 1);
    let stored = stored.lock().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], headers(100..150));
}

/// S3 — an empty reply delays peer release by one interval, then succeeds.
#[tokio::test(start_paused = true)]
async fn s3_empty_reply_then_success() {
    let peer = ScriptedPeer::new(1, vec![PeerAction::Empty, PeerAction::Reply(headers(0..5))]);
    let pool = ScriptedPool::new(vec![peer]);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(0u32), 5, false));

    engine.fetch().await.expect("fetch should succeed");

    assert_eq!(engine.finished(), 1);
    assert_eq!(*stored.lock().await, vec![headers(0..5)]);
}

/// S4 — a hung peer times out, gets banned, and the job completes via a
/// second peer.
#[tokio::test(start_paused = true)]
async fn s4_timeout_bans_peer_then_second_peer_succeeds() {
    let hanging = ScriptedPeer::new(1, vec![PeerAction::Hang]);
    let cooperative = ScriptedPeer::new(2, vec![PeerAction::Reply(headers(0..5))]);
    let pool = ScriptedPool::new(vec![hanging, cooperative]);
    let banned = pool.banned.clone();
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(0u32), 5, false));

    engine.fetch().await.expect("fetch should succeed");

    assert_eq!(*banned.lock().await, vec![1]);
    assert_eq!(engine.finished(), 1);
    assert_eq!(*stored.lock().await, vec![headers(0..5)]);
}

/// S5 — storage reports a reorg; the task is rewound and retried.
#[tokio::test(start_paused = true)]
async fn s5_reorg_on_store_rewinds_task() {
    let peer = ScriptedPeer::new(
        1,
        vec![
            PeerAction::Reply(headers(1000..1010)),
            PeerAction::Reply(headers(936..1010)),
        ],
    );
    let pool = ScriptedPool::new(vec![peer]);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();
    chain
        .reject_next_with(ChainError::ParentHeaderMissing("block-1000".into()))
        .await;

    let cfg = EngineConfig {
        safe_reorg_distance: 64,
        ..config()
    };

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, cfg);
    engine.enqueue(BlockRange::new(BigUint::from(1000u32), 10, false));

    engine.fetch().await.expect("fetch should succeed");

    let stored = stored.lock().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], headers(936..1010));
    assert_eq!(engine.finished(), 1);
}

/// S6 — the peer serving the lowest-index job resolves *last*; emit order
/// still matches index order rather than completion order. Without the
/// delays, a buggy engine that emitted on completion order would pass by
/// accident, so each peer is given a distinct, decreasing delay.
#[tokio::test(start_paused = true)]
async fn s6_emit_order_matches_index_order_not_completion_order() {
    let peers = vec![
        ScriptedPeer::new(
            0,
            vec![PeerAction::DelayedReply(Duration::from_millis(120), headers(0..10))],
        ),
        ScriptedPeer::new(
            1,
            vec![PeerAction::DelayedReply(Duration::from_millis(60), headers(10..20))],
        ),
        ScriptedPeer::new(
            2,
            vec![PeerAction::DelayedReply(Duration::from_millis(10), headers(20..30))],
        ),
    ];
    let pool = ScriptedPool::new(peers);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let cfg = EngineConfig {
        timeout: Duration::from_millis(500),
        ..config()
    };
    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, cfg);

    engine.enqueue(BlockRange::new(BigUint::from(0u32), 10, false));
    engine.enqueue(BlockRange::new(BigUint::from(10u32), 10, false));
    engine.enqueue(BlockRange::new(BigUint::from(20u32), 10, false));

    engine.fetch().await.expect("fetch should succeed");

    let stored = stored.lock().await;
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0], headers(0..10));
    assert_eq!(stored[1], headers(10..20));
    assert_eq!(stored[2], headers(20..30));
}

/// S7 — a transport failure, a malformed reply, and a missing reply are all
/// recoverable: the job keeps retrying against the same peer (never banned)
/// until it succeeds.
#[tokio::test(start_paused = true)]
async fn s7_recoverable_request_errors_retry_without_banning() {
    let peer = ScriptedPeer::new(
        1,
        vec![
            PeerAction::TransportError("connection reset".into()),
            PeerAction::Malformed("truncated frame".into()),
            PeerAction::NoReply,
            PeerAction::Reply(headers(0..5)),
        ],
    );
    let pool = ScriptedPool::new(vec![peer]);
    let banned = pool.banned.clone();
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(0u32), 5, false));

    engine.fetch().await.expect("fetch should succeed");

    assert!(banned.lock().await.is_empty());
    assert_eq!(engine.finished(), 1);
    assert_eq!(*stored.lock().await, vec![headers(0..5)]);
}

/// S8 — `peer()` only ever hands the header handler a peer whose
/// `serve_headers` capability is set; a capability-less peer sitting at the
/// front of the pool is skipped over.
#[tokio::test(start_paused = true)]
async fn s8_capability_filter_skips_non_header_peers() {
    let incapable = ScriptedPeer::without_header_capability(1, vec![PeerAction::Reply(headers(0..5))]);
    let capable = ScriptedPeer::new(2, vec![PeerAction::Reply(headers(0..5))]);
    let pool = ScriptedPool::new(vec![incapable, capable]);
    let chain = RecordingChain::new();
    let stored = chain.stored.clone();

    let handler = HeaderFetchHandler::new(pool, NoFlowControl, chain, MAX_PER_REQUEST);
    let mut engine = Engine::new(handler, config());
    engine.enqueue(BlockRange::new(BigUint::from(0u32), 5, false));

    engine.fetch().await.expect("fetch should succeed");

    assert_eq!(engine.finished(), 1);
    assert_eq!(*stored.lock().await, vec![headers(0..5)]);
}
