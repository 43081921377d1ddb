use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// The narrow view the engine needs of a peer connection.
///
/// Implementors typically wrap an `Arc<Peer>` or similar handle owned by the
/// caller's networking stack; the engine only ever clones, compares, and
/// displays it.
pub trait PeerHandle: Clone + Send + Sync + fmt::Display + PartialEq + 'static {}

impl<P> PeerHandle for P where P: Clone + Send + Sync + fmt::Display + PartialEq + 'static {}

/// External collaborator owning the set of connected peers and their
/// idle/busy bookkeeping (spec §6 "PeerPool").
///
/// `idle` must atomically hand out a peer and mark it non-idle; `release`
/// reverses that. The engine never tracks idleness itself, only whether a
/// given job currently holds a peer.
#[async_trait]
pub trait PeerPool: Send + Sync {
    type Peer: PeerHandle;

    /// Returns an idle peer matching this pool's own selection policy, or
    /// `None` if none is available right now.
    ///
    /// `filter`, when given, is a capability predicate (e.g. "only peers
    /// that serve headers"); a pool must only hand back peers for which it
    /// returns `true`.
    async fn idle(&self, filter: Option<fn(&Self::Peer) -> bool>) -> Option<Self::Peer>;

    /// Returns a peer to the idle set.
    async fn release(&self, peer: &Self::Peer);

    /// Temporarily removes a peer from consideration for `duration`.
    async fn ban(&self, peer: &Self::Peer, duration: Duration);

    /// Whether `peer` is still a member of this pool (it may have
    /// disconnected while a request was in flight).
    async fn contains(&self, peer: &Self::Peer) -> bool;
}
