use super::job::JobState;
use super::peer::PeerPool;
use super::{ActiveJob, Engine, FetchEvent, FetchHandler, FetcherError};

impl<H: FetchHandler> Engine<H> {
    /// Handles a request that resolved with an error (spec §4.7).
    ///
    /// Irrecoverable errors ban the peer and stop the engine outright;
    /// recoverable ones release the peer after `interval` and simply put
    /// the job back on the inbound queue.
    pub(super) async fn fail(
        &mut self,
        active: ActiveJob<H>,
        peer: <H::Pool as PeerPool>::Peer,
        err: FetcherError,
        irrecoverable: bool,
    ) {
        let ActiveJob { job, .. } = active;
        let index = job.index();

        if irrecoverable {
            self.irrecoverable(Some(&peer), err, index).await;
            return;
        }

        self.schedule_delayed_release(peer.clone());

        self.emit_event(FetchEvent::FetcherError {
            error: &err,
            job_index: index,
            peer: Some(peer.to_string()),
        })
        .await;

        self.requeue_unchanged(job).await;
    }

    /// Handles a request that timed out (spec §4.7). Always bans the peer
    /// (if it's still a pool member) and always re-enqueues the job;
    /// there's no irrecoverable variant of a timeout.
    pub(super) async fn expire(&mut self, active: ActiveJob<H>, peer: <H::Pool as PeerPool>::Peer) {
        let ActiveJob { mut job, .. } = active;
        let index = job.index();

        if self.handler.pool().contains(&peer).await {
            self.handler.pool().ban(&peer, self.config.ban_time).await;
            metrics::counter!("fetcher_peer_bans_total").increment(1);
        }

        job.set_state(JobState::Expired);
        job.touch();

        let err = FetcherError::Timeout(peer.to_string());
        self.emit_event(FetchEvent::FetcherError {
            error: &err,
            job_index: index,
            peer: Some(peer.to_string()),
        })
        .await;

        job.set_state(JobState::Idle);
        self.inbound.push(job);
    }
}
