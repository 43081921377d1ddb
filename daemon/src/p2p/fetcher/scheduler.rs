use std::cmp::Reverse;

use futures::StreamExt;
use tokio::time::Instant;

use super::job::JobState;
use super::peer::PeerPool;
use super::{ActiveJob, Engine, FetchHandler, FetcherError};

impl<H: FetchHandler> Engine<H> {
    /// Runs the engine until it either exhausts its work (when
    /// `destroy_when_done` is set) or hits an irrecoverable error.
    ///
    /// Mirrors this codebase's `'main: loop { select! { ... } }` shape: one
    /// branch advances an in-flight reply, one dispatches new work, and a
    /// fallback sleeps for `interval` when neither is possible.
    pub async fn fetch(&mut self) -> Result<(), FetcherError> {
        self.running = true;

        'main: loop {
            if !self.running {
                break 'main;
            }

            self.run_next_tasks().await;
            self.pump_delayed_releases().await;

            tokio::select! {
                biased;

                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_completion(completion).await;
                }

                _ = std::future::ready(()), if self.can_dispatch() => {
                    self.try_dispatch().await;
                }

                _ = tokio::time::sleep(self.config.interval), if self.in_flight.is_empty() && !self.can_dispatch() => {
                    if log::log_enabled!(log::Level::Trace) {
                        log::trace!("fetcher idle tick: nothing dispatchable, nothing in flight");
                    }
                }
            }

            self.drain_outbound().await;
            self.drain_sink().await;

            if self.config.destroy_when_done && self.done() {
                self.running = false;
            }
        }

        match self.errored.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_next_tasks(&mut self) {
        let handler = self.handler.clone();
        let mut pending = Vec::new();
        {
            let mut enqueue = |task: H::Task| pending.push(task);
            handler.next_tasks(&mut enqueue).await;
        }
        for task in pending {
            self.enqueue(task);
        }
    }

    /// Non-blocking check for whether a dispatch attempt is worth making
    /// this tick: an inbound job exists, it's inside the dispatch window,
    /// and the outbound side isn't over its backpressure ceiling.
    fn can_dispatch(&self) -> bool {
        if self.outbound.len() >= self.config.max_queue {
            return false;
        }
        match self.inbound.peek() {
            Some(job) => job.index() <= self.processed + self.config.max_queue as u64,
            None => false,
        }
    }

    async fn try_dispatch(&mut self) {
        let peer = {
            let candidate = match self.inbound.peek() {
                Some(job) => job,
                None => return,
            };
            match self.handler.peer(candidate).await {
                Some(peer) => peer,
                None => {
                    tokio::time::sleep(self.config.interval).await;
                    return;
                }
            }
        };

        let mut job = match self.inbound.pop() {
            Some(job) => job,
            None => return,
        };

        job.set_state(JobState::Active);
        job.touch();
        let generation = job.bump_generation();
        let index = job.index();

        let handler = self.handler.clone();
        let job_snapshot = job.clone();
        let peer_for_request = peer.clone();
        let timeout = self.config.timeout;

        self.active.insert(
            index,
            ActiveJob {
                job,
                peer: peer.clone(),
            },
        );

        let fut = async move {
            let result = tokio::time::timeout(timeout, handler.request(&job_snapshot, &peer_for_request)).await;
            (index, generation, peer_for_request, result)
        };
        self.in_flight.push(Box::pin(fut));
        metrics::gauge!("fetcher_inflight_jobs").set(self.in_flight.len() as f64);
    }

    async fn handle_completion(
        &mut self,
        (index, generation, peer, result): super::Completion<H>,
    ) {
        let active = match self.active.remove(&index) {
            Some(active) if active.job.generation() == generation => active,
            Some(active) => {
                // Stale completion for a job already expired and
                // redispatched under a new generation; put it back and drop
                // this reply silently.
                self.active.insert(index, active);
                return;
            }
            None => return,
        };

        metrics::gauge!("fetcher_inflight_jobs").set(self.in_flight.len() as f64);

        match result {
            Err(_elapsed) => self.expire(active, peer).await,
            Ok(Err(err)) => {
                let irrecoverable = err.is_irrecoverable();
                self.fail(active, peer, err, irrecoverable).await;
            }
            Ok(Ok(None)) => {
                // Handler declined to serve this job with this peer; retry
                // with another peer immediately, no penalty.
                self.handler.pool().release(&peer).await;
                self.requeue_unchanged(active.job).await;
            }
            Ok(Ok(Some(reply))) => self.assemble(active, peer, reply).await,
        }
    }

    async fn pump_delayed_releases(&mut self) {
        let now = Instant::now();
        while let Some(Reverse(entry)) = self.delayed_releases.peek() {
            if entry.at > now {
                break;
            }
            let entry = self.delayed_releases.pop().unwrap().0;
            self.handler.pool().release(&entry.peer).await;
        }
    }

    pub(super) fn schedule_delayed_release(&mut self, peer: <H::Pool as PeerPool>::Peer) {
        self.delayed_releases.push(Reverse(super::DelayedRelease {
            at: Instant::now() + self.config.interval,
            peer,
        }));
    }
}
