use num_bigint::BigUint;

use super::handler::StoreOutcome;
use super::job::JobState;
use super::peer::PeerPool;
use super::{Engine, FetchHandler, FetcherError};

impl<H: FetchHandler> Engine<H> {
    /// Drains whatever the emit pipeline has handed over and stores it,
    /// one job at a time, in emit order (spec §4.5 "Storage Sink").
    pub(super) async fn drain_sink(&mut self) {
        while let Ok(mut job) = self.emit_rx.try_recv() {
            let index = job.index();
            let items = job.take_result().unwrap_or_default();
            let accepted = items.len();

            match self.handler.store(items).await {
                StoreOutcome::Stored(n) => {
                    self.finished += 1;
                    metrics::counter!("fetched_jobs_total").increment(1);
                    self.emit_event(super::FetchEvent::FetchedHeaders { accepted: n }).await;
                    if log::log_enabled!(log::Level::Debug) {
                        log::debug!("stored job {index}: {n} of {accepted} items accepted");
                    }
                }
                StoreOutcome::Reorg => {
                    self.rewind_for_reorg(job);
                }
                StoreOutcome::Fatal(err) => {
                    self.irrecoverable(None, err, index).await;
                }
            }
        }
    }

    /// Rewinds a job's task by `min(task.start() - 1, safe_reorg_distance)`
    /// and re-enqueues it, instead of treating the reorg as a failure
    /// (spec §4.5).
    fn rewind_for_reorg(&mut self, mut job: super::Job<H::Task, H::Item>) {
        let index = job.index();
        let one = BigUint::from(1u32);
        let available = if job.task().start() > &one {
            job.task().start() - &one
        } else {
            BigUint::from(0u32)
        };
        let ceiling = BigUint::from(self.config.safe_reorg_distance);
        let step_back = available.min(ceiling);

        job.task_mut().rewind(&step_back);
        job.clear_partial_result();
        job.set_state(JobState::Idle);
        job.touch();
        // The job was already counted as emitted; reorg means it wasn't
        // durable after all, so it has to be processed again.
        self.processed = self.processed.saturating_sub(1);
        self.inbound.push(job);

        if log::log_enabled!(log::Level::Warn) {
            log::warn!("reorg detected storing job {index}, rewound by {step_back} artifacts");
        }
    }

    pub(super) async fn irrecoverable(
        &mut self,
        peer: Option<&<H::Pool as PeerPool>::Peer>,
        err: FetcherError,
        job_index: u64,
    ) {
        if let Some(peer) = peer {
            self.handler.pool().ban(peer, self.config.ban_time).await;
            metrics::counter!("fetcher_peer_bans_total").increment(1);
        }

        self.total = self.total.saturating_sub(self.inbound.len() as u64);
        self.inbound.drain();

        self.emit_event(super::FetchEvent::FetcherError {
            error: &err,
            job_index,
            peer: peer.map(|p| p.to_string()),
        })
        .await;

        self.errored = Some(err);
        self.running = false;
    }
}
