use super::handler::ProcessOutcome;
use super::job::JobState;
use super::peer::PeerPool;
use super::{ActiveJob, Engine, FetchHandler};

impl<H: FetchHandler> Engine<H> {
    /// Interprets one resolved reply and decides what happens to its job
    /// next: stored, re-enqueued with a partial result, or re-enqueued
    /// unchanged (spec §4.3 "Result Assembler").
    pub(super) async fn assemble(
        &mut self,
        active: ActiveJob<H>,
        peer: <H::Pool as PeerPool>::Peer,
        reply: H::Reply,
    ) {
        let ActiveJob { mut job, .. } = active;
        let outcome = self.handler.process(&job, reply).await;

        match outcome {
            ProcessOutcome::Empty => {
                // Peer answered, but with nothing: it's released only after
                // `interval`, distinguishing "peer has no data yet" from
                // "peer is simply free again" in the pool's scheduling.
                self.schedule_delayed_release(peer);
                self.requeue_unchanged(job).await;
            }
            ProcessOutcome::Malformed => {
                self.handler.pool().release(&peer).await;
                self.requeue_unchanged(job).await;
            }
            ProcessOutcome::Partial(items) => {
                self.handler.pool().release(&peer).await;
                job.set_partial_result(items);
                job.set_state(JobState::Idle);
                job.touch();
                self.inbound.push(job);
            }
            ProcessOutcome::Complete(items) => {
                self.handler.pool().release(&peer).await;
                job.set_result(items);
                job.set_state(JobState::Idle);
                self.outbound.push(job);
            }
        }
    }

    /// Re-enqueues a job exactly as it was, for the cases where nothing
    /// about its task or partial result changed.
    pub(super) async fn requeue_unchanged(&mut self, mut job: super::Job<H::Task, H::Item>) {
        job.set_state(JobState::Idle);
        job.touch();
        self.inbound.push(job);
    }
}
