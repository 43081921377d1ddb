use tokio::sync::mpsc::error::TrySendError;

use super::{Engine, FetchHandler};

impl<H: FetchHandler> Engine<H> {
    /// Pushes every contiguous, completed job at the front of `outbound`
    /// into the emit channel, stopping at the first gap or at the first
    /// time the channel reports itself full (spec §4.4 "Emit Pipeline").
    pub(super) async fn drain_outbound(&mut self) {
        loop {
            let ready = match self.outbound.peek() {
                Some(job) if job.index() == self.processed => true,
                _ => false,
            };
            if !ready {
                break;
            }

            let job = self.outbound.pop().expect("peeked above");
            match self.emit_tx.try_send(job) {
                Ok(()) => {
                    self.processed += 1;
                }
                Err(TrySendError::Full(job)) => {
                    self.outbound.push(job);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    if log::log_enabled!(log::Level::Error) {
                        log::error!("fetcher emit channel closed unexpectedly");
                    }
                    break;
                }
            }
        }
    }
}
