use std::time::Duration;

/// Tunables for an `Engine` instance (spec §6).
///
/// Every field has a default matching the spec's worked examples; callers
/// override only what they need, in the same spirit as this codebase's other
/// `..Default::default()` config structs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a dispatched request may remain unanswered before it's
    /// treated as timed out.
    pub timeout: Duration,

    /// How long the scheduler sleeps between ticks when there is nothing to
    /// dispatch, and how long a banned or recoverably-failed peer stays
    /// unavailable before being retried.
    pub interval: Duration,

    /// How long a peer stays banned after an irrecoverable error or a
    /// request timeout.
    pub ban_time: Duration,

    /// Backpressure ceiling: the maximum number of completed-but-unemitted
    /// jobs the outbound side may hold, and the window within which inbound
    /// jobs may be dispatched ahead of `processed`.
    pub max_queue: usize,

    /// Whether `fetch()` should return once `total` jobs have been
    /// processed, or keep running and wait for `next_tasks` to supply more.
    pub destroy_when_done: bool,

    /// Upper bound on how far storage is allowed to step back on a reorg
    /// (spec §4.5); the actual step back is
    /// `min(task.start() - 1, safe_reorg_distance)`.
    pub safe_reorg_distance: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(8000),
            interval: Duration::from_millis(1000),
            ban_time: Duration::from_millis(60000),
            max_queue: 4,
            destroy_when_done: true,
            safe_reorg_distance: 64,
        }
    }
}
