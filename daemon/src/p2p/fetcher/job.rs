use std::cmp::Ordering;

use chainfetch_common::time::{get_current_time_in_millis, TimestampMillis};
use num_bigint::BigUint;

/// A caller-defined description of what to fetch for one job.
///
/// The engine only ever reconstructs a *contiguous range* (spec §1), so every
/// task is required to expose the shape of that range: a starting point and
/// a count, both adjustable as partial replies and reorgs come in.
pub trait RangeTask: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// First artifact number this task still needs, as an arbitrary-precision
    /// integer (block numbers may exceed 64 bits on some chains).
    fn start(&self) -> &BigUint;

    /// Number of artifacts still requested by this task.
    fn count(&self) -> u32;

    /// Shrinks the task's front by `consumed` items, as happens when a
    /// partial reply already delivered a prefix. Does not touch
    /// `partial_result` itself; that bookkeeping lives on the `Job`.
    fn advance(&mut self, consumed: u32);

    /// Rewinds the task's start by `step_back` and grows `count` by the same
    /// amount, as happens when storage reports a reorg.
    fn rewind(&mut self, step_back: &BigUint);
}

/// Lifecycle state of a `Job` (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Active,
    Expired,
}

/// One unit of concurrency: a task plus everything the engine needs to track
/// its progress through the pipeline.
#[derive(Debug, Clone)]
pub struct Job<T: RangeTask, I> {
    index: u64,
    task: T,
    state: JobState,
    time: TimestampMillis,
    partial_result: Option<Vec<I>>,
    result: Option<Vec<I>>,
    /// Bumped every time the job is (re)dispatched. Lets a reply that
    /// resolves after the job was already expired and redispatched be
    /// recognized as stale and dropped, even though the job's index and
    /// identity are unchanged (spec §9 "job identity").
    generation: u64,
}

impl<T: RangeTask, I> Job<T, I> {
    pub fn new(index: u64, task: T) -> Self {
        Self {
            index,
            task,
            state: JobState::Idle,
            time: get_current_time_in_millis(),
            partial_result: None,
            result: None,
            generation: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    pub fn touch(&mut self) {
        self.time = get_current_time_in_millis();
    }

    pub fn time(&self) -> TimestampMillis {
        self.time
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks this job as freshly (re)dispatched, invalidating any in-flight
    /// reply for a previous generation.
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn partial_result(&self) -> Option<&[I]> {
        self.partial_result.as_deref()
    }

    pub fn partial_len(&self) -> u32 {
        self.partial_result.as_ref().map_or(0, |p| p.len() as u32)
    }

    pub fn set_partial_result(&mut self, items: Vec<I>) {
        self.partial_result = Some(items);
    }

    pub fn clear_partial_result(&mut self) {
        self.partial_result = None;
    }

    pub fn take_result(&mut self) -> Option<Vec<I>> {
        self.result.take()
    }

    pub fn set_result(&mut self, items: Vec<I>) {
        self.partial_result = None;
        self.result = Some(items);
    }

    /// The task as it should actually be requested right now: the original
    /// task advanced past whatever prefix `partial_result` already covers
    /// (spec §4.3 partial-result protocol).
    pub fn effective_task(&self) -> T {
        let mut task = self.task.clone();
        if let Some(partial) = &self.partial_result {
            task.advance(partial.len() as u32);
        }
        task
    }
}

// Jobs are ordered solely by `index` so they can live in a `BinaryHeap` (used
// with `Reverse` to make it a min-heap) keyed by emit order (spec §3 invariant 1).
impl<T: RangeTask, I> PartialEq for Job<T, I> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T: RangeTask, I> Eq for Job<T, I> {}

impl<T: RangeTask, I> PartialOrd for Job<T, I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: RangeTask, I> Ord for Job<T, I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

/// A contiguous block-range task: the one concrete `RangeTask` this crate
/// ships, shared by the header specialization (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRange {
    pub first: BigUint,
    pub count: u32,
    pub reverse: bool,
}

impl BlockRange {
    pub fn new(first: BigUint, count: u32, reverse: bool) -> Self {
        Self {
            first,
            count,
            reverse,
        }
    }
}

impl RangeTask for BlockRange {
    fn start(&self) -> &BigUint {
        &self.first
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn advance(&mut self, consumed: u32) {
        self.first += consumed;
        self.count = self.count.saturating_sub(consumed);
    }

    fn rewind(&mut self, step_back: &BigUint) {
        self.first = if &self.first > step_back {
            &self.first - step_back
        } else {
            BigUint::from(0u32)
        };
        // count grows by the same amount we stepped back, capped at u32::MAX
        // (a reorg distance this large would already be unworkable).
        let step_back_u32: u32 = step_back
            .iter_u32_digits()
            .next()
            .unwrap_or(0)
            .min(u32::MAX);
        self.count = self.count.saturating_add(step_back_u32);
    }
}
