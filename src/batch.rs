//! Thread-safe accumulation of fragments into batches.
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::event::{EventBatch, Fragment};

/// Limits that decide when a batch is ready to be sent.
///
/// A batch is sealed when it reaches [`max_event_count`](BatchConfig::max_event_count) fragments,
/// [`max_buffer_size`](BatchConfig::max_buffer_size) bytes, or when its first fragment has been
/// waiting for [`max_duration`](BatchConfig::max_duration), whichever comes first.
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_event_count: usize,
    pub max_buffer_size: usize,
    pub max_duration: Duration,
}

impl BatchConfig {
    pub const DEFAULT_MAX_EVENT_COUNT: usize = 10_000;
    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;
    pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(2);

    pub fn new() -> BatchConfig {
        BatchConfig::default()
    }

    /// Update the maximum number of fragments per batch. Values below 1 are raised to 1.
    pub fn with_max_event_count(mut self, max_event_count: usize) -> BatchConfig {
        self.max_event_count = max_event_count.max(1);
        self
    }

    /// Update the maximum batch size in bytes.
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> BatchConfig {
        self.max_buffer_size = max_buffer_size.max(1);
        self
    }

    /// Update how long a fragment may wait in the buffer before its batch is sent.
    pub fn with_max_duration(mut self, max_duration: Duration) -> BatchConfig {
        self.max_duration = max_duration;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> BatchConfig {
        BatchConfig {
            max_event_count: BatchConfig::DEFAULT_MAX_EVENT_COUNT,
            max_buffer_size: BatchConfig::DEFAULT_MAX_BUFFER_SIZE,
            max_duration: BatchConfig::DEFAULT_MAX_DURATION,
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    fragments: Vec<Fragment>,
    size: usize,
    opened_at: Option<Instant>,
    ready: VecDeque<EventBatch>,
}

impl Pending {
    fn seal(&mut self) {
        if self.fragments.is_empty() {
            return;
        }
        self.ready.push_back(EventBatch {
            fragments: std::mem::take(&mut self.fragments),
        });
        self.size = 0;
        self.opened_at = None;
    }
}

/// Collects fragments from many threads and cuts them into batches.
///
/// Every fragment ends up in exactly one batch returned by [`BatchAccumulator::drain_ready`] or
/// [`BatchAccumulator::drain_all`]. Fragments enqueued sequentially by one thread keep their
/// relative order.
#[derive(Debug)]
pub struct BatchAccumulator {
    config: BatchConfig,
    pending: Mutex<Pending>,
}

impl BatchAccumulator {
    pub fn new(config: BatchConfig) -> BatchAccumulator {
        BatchAccumulator {
            config,
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Add a fragment to the current batch.
    ///
    /// Returns `true` if the time of the next flush has changed: either a batch has been sealed,
    /// or this fragment started a new batch whose age now counts towards
    /// [`BatchConfig::max_duration`].
    pub fn enqueue(&self, fragment: Fragment) -> bool {
        let fragment_size = fragment.size();
        let mut pending = self.lock();
        let mut changed = false;

        if !pending.fragments.is_empty()
            && pending.size + fragment_size > self.config.max_buffer_size
        {
            pending.seal();
            changed = true;
        }

        if pending.fragments.is_empty() {
            pending.opened_at = Some(Instant::now());
            changed = true;
        }
        pending.fragments.push(fragment);
        pending.size += fragment_size;

        if pending.fragments.len() >= self.config.max_event_count
            || pending.size >= self.config.max_buffer_size
        {
            pending.seal();
            changed = true;
        }

        changed
    }

    /// Take all batches that are ready at `now`, including the current batch if it is too old.
    pub fn drain_ready(&self, now: Instant) -> Vec<EventBatch> {
        let mut pending = self.lock();

        let expired = pending.opened_at.is_some_and(|opened_at| {
            now.saturating_duration_since(opened_at) >= self.config.max_duration
        });
        if expired {
            pending.seal();
        }

        pending.ready.drain(..).collect()
    }

    /// Take every buffered fragment, sealing the current batch regardless of its age.
    pub fn drain_all(&self) -> Vec<EventBatch> {
        let mut pending = self.lock();
        pending.seal();
        pending.ready.drain(..).collect()
    }

    /// How long until the next batch becomes ready, or `None` if nothing is buffered.
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let pending = self.lock();
        if !pending.ready.is_empty() {
            return Some(Duration::ZERO);
        }
        pending.opened_at.map(|opened_at| {
            self.config
                .max_duration
                .saturating_sub(now.saturating_duration_since(opened_at))
        })
    }

    /// Number of fragments not yet drained.
    pub fn buffered_count(&self) -> usize {
        let pending = self.lock();
        pending.fragments.len() + pending.ready.iter().map(EventBatch::len).sum::<usize>()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // A panic while holding the lock cannot leave `Pending` half-updated in a way that loses
        // fragments, so keep going with the inner value.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
