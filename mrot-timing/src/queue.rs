//! Cancellable one-shot timers for a cooperative, single-threaded host.
//!
//! Nothing here spawns threads or sleeps. The host asks for the next deadline,
//! waits however it likes, then drains due entries with [`TimerQueue::pop_due`].
//! Each entry carries the generation it was scheduled under so the consumer
//! can tell a stale entry from a live one even if a cancellation was missed.

use std::collections::BTreeMap;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer that reached its deadline and was removed from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<K> {
    pub id: TimerId,
    pub kind: K,
    pub generation: u64,
    pub deadline_ms: u64,
    pub fired_at_ms: u64,
}

impl<K> Fired<K> {
    pub fn late_ms(&self) -> u64 {
        self.fired_at_ms.saturating_sub(self.deadline_ms)
    }
}

#[derive(Debug, Clone)]
struct Pending<K> {
    kind: K,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    // Keyed by (deadline, id) so equal deadlines fire in scheduling order.
    pending: BTreeMap<(u64, TimerId), Pending<K>>,
    next_id: u64,
}

impl<K: Copy + std::fmt::Debug> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, deadline_ms: u64, kind: K, generation: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        trace!(?id, ?kind, generation, deadline_ms, "timer scheduled");
        self.pending
            .insert((deadline_ms, id), Pending { kind, generation });
        id
    }

    /// Removes a pending timer. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.pending.keys().find(|(_, pid)| *pid == id).copied();
        match key {
            Some(key) => {
                self.pending.remove(&key);
                trace!(?id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        if n > 0 {
            trace!(count = n, "all timers cancelled");
        }
        n
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns the earliest timer whose deadline is at or before
    /// `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<K>> {
        let (&(deadline_ms, id), _) = self.pending.iter().next()?;
        if deadline_ms > now_ms {
            return None;
        }
        let entry = self.pending.remove(&(deadline_ms, id))?;
        Some(Fired {
            id,
            kind: entry.kind,
            generation: entry.generation,
            deadline_ms,
            fired_at_ms: now_ms,
        })
    }
}

impl<K: Copy + std::fmt::Debug> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
