//! Deadline queue for timer ticks and the watchdog sweep.
//!
//! Each target has at most one live deadline. Rescheduling or cancelling a
//! target only touches the `live` map; superseded heap entries are dropped
//! lazily when they reach the top.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Utc};

/// What a wakeup is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WakeupTarget {
    /// One-second allowance tick for a site identifier.
    Tick(String),
    /// Stale-activity sweep over all timers.
    WatchdogSweep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    at: DateTime<Utc>,
    seq: u64,
    target: WakeupTarget,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct WakeupQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    /// target -> sequence number of its live entry
    live: HashMap<WakeupTarget, u64>,
    next_seq: u64,
}

impl WakeupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `target` at `at`, replacing any earlier deadline for it.
    pub fn schedule(&mut self, target: WakeupTarget, at: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(target.clone(), seq);
        self.heap.push(Reverse(Entry { at, seq, target }));
    }

    /// Drop the deadline for `target`. Returns whether one was live.
    pub fn cancel(&mut self, target: &WakeupTarget) -> bool {
        self.live.remove(target).is_some()
    }

    pub fn is_scheduled(&self, target: &WakeupTarget) -> bool {
        self.live.contains_key(target)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(entry)| entry.at)
    }

    /// Pop the earliest live wakeup due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(WakeupTarget, DateTime<Utc>)> {
        self.discard_stale();
        let due = matches!(self.heap.peek(), Some(Reverse(entry)) if entry.at <= now);
        if !due {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.target);
        Some((entry.target, entry.at))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.live.get(&entry.target) == Some(&entry.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
