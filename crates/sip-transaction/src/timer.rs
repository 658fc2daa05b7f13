//! The Timer Wheel (§4.4): a monotonic scheduler the Dispatcher polls
//! itself, never a thread of its own. Firings are delivered as plain data
//! the Dispatcher matches against the owning transaction's current epoch —
//! the intrusive-handle-with-epoch pattern called for in §9's design notes,
//! replacing the cyclic transaction/timer-callback references flagged there.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::key::TransactionKey;

/// RFC 3261 §17's named timers. A/E retransmit client requests, B/F bound
/// total client transaction lifetime, D/K/J hold a transaction open for
/// duplicate absorption, G retransmits a server's final response, H bounds
/// the wait for ACK, I holds an INVITE server transaction in Confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    A,
    B,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

/// RFC-guidance defaults (§6's configuration surface).
#[derive(Debug, Clone, Copy)]
pub struct TimerSettings {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerSettings {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
        }
    }
}

impl TimerSettings {
    /// Timer B/F: 64 * T1.
    pub fn transaction_timeout(&self) -> Duration {
        self.t1 * 64
    }

    /// Timer H: wait for ACK of a non-2xx final response. Also 64 * T1.
    pub fn ack_wait(&self) -> Duration {
        self.t1 * 64
    }

    /// Timer D: wait for retransmitted ACKs on an unreliable transport.
    /// RFC 3261 mandates "at least 32s"; reliable transports use zero.
    pub fn wait_for_ack_retransmits(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            Duration::from_secs(32).max(self.t1 * 64)
        }
    }

    /// Timer I/J/K: time a transaction lingers to absorb duplicates.
    /// T4 on unreliable transports, zero on reliable ones.
    pub fn duplicate_absorption(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.t4
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

struct Entry {
    deadline: Instant,
    handle: TimerHandle,
    key: TransactionKey,
    kind: TimerKind,
    epoch: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for Entry {}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so `BinaryHeap` (a max-heap) pops the earliest deadline first.
        other.deadline.cmp(&self.deadline)
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A timer firing delivered to the Dispatcher. `epoch` must be compared
/// against the owning transaction's current epoch before acting on it —
/// a mismatch means the timer was cancelled after it had already been
/// popped off the heap and should be silently discarded.
#[derive(Debug, Clone)]
pub struct TimerFiring {
    pub key: TransactionKey,
    pub kind: TimerKind,
    pub epoch: u64,
}

#[derive(Default)]
pub struct TimerWheel {
    heap: BinaryHeap<Entry>,
    cancelled: HashSet<u64>,
    next_id: u64,
}

impl TimerWheel {
    pub fn new() -> Self {
        TimerWheel::default()
    }

    pub fn schedule(
        &mut self,
        after: Duration,
        key: TransactionKey,
        kind: TimerKind,
        epoch: u64,
    ) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let handle = TimerHandle { id };
        self.heap.push(Entry {
            deadline: Instant::now() + after,
            handle,
            key,
            kind,
            epoch,
        });
        handle
    }

    /// Tombstones `handle`. The entry is not removed from the heap (no
    /// efficient way to do that with a binary heap) — it is dropped
    /// silently when popped instead.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.cancelled.insert(handle.id);
    }

    /// Returns every firing whose deadline has passed, skipping tombstoned
    /// entries. Call this before computing the next sleep deadline.
    pub fn pop_due(&mut self) -> Vec<TimerFiring> {
        let now = Instant::now();
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let entry = self.heap.pop().expect("peeked entry must be present");
            if self.cancelled.remove(&entry.handle.id) {
                continue;
            }
            due.push(TimerFiring {
                key: entry.key,
                kind: entry.kind,
                epoch: entry.epoch,
            });
        }
        due
    }

    /// The deadline of the earliest non-cancelled timer, if any. The
    /// Dispatcher sleeps no later than this (§4.6).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|e| !self.cancelled.contains(&e.handle.id))
            .map(|e| e.deadline)
            .min()
    }
}
