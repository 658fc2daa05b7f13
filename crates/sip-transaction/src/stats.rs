//! Stray-request and drop counters (a supplemented feature grounded in
//! `original_source/`'s transaction-layer bookkeeping): visibility into how
//! much traffic the Dispatcher is silently discarding, without surfacing
//! any of it to the TU.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Stats {
    duplicates_dropped: AtomicU64,
    unmatched_responses: AtomicU64,
    stray_requests: AtomicU64,
    parse_errors: AtomicU64,
    transport_failures: AtomicU64,
}

/// An immutable point-in-time copy of [`Stats`], cheap to hand out to
/// callers that just want a snapshot rather than live atomics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub duplicates_dropped: u64,
    pub unmatched_responses: u64,
    pub stray_requests: u64,
    pub parse_errors: u64,
    pub transport_failures: u64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn record_duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmatched_response(&self) {
        self.unmatched_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stray_request(&self) {
        self.stray_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            unmatched_responses: self.unmatched_responses.load(Ordering::Relaxed),
            stray_requests: self.stray_requests.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}
