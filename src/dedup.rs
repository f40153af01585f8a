//! Tracks which caller-event identifiers have already been processed.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::events::CallerEvent;

/// Grow-only set of processed event ids.
///
/// Once an id is seen it is never reconsidered, even if the feed re-sends
/// it; this transitively guarantees overlay idempotency. There is no
/// eviction — the set is bounded by event volume over a session, which is
/// small at this system's scale.
#[derive(Debug, Default)]
pub struct EventDeduplicator {
    processed: Mutex<HashSet<String>>,
}

impl EventDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return only events whose id has not been processed, preserving input
    /// order.
    pub fn filter_new(&self, events: Vec<CallerEvent>) -> Vec<CallerEvent> {
        let processed = self.processed.lock().expect("dedup set poisoned");
        events
            .into_iter()
            .filter(|e| !processed.contains(&e.id))
            .collect()
    }

    /// Mark ids as processed. Call this only after the events' geometry has
    /// been handed to the overlay store (or the events were deliberately
    /// skipped); marking before construction risks permanently losing an
    /// event if construction fails.
    pub fn mark_processed<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut processed = self.processed.lock().expect("dedup set poisoned");
        processed.extend(ids);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().expect("dedup set poisoned").len()
    }
}
