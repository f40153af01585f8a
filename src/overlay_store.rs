//! Central mutable state: timestamped line and circle overlays with
//! batched insertion, TTL-based decay, and pinning.
//!
//! Overlay lifecycle: absent -> active (insert) -> optionally pinned
//! (explicit toggle) -> absent (explicit delete, or decay sweep for
//! non-pinned overlays). Inserting a duplicate id is a no-op, so
//! re-processing an event can never duplicate geometry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::geodesy::LatLng;

/// A line of position: a fixed-length segment from a station along a
/// reported bearing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineOverlay {
    /// `{event_id}-{station_name}`, deterministic so re-processing the same
    /// event cannot duplicate a line already present.
    pub id: String,
    pub start: LatLng,
    pub end: LatLng,
    pub created_at: DateTime<Utc>,
    pub pinned: bool,
    pub source_event_id: String,
}

/// A position-fix circle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleOverlay {
    /// `circle-{event_id}`, or a counter-based fallback when no event id is
    /// available.
    pub id: String,
    pub center: LatLng,
    pub radius_miles: f64,
    pub created_at: DateTime<Utc>,
    pub pinned: bool,
    pub source_event_id: Option<String>,
}

/// Full contents of the store, pushed to subscribers on every visible
/// change. Replacing the whole geometry set per update is acceptable while
/// overlay counts stay in the low hundreds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlaySnapshot {
    pub lines: Vec<LineOverlay>,
    pub circles: Vec<CircleOverlay>,
}

#[derive(Debug, Default)]
struct StoreState {
    lines: Vec<LineOverlay>,
    circles: Vec<CircleOverlay>,
    /// Coalescing buffer for batched line insertion
    pending_lines: Vec<LineOverlay>,
}

/// The overlay store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OverlayStore {
    state: Arc<Mutex<StoreState>>,
    /// Shared, runtime-adjustable decay TTL. Changing it retroactively
    /// changes which existing overlays the next sweep considers stale.
    ttl_millis: Arc<AtomicU64>,
    /// Whether a debounced flush is already scheduled
    flush_scheduled: Arc<AtomicBool>,
    /// Fallback sequence for circles without a source event id
    anon_circle_seq: Arc<AtomicU64>,
    changed_tx: broadcast::Sender<OverlaySnapshot>,
    debounce: Duration,
}

impl OverlayStore {
    pub fn new(initial_ttl: Duration, debounce: Duration) -> Self {
        let (changed_tx, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            ttl_millis: Arc::new(AtomicU64::new(initial_ttl.as_millis() as u64)),
            flush_scheduled: Arc::new(AtomicBool::new(false)),
            anon_circle_seq: Arc::new(AtomicU64::new(0)),
            changed_tx,
            debounce,
        }
    }

    /// Queue lines for insertion, coalescing bursts into one visible update.
    ///
    /// Lines land in a pending buffer; the first call in a quiet period
    /// schedules a flush after the debounce window, and further calls within
    /// the window ride along. Content is therefore eventually consistent
    /// within the debounce window. Must be called from within a tokio
    /// runtime.
    pub fn add_lines_batched(&self, new_lines: Vec<LineOverlay>) {
        if new_lines.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock().expect("overlay store poisoned");
            state.pending_lines.extend(new_lines);
        }
        if !self.flush_scheduled.swap(true, Ordering::SeqCst) {
            let store = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(store.debounce).await;
                store.flush_pending();
            });
        }
    }

    /// Flush the pending line buffer into the visible set. Only ids not
    /// already present are appended (idempotent ingestion).
    pub fn flush_pending(&self) {
        self.flush_scheduled.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().expect("overlay store poisoned");
        if state.pending_lines.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut state.pending_lines);
        let before = state.lines.len();
        for line in pending {
            if !state.lines.iter().any(|l| l.id == line.id) {
                state.lines.push(line);
            }
        }
        let inserted = state.lines.len() - before;
        if inserted > 0 {
            debug!("Flushed {} new line overlay(s)", inserted);
            metrics::counter!("rdfmap.overlays.lines_added").increment(inserted as u64);
            self.notify(&state);
        }
    }

    /// Append a circle overlay. The id is `circle-{source_event_id}`;
    /// without an event id a monotonic counter provides a collision-free
    /// fallback. Duplicate ids are a no-op.
    pub fn add_circle(
        &self,
        center: LatLng,
        radius_miles: f64,
        source_event_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let id = match source_event_id {
            Some(event_id) => format!("circle-{event_id}"),
            None => {
                let n = self.anon_circle_seq.fetch_add(1, Ordering::SeqCst);
                format!("circle-anon-{n}")
            }
        };

        let mut state = self.state.lock().expect("overlay store poisoned");
        if state.circles.iter().any(|c| c.id == id) {
            trace!("Circle {} already present, skipping", id);
            return;
        }
        state.circles.push(CircleOverlay {
            id,
            center,
            radius_miles,
            created_at: now,
            pinned: false,
            source_event_id: source_event_id.map(str::to_string),
        });
        metrics::counter!("rdfmap.overlays.circles_added").increment(1);
        self.notify(&state);
    }

    /// Exempt an overlay from decay. Unknown id is a no-op; `created_at` is
    /// never touched.
    pub fn pin(&self, id: &str) {
        self.set_pinned(id, true);
    }

    /// Re-expose an overlay to decay. Unknown id is a no-op.
    pub fn unpin(&self, id: &str) {
        self.set_pinned(id, false);
    }

    fn set_pinned(&self, id: &str, pinned: bool) {
        let mut state = self.state.lock().expect("overlay store poisoned");
        let mut changed = false;
        if let Some(line) = state.lines.iter_mut().find(|l| l.id == id) {
            changed = line.pinned != pinned;
            line.pinned = pinned;
        } else if let Some(circle) = state.circles.iter_mut().find(|c| c.id == id) {
            changed = circle.pinned != pinned;
            circle.pinned = pinned;
        }
        if changed {
            self.notify(&state);
        }
    }

    /// Explicit deletion, bypassing decay. Unknown id is a no-op.
    pub fn remove(&self, id: &str) {
        let mut state = self.state.lock().expect("overlay store poisoned");
        let before = state.lines.len() + state.circles.len();
        state.lines.retain(|l| l.id != id);
        state.circles.retain(|c| c.id != id);
        if state.lines.len() + state.circles.len() != before {
            self.notify(&state);
        }
    }

    /// Remove every non-pinned overlay strictly older than the decay TTL.
    /// Returns the number of overlays removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl_millis.load(Ordering::SeqCst) as i64;
        let expired =
            |created_at: DateTime<Utc>| (now - created_at).num_milliseconds() > ttl;

        let mut state = self.state.lock().expect("overlay store poisoned");
        let before = state.lines.len() + state.circles.len();
        state.lines.retain(|l| l.pinned || !expired(l.created_at));
        state.circles.retain(|c| c.pinned || !expired(c.created_at));
        let removed = before - (state.lines.len() + state.circles.len());
        if removed > 0 {
            debug!("Decay sweep removed {} overlay(s)", removed);
            metrics::counter!("rdfmap.overlays.expired").increment(removed as u64);
            self.notify(&state);
        }
        removed
    }

    /// Adjust the shared decay TTL at runtime.
    pub fn set_decay_ttl(&self, ttl: Duration) {
        self.ttl_millis
            .store(ttl.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn decay_ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.load(Ordering::SeqCst))
    }

    /// Current visible contents (pending lines excluded).
    pub fn snapshot(&self) -> OverlaySnapshot {
        let state = self.state.lock().expect("overlay store poisoned");
        OverlaySnapshot {
            lines: state.lines.clone(),
            circles: state.circles.clone(),
        }
    }

    /// Subscribe to content changes. Each visible change pushes a full
    /// snapshot, so a renderer never needs to poll.
    pub fn subscribe(&self) -> broadcast::Receiver<OverlaySnapshot> {
        self.changed_tx.subscribe()
    }

    fn notify(&self, state: &StoreState) {
        metrics::gauge!("rdfmap.overlays.active")
            .set((state.lines.len() + state.circles.len()) as f64);
        let snapshot = OverlaySnapshot {
            lines: state.lines.clone(),
            circles: state.circles.clone(),
        };
        // No subscribers is fine; the send result only reports receiver count
        let _ = self.changed_tx.send(snapshot);
    }
}
