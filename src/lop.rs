//! Line-of-position builder: turns a caller event plus the station registry
//! into zero or more directional line segments.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::events::CallerEvent;
use crate::geodesy::{METERS_PER_STATUTE_MILE, destination_point, parse_bearing};
use crate::overlay_store::LineOverlay;
use crate::stations::StationRegistry;

/// Projection distance for a line of position, in statute miles.
pub const LINE_LENGTH_MILES: f64 = 100.0;

/// Build line overlays for every receiver of `event` that resolves to a
/// known station and carries a parsable bearing.
///
/// Partial success is the expected case: an unknown station name or a
/// malformed bearing skips that receiver only, and the result may be empty.
/// Line ids are `{event_id}-{station_name}`, so rebuilding the same event
/// yields the same ids and the store's duplicate check makes re-insertion a
/// no-op.
pub fn build_lines(
    event: &CallerEvent,
    registry: &StationRegistry,
    now: DateTime<Utc>,
) -> Vec<LineOverlay> {
    let mut lines = Vec::new();

    for receiver in &event.receivers {
        let Some(station) = registry.find_by_name(&receiver.station_name) else {
            trace!(
                "Event {}: unknown station '{}', skipping receiver",
                event.id, receiver.station_name
            );
            continue;
        };

        let Some(bearing) = parse_bearing(&receiver.bearing_text) else {
            trace!(
                "Event {}: unparsable bearing '{}' from '{}', skipping receiver",
                event.id, receiver.bearing_text, receiver.station_name
            );
            continue;
        };

        let end = destination_point(
            station.location,
            bearing,
            LINE_LENGTH_MILES * METERS_PER_STATUTE_MILE,
        );

        lines.push(LineOverlay {
            id: format!("{}-{}", event.id, receiver.station_name),
            start: station.location,
            end,
            created_at: now,
            pinned: false,
            source_event_id: event.id.clone(),
        });
    }

    lines
}
