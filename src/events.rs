//! Caller event types and the wire-layer records of the polled feeds.
//!
//! A `CallerEvent` is transient: it is consumed once, its id is remembered
//! by the deduplicator, and only its derived geometry survives in the
//! overlay store.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::geodesy::LatLng;
use crate::stations::Station;

/// One bearing observation from a named receiving station.
#[derive(Debug, Clone, PartialEq)]
pub struct BearingReport {
    pub station_name: String,
    pub bearing_text: String,
}

/// A reported radio emission with one or more bearing observations,
/// optionally carrying a computed position fix.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerEvent {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub receivers: Vec<BearingReport>,
    pub fix: Option<LatLng>,
}

/// Feed envelope — both `/caller/` feeds wrap their payload in
/// `{"data": [[...records...]]}` and only the first inner collection
/// carries records.
#[derive(Debug, Deserialize)]
pub struct FeedEnvelope<T> {
    pub data: Vec<Vec<T>>,
}

impl<T> FeedEnvelope<T> {
    /// Take the first inner collection, or empty when the envelope is bare.
    pub fn into_records(self) -> Vec<T> {
        self.data.into_iter().next().unwrap_or_default()
    }
}

/// Station feed record — wire layer.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<StationRecord> for Station {
    fn from(r: StationRecord) -> Self {
        Station {
            id: r.id,
            name: r.name,
            location: LatLng::new(r.lat, r.lng),
        }
    }
}

/// Event feed record — wire layer.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub id: String,
    #[serde(rename = "start-time")]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub receivers: Vec<ReceiverRecord>,
    #[serde(default)]
    pub fix: Option<FixRecord>,
}

/// Receiver entry — wire layer. The feed names the station under `RFF`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverRecord {
    #[serde(rename = "RFF")]
    pub rff: String,
    pub bearing: String,
}

/// Position fix — wire layer. Note the feed spells longitude `long`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FixRecord {
    pub lat: f64,
    pub long: f64,
}

impl From<EventRecord> for CallerEvent {
    fn from(r: EventRecord) -> Self {
        CallerEvent {
            id: r.id,
            start_time: r.start_time,
            receivers: r
                .receivers
                .into_iter()
                .map(|rec| BearingReport {
                    station_name: rec.rff,
                    bearing_text: rec.bearing,
                })
                .collect(),
            fix: r.fix.map(|f| LatLng::new(f.lat, f.long)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_feed_envelope_parsing() {
        let json = r#"{"data":[[{"id":"1","name":"Alpha","lat":34.0,"lng":-118.0}]]}"#;
        let envelope: FeedEnvelope<StationRecord> = serde_json::from_str(json).unwrap();
        let stations: Vec<Station> = envelope
            .into_records()
            .into_iter()
            .map(Station::from)
            .collect();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Alpha");
        assert_eq!(stations[0].location, LatLng::new(34.0, -118.0));
    }

    #[test]
    fn test_empty_envelope() {
        let json = r#"{"data":[]}"#;
        let envelope: FeedEnvelope<StationRecord> = serde_json::from_str(json).unwrap();
        assert!(envelope.into_records().is_empty());
    }

    #[test]
    fn test_event_record_parsing() {
        let json = r#"{
            "id": "e1",
            "start-time": "2024-05-01T12:00:00Z",
            "receivers": [{"RFF": "Alpha", "bearing": "163° 40' 08\""}],
            "fix": {"lat": 10.0, "long": 20.0}
        }"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        let event = CallerEvent::from(record);
        assert_eq!(event.id, "e1");
        assert_eq!(event.receivers.len(), 1);
        assert_eq!(event.receivers[0].station_name, "Alpha");
        assert_eq!(event.fix, Some(LatLng::new(10.0, 20.0)));
    }

    #[test]
    fn test_event_record_without_fix_or_receivers() {
        let json = r#"{"id": "e2", "start-time": "2024-05-01T12:00:00Z"}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        let event = CallerEvent::from(record);
        assert!(event.receivers.is_empty());
        assert!(event.fix.is_none());
    }
}
