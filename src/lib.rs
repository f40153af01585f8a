//! rdfmap - decaying geospatial overlay engine
//!
//! This library ingests radio-direction-finding caller events against known
//! fixed stations (RFFs) and maintains a live, self-expiring set of map
//! overlays: lines of position and position-fix circles, deduplicated,
//! batch-inserted, and evicted on a time-to-live policy unless pinned.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod events;
pub mod geodesy;
pub mod ingest;
pub mod lop;
pub mod overlay_store;
pub mod stations;

pub use config::Config;
pub use engine::OverlayEngine;
pub use events::{BearingReport, CallerEvent};
pub use geodesy::{DistanceUnit, LatLng};
pub use ingest::{EventFeed, HttpFeedClient, IngestService, StationFeed};
pub use overlay_store::{CircleOverlay, LineOverlay, OverlaySnapshot, OverlayStore};
pub use stations::{Station, StationRegistry};
