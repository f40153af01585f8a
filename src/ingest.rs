//! Ingestion loop: polls the station and caller feeds and drives the engine.
//!
//! The station feed is fetched once at startup (and re-attempted on later
//! ticks while the registry is still empty, so a flaky start is not fatal).
//! The event feed is polled on a fixed period; a failed poll is logged and
//! the next scheduled tick proceeds independently.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::OverlayEngine;
use crate::events::{CallerEvent, EventRecord, FeedEnvelope, StationRecord};
use crate::stations::Station;

/// Source of the fixed-station (RFF) list.
#[async_trait]
pub trait StationFeed: Send + Sync {
    async fn fetch_stations(&self) -> Result<Vec<Station>>;
}

/// Source of caller events.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<CallerEvent>>;
}

/// HTTP implementation of both feeds against the `/caller/` backend.
pub struct HttpFeedClient {
    client: reqwest::Client,
    station_url: String,
    event_url: String,
}

impl HttpFeedClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rdfmap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            station_url: config.station_url.clone(),
            event_url: config.event_url.clone(),
        })
    }
}

#[async_trait]
impl StationFeed for HttpFeedClient {
    async fn fetch_stations(&self) -> Result<Vec<Station>> {
        let envelope: FeedEnvelope<StationRecord> = self
            .client
            .get(&self.station_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Malformed station feed from {}", self.station_url))?;
        Ok(envelope.into_records().into_iter().map(Station::from).collect())
    }
}

#[async_trait]
impl EventFeed for HttpFeedClient {
    async fn fetch_events(&self) -> Result<Vec<CallerEvent>> {
        let envelope: FeedEnvelope<EventRecord> = self
            .client
            .get(&self.event_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Malformed event feed from {}", self.event_url))?;
        Ok(envelope
            .into_records()
            .into_iter()
            .map(CallerEvent::from)
            .collect())
    }
}

/// Drives the engine from the two feeds.
pub struct IngestService {
    engine: Arc<OverlayEngine>,
    stations: Arc<dyn StationFeed>,
    events: Arc<dyn EventFeed>,
    poll_interval: Duration,
    recency_window: TimeDelta,
}

impl IngestService {
    pub fn new(
        engine: Arc<OverlayEngine>,
        stations: Arc<dyn StationFeed>,
        events: Arc<dyn EventFeed>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            stations,
            events,
            poll_interval: config.event_poll_interval(),
            recency_window: TimeDelta::seconds(config.recency_window_secs as i64),
        }
    }

    /// Fetch the station feed and rebuild the registry wholesale.
    pub async fn refresh_stations(&self) -> Result<usize> {
        let stations = self.stations.fetch_stations().await?;
        let count = stations.len();
        self.engine.replace_stations(stations);
        Ok(count)
    }

    /// One ingestion tick: fetch events, keep those inside the recency
    /// window, and feed them to the engine (which drops already-processed
    /// ids). Returns the number of newly processed events.
    ///
    /// While the registry is empty the tick is skipped entirely: consuming
    /// events then would mark their ids processed with every receiver a
    /// lookup miss, losing their lines for good. Left unconsumed, the feed
    /// re-sends them within the recency window once the stations land.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<usize> {
        if !self.engine.has_stations() {
            debug!("Station registry empty, leaving events unconsumed this tick");
            return Ok(0);
        }

        let raw = self.events.fetch_events().await?;
        let fetched = raw.len();

        let cutoff = now - self.recency_window;
        let recent: Vec<CallerEvent> =
            raw.into_iter().filter(|e| e.start_time >= cutoff).collect();
        debug!(
            "Poll fetched {} event(s), {} within recency window",
            fetched,
            recent.len()
        );
        metrics::counter!("rdfmap.events.fetched").increment(fetched as u64);

        Ok(self.engine.process_events(recent, now))
    }

    /// Run forever: stations once, then the event feed on a fixed period.
    ///
    /// The interval uses `MissedTickBehavior::Skip`, so a poll slower than
    /// the tick period skips ticks rather than queueing them; polls never
    /// overlap because the loop body is sequential.
    pub async fn run(&self) {
        match self.refresh_stations().await {
            Ok(count) => info!("Loaded {} station(s)", count),
            Err(e) => warn!("Initial station fetch failed: {:#}", e),
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // first tick completes immediately

        loop {
            interval.tick().await;

            // A flaky startup leaves the registry empty; keep re-trying the
            // one-shot station fetch until it lands.
            if !self.engine.has_stations() {
                if let Err(e) = self.refresh_stations().await {
                    warn!("Station fetch retry failed: {:#}", e);
                }
            }

            match self.poll_once(Utc::now()).await {
                Ok(0) => {}
                Ok(count) => info!("Ingested {} new event(s)", count),
                Err(e) => {
                    warn!("Event poll failed, will retry next tick: {:#}", e);
                    metrics::counter!("rdfmap.polls.failed").increment(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BearingReport;
    use crate::geodesy::LatLng;
    use anyhow::anyhow;

    struct FakeStationFeed(Vec<Station>);

    #[async_trait]
    impl StationFeed for FakeStationFeed {
        async fn fetch_stations(&self) -> Result<Vec<Station>> {
            Ok(self.0.clone())
        }
    }

    struct FakeEventFeed(std::sync::Mutex<Vec<CallerEvent>>);

    #[async_trait]
    impl EventFeed for FakeEventFeed {
        async fn fetch_events(&self) -> Result<Vec<CallerEvent>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct FailingEventFeed;

    #[async_trait]
    impl EventFeed for FailingEventFeed {
        async fn fetch_events(&self) -> Result<Vec<CallerEvent>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn alpha() -> Station {
        Station {
            id: "1".to_string(),
            name: "Alpha".to_string(),
            location: LatLng::new(34.0, -118.0),
        }
    }

    fn bearing_event(id: &str, start_time: DateTime<Utc>) -> CallerEvent {
        CallerEvent {
            id: id.to_string(),
            start_time,
            receivers: vec![BearingReport {
                station_name: "Alpha".to_string(),
                bearing_text: "90° 00' 00\"".to_string(),
            }],
            fix: None,
        }
    }

    fn service(events: Vec<CallerEvent>) -> IngestService {
        let config = Config::default();
        let engine = Arc::new(OverlayEngine::new(&config));
        IngestService::new(
            engine,
            Arc::new(FakeStationFeed(vec![alpha()])),
            Arc::new(FakeEventFeed(std::sync::Mutex::new(events))),
            &config,
        )
    }

    #[tokio::test]
    async fn test_poll_filters_stale_events() {
        let now = Utc::now();
        let svc = service(vec![
            bearing_event("fresh", now - TimeDelta::seconds(30)),
            bearing_event("stale", now - TimeDelta::seconds(600)),
        ]);
        svc.refresh_stations().await.unwrap();

        let count = svc.poll_once(now).await.unwrap();
        assert_eq!(count, 1);

        svc.engine.flush_pending();
        let lines = svc.engine.snapshot().lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, "fresh-Alpha");
    }

    #[tokio::test]
    async fn test_repolling_processed_events_is_a_noop() {
        let now = Utc::now();
        let svc = service(vec![bearing_event("e1", now)]);
        svc.refresh_stations().await.unwrap();

        assert_eq!(svc.poll_once(now).await.unwrap(), 1);
        assert_eq!(svc.poll_once(now).await.unwrap(), 0);

        svc.engine.flush_pending();
        assert_eq!(svc.engine.snapshot().lines.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_but_engine_is_untouched() {
        let config = Config::default();
        let engine = Arc::new(OverlayEngine::new(&config));
        let svc = IngestService::new(
            Arc::clone(&engine),
            Arc::new(FakeStationFeed(vec![alpha()])),
            Arc::new(FailingEventFeed),
            &config,
        );
        svc.refresh_stations().await.unwrap();

        assert!(svc.poll_once(Utc::now()).await.is_err());
        assert!(engine.snapshot().lines.is_empty());
    }

    #[tokio::test]
    async fn test_events_arriving_before_stations_are_not_lost() {
        // Station feed is down at startup; the event feed keeps re-sending
        // e1 within the recency window.
        let now = Utc::now();
        let svc = service(vec![bearing_event("e1", now)]);

        // Ticks while the registry is empty must leave e1 unconsumed
        assert_eq!(svc.poll_once(now).await.unwrap(), 0);
        assert_eq!(svc.poll_once(now).await.unwrap(), 0);
        svc.engine.flush_pending();
        assert!(svc.engine.snapshot().lines.is_empty());

        // Station feed recovers; the re-sent event now builds its line
        svc.refresh_stations().await.unwrap();
        assert_eq!(svc.poll_once(now).await.unwrap(), 1);
        svc.engine.flush_pending();

        let lines = svc.engine.snapshot().lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, "e1-Alpha");
    }

    #[tokio::test]
    async fn test_refresh_stations_rebuilds_registry() {
        let svc = service(vec![]);
        assert!(!svc.engine.has_stations());
        let count = svc.refresh_stations().await.unwrap();
        assert_eq!(count, 1);
        assert!(svc.engine.has_stations());
    }
}
