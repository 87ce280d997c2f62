//! Engine orchestration
//!
//! This module provides the public API surface consumed by external
//! collaborators (UI, persistence, transport). It wires the registry, the
//! feature pipeline, the daily store, and the event bus behind four calls:
//! `start_trip`, `ingest_batch`, `close_trip`, and `get_daily_record`.
//!
//! Every call is a synchronous, bounded computation; persistence, transport,
//! and timers are collaborator concerns.

use std::sync::mpsc::Receiver;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::daily::DailyStore;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::features::{BatchFeatureExtractor, FeatureConfig};
use crate::motion::{MotionStateDetector, DEFAULT_SPEED_THRESHOLD};
use crate::registry::{DriverRegistry, DEFAULT_INACTIVITY_TIMEOUT_SECS};
use crate::scoring::{ScoreWeights, ScoringEngine, DEFAULT_JERK_FULL_SCALE};
use crate::session::BatchOutcome;
use crate::types::{DailyRecord, GpsPoint, TripSummary};

/// Tunable knobs for the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Motion threshold for the idle gate (m/s)
    pub speed_threshold: f64,
    /// Feature-extraction thresholds
    pub features: FeatureConfig,
    /// Scoring penalty weights
    pub weights: ScoreWeights,
    /// Jerk magnitude mapped to full penalty (m/s^3)
    pub jerk_full_scale: f64,
    /// Session inactivity timeout used by the eviction sweep (seconds)
    pub inactivity_timeout_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed_threshold: DEFAULT_SPEED_THRESHOLD,
            features: FeatureConfig::default(),
            weights: ScoreWeights::default(),
            jerk_full_scale: DEFAULT_JERK_FULL_SCALE,
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT_SECS,
        }
    }
}

/// Stateful telematics engine: the single entry point for collaborators.
#[derive(Debug)]
pub struct TelematicsEngine {
    detector: MotionStateDetector,
    extractor: BatchFeatureExtractor,
    scorer: ScoringEngine,
    registry: DriverRegistry,
    daily: DailyStore,
    events: EventBus,
}

impl Default for TelematicsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TelematicsEngine {
    /// Create an engine with default settings.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            detector: MotionStateDetector::new(config.speed_threshold),
            extractor: BatchFeatureExtractor::new(config.features),
            scorer: ScoringEngine::new(config.weights, config.jerk_full_scale),
            registry: DriverRegistry::new(Duration::seconds(config.inactivity_timeout_secs)),
            daily: DailyStore::new(),
            events: EventBus::new(),
        }
    }

    /// Start a new trip for a driver.
    pub fn start_trip(&self, driver_id: &str) -> Uuid {
        self.registry.start_trip(driver_id)
    }

    /// Active trip ids for a driver.
    pub fn get_active(&self, driver_id: &str) -> Result<Vec<Uuid>, EngineError> {
        self.registry.get_active(driver_id)
    }

    /// Ingest one batch of points for a driver's trip.
    ///
    /// Batches for one trip must arrive in timestamp order; the session lock
    /// makes their application strictly sequential. Idle rejection comes
    /// back as [`BatchOutcome::Idle`], not as an error.
    pub fn ingest_batch(
        &self,
        driver_id: &str,
        trip_id: Uuid,
        points: &[GpsPoint],
    ) -> Result<BatchOutcome, EngineError> {
        let session = self.registry.session_for_driver(driver_id, trip_id)?;
        let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
        session.ingest(points, &self.detector, &self.extractor)
    }

    /// Close a trip: produce its summary, fold it into the daily record, and
    /// publish a [`EngineEvent::TripClosed`] event.
    pub fn close_trip(&self, trip_id: Uuid) -> Result<TripSummary, EngineError> {
        let summary = self.registry.close_trip(trip_id, &self.scorer)?;
        self.daily.accumulate(&summary);
        self.events.publish(EngineEvent::TripClosed(summary.clone()));
        Ok(summary)
    }

    /// Snapshot the daily record for a (driver, date) key.
    ///
    /// Finalizing twice without intervening trips returns identical records.
    pub fn get_daily_record(
        &self,
        driver_id: &str,
        date: NaiveDate,
    ) -> Result<DailyRecord, EngineError> {
        let record = self
            .daily
            .finalize(driver_id, date, &self.scorer)
            .ok_or_else(|| EngineError::UnknownDriver(driver_id.to_string()))?;
        self.events
            .publish(EngineEvent::DailyFinalized(record.clone()));
        Ok(record)
    }

    /// Close sessions inactive beyond the configured timeout, folding each
    /// into its daily record. Called by an external timer collaborator.
    pub fn evict_inactive(&self, now: DateTime<Utc>) -> Vec<TripSummary> {
        let summaries = self.registry.evict_inactive(now, &self.scorer);
        for summary in &summaries {
            self.daily.accumulate(summary);
            self.events
                .publish(EngineEvent::TripClosed(summary.clone()));
        }
        summaries
    }

    /// Subscribe to trip and daily events.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }
}
