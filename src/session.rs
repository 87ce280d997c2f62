//! Trip sessions
//!
//! A [`TripSession`] is the exclusive, order-dependent accumulator for one
//! trip: it gates incoming batches through the motion detector, folds
//! accepted batches into its feature history and cumulative distance, and
//! produces an immutable [`TripSummary`] on close. Batches must be applied
//! strictly in timestamp order; the registry enforces single-writer access.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::features::BatchFeatureExtractor;
use crate::geo;
use crate::motion::{MotionDecision, MotionStateDetector};
use crate::scoring::{ScoreInput, ScoringEngine};
use crate::types::{FeatureVector, GpsPoint, TripState, TripSummary};

/// Outcome of ingesting one batch.
///
/// Idle rejection is a normal outcome, distinct from the error set: the
/// vehicle was judged stationary, the batch was discarded, and no session
/// state changed besides the idle marker.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Batch accepted and reduced to a feature vector
    Accepted(FeatureVector),
    /// Batch rejected because the inter-batch speed fell below the motion
    /// threshold
    Idle,
}

/// Stateful per-trip accumulator.
#[derive(Debug, Clone)]
pub struct TripSession {
    trip_id: Uuid,
    driver_id: String,
    state: TripState,
    /// Per-batch feature vectors, in acceptance order
    features: Vec<FeatureVector>,
    /// Raw accepted points, retained for replay by collaborators
    points: Vec<GpsPoint>,
    /// Monotonically non-decreasing accepted distance (meters)
    cumulative_distance: f64,
    /// Creation time, replaced by the first accepted point's timestamp
    start_time: DateTime<Utc>,
    /// Last ingest attempt, used by the registry's eviction sweep
    last_activity: DateTime<Utc>,
}

impl TripSession {
    /// Start a new session in the Idle state.
    pub fn start(driver_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            trip_id: Uuid::new_v4(),
            driver_id: driver_id.into(),
            state: TripState::Idle,
            features: Vec::new(),
            points: Vec::new(),
            cumulative_distance: 0.0,
            start_time: now,
            last_activity: now,
        }
    }

    pub fn trip_id(&self) -> Uuid {
        self.trip_id
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub fn cumulative_distance(&self) -> f64 {
        self.cumulative_distance
    }

    pub fn feature_history(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Ingest one batch, all-or-nothing.
    ///
    /// The motion gate runs first; an idle lead-in discards the batch and
    /// reports [`BatchOutcome::Idle`]. Feature extraction runs before any
    /// mutation, so an erroring batch leaves the session untouched.
    pub fn ingest(
        &mut self,
        batch: &[GpsPoint],
        detector: &MotionStateDetector,
        extractor: &BatchFeatureExtractor,
    ) -> Result<BatchOutcome, EngineError> {
        if self.state == TripState::Closed {
            return Err(EngineError::TripAlreadyClosed(self.trip_id.to_string()));
        }
        if batch.is_empty() {
            return Err(EngineError::InsufficientPoints(0));
        }

        self.last_activity = Utc::now();

        let tail = self.points.last().copied();
        if detector.assess(tail.as_ref(), &batch[0])? == MotionDecision::RejectIdle {
            self.state = TripState::Idle;
            return Ok(BatchOutcome::Idle);
        }

        let extracted = extractor.extract(batch)?;

        // Everything validated; mutate.
        if let Some(tail) = tail {
            // The bridge from the session tail to the new batch is traveled
            // distance too.
            self.cumulative_distance += geo::distance(&tail, &batch[0]);
        } else {
            self.start_time = batch[0].timestamp;
        }
        self.cumulative_distance += extracted.distance;
        self.points.extend_from_slice(batch);
        self.features.push(extracted.vector.clone());
        self.state = TripState::Moving;

        Ok(BatchOutcome::Accepted(extracted.vector))
    }

    /// Close the session and produce its immutable summary.
    ///
    /// Closing twice is an error. A session may legally close while still
    /// Idle: the degenerate summary carries zero distance and all features
    /// not-available.
    pub fn close(&mut self, scorer: &ScoringEngine) -> Result<TripSummary, EngineError> {
        if self.state == TripState::Closed {
            return Err(EngineError::TripAlreadyClosed(self.trip_id.to_string()));
        }
        self.state = TripState::Closed;

        let mean_features = mean_feature_history(&self.features);
        let score = scorer.score(&ScoreInput::from_history(&self.features));
        let category = scorer.category(score);

        log::info!(
            "trip {} closed: {} batches, {:.0} m, score {:.1} ({})",
            self.trip_id,
            self.features.len(),
            self.cumulative_distance,
            score,
            category.as_str()
        );

        Ok(TripSummary {
            trip_id: self.trip_id,
            driver_id: self.driver_id.clone(),
            start_time: self.start_time,
            distance: self.cumulative_distance,
            features: self.features.clone(),
            mean_features,
            score,
            category,
        })
    }
}

/// Mean of a feature history per dimension, skipping not-available samples.
fn mean_feature_history(history: &[FeatureVector]) -> FeatureVector {
    fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
        let defined: Vec<f64> = values.flatten().collect();
        if defined.is_empty() {
            return None;
        }
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }

    FeatureVector {
        speed: mean(history.iter().map(|f| f.speed)),
        acceleration: mean(history.iter().map(|f| f.acceleration)),
        jerk: mean(history.iter().map(|f| f.jerk)),
        heading_change: mean(history.iter().map(|f| f.heading_change)),
        braking_intensity: mean(history.iter().map(|f| f.braking_intensity)),
        sasv: mean(history.iter().map(|f| f.sasv)),
        speed_violation: history.iter().any(|f| f.speed_violation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn point(lat: f64, lon: f64, seconds: i64) -> GpsPoint {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        GpsPoint::new(lat, lon, base + Duration::seconds(seconds))
    }

    /// Northbound segment of `n` points starting at `t0`, ~2.5 m/s.
    fn moving_batch(t0: i64, n: usize) -> Vec<GpsPoint> {
        (0..n)
            .map(|i| {
                point(
                    26.6337 + 0.00135 * (t0 / 60 + i as i64) as f64,
                    92.7926,
                    t0 + 60 * i as i64,
                )
            })
            .collect()
    }

    fn fixtures() -> (MotionStateDetector, BatchFeatureExtractor, ScoringEngine) {
        (
            MotionStateDetector::default(),
            BatchFeatureExtractor::default(),
            ScoringEngine::default(),
        )
    }

    #[test]
    fn test_first_batch_accepted_and_moves() {
        let (detector, extractor, _) = fixtures();
        let mut session = TripSession::start("driver-1");
        assert_eq!(session.state(), TripState::Idle);

        let outcome = session
            .ingest(&moving_batch(0, 4), &detector, &extractor)
            .unwrap();
        assert!(matches!(outcome, BatchOutcome::Accepted(_)));
        assert_eq!(session.state(), TripState::Moving);
        assert!(session.cumulative_distance() > 0.0);
        assert_eq!(session.feature_history().len(), 1);
        // Start time snaps to the first accepted point.
        assert_eq!(session.start_time, moving_batch(0, 4)[0].timestamp);
    }

    #[test]
    fn test_idle_rejection_leaves_state_untouched() {
        let (detector, extractor, _) = fixtures();
        let mut session = TripSession::start("driver-1");
        session
            .ingest(&moving_batch(0, 4), &detector, &extractor)
            .unwrap();
        let distance_before = session.cumulative_distance();

        // Next batch starts essentially where the tail ended, much later:
        // lead-in speed is near zero.
        let tail = moving_batch(0, 4)[3];
        let idle = vec![
            point(tail.latitude, tail.longitude, 600),
            point(tail.latitude + 0.00001, tail.longitude, 660),
        ];
        let outcome = session.ingest(&idle, &detector, &extractor).unwrap();

        assert_eq!(outcome, BatchOutcome::Idle);
        assert_eq!(session.state(), TripState::Idle);
        assert_eq!(session.cumulative_distance(), distance_before);
        assert_eq!(session.feature_history().len(), 1);
    }

    #[test]
    fn test_cumulative_distance_is_non_decreasing() {
        let (detector, extractor, _) = fixtures();
        let mut session = TripSession::start("driver-1");

        let mut last = 0.0;
        for i in 0..4 {
            session
                .ingest(&moving_batch(i * 240, 4), &detector, &extractor)
                .unwrap();
            assert!(session.cumulative_distance() >= last);
            last = session.cumulative_distance();
        }
        assert_eq!(session.feature_history().len(), 4);
    }

    #[test]
    fn test_erroring_batch_mutates_nothing() {
        let (detector, extractor, _) = fixtures();
        let mut session = TripSession::start("driver-1");
        session
            .ingest(&moving_batch(0, 4), &detector, &extractor)
            .unwrap();
        let distance_before = session.cumulative_distance();
        let state_before = session.state();

        // Identical timestamps inside the batch surface InvalidInterval.
        let t = 60 * 60;
        let bad = vec![point(26.8, 92.7926, t), point(26.801, 92.7926, t)];
        assert!(matches!(
            session.ingest(&bad, &detector, &extractor),
            Err(EngineError::InvalidInterval(_))
        ));

        assert_eq!(session.cumulative_distance(), distance_before);
        assert_eq!(session.state(), state_before);
        assert_eq!(session.feature_history().len(), 1);
    }

    #[test]
    fn test_non_monotonic_batch_start_is_rejected() {
        let (detector, extractor, _) = fixtures();
        let mut session = TripSession::start("driver-1");
        session
            .ingest(&moving_batch(0, 4), &detector, &extractor)
            .unwrap();

        // Tail ends at t=180; a batch starting at t=120 is in the past.
        assert!(matches!(
            session.ingest(&moving_batch(120, 2), &detector, &extractor),
            Err(EngineError::InvalidTimestamp(_))
        ));
        assert_eq!(session.state(), TripState::Moving);
    }

    #[test]
    fn test_close_produces_summary_and_is_terminal() {
        let (detector, extractor, scorer) = fixtures();
        let mut session = TripSession::start("driver-1");
        session
            .ingest(&moving_batch(0, 4), &detector, &extractor)
            .unwrap();

        let summary = session.close(&scorer).unwrap();
        assert_eq!(summary.driver_id, "driver-1");
        assert!(summary.distance > 0.0);
        assert_eq!(summary.features.len(), 1);
        assert!((0.0..=100.0).contains(&summary.score));
        assert_eq!(session.state(), TripState::Closed);

        // Closed is terminal: closing twice and ingesting both fail.
        assert!(matches!(
            session.close(&scorer),
            Err(EngineError::TripAlreadyClosed(_))
        ));
        assert!(matches!(
            session.ingest(&moving_batch(600, 2), &detector, &extractor),
            Err(EngineError::TripAlreadyClosed(_))
        ));
    }

    #[test]
    fn test_degenerate_idle_close() {
        let (_, _, scorer) = fixtures();
        let mut session = TripSession::start("driver-1");

        let summary = session.close(&scorer).unwrap();
        assert_eq!(summary.distance, 0.0);
        assert_eq!(summary.mean_features, FeatureVector::unavailable());
        // No penalties accrue from an empty history.
        assert_eq!(summary.score, 100.0);
    }
}
