//! Batch feature extraction
//!
//! Reduces one accepted batch of GPS points to a single [`FeatureVector`]:
//! per-pair speeds, per-pair accelerations, per-pair jerks, and per-triple
//! heading changes, each collapsed to its arithmetic mean, plus the braking,
//! SASV, and speed-violation indicators.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geo;
use crate::types::{FeatureVector, GpsPoint};

/// Default hard-deceleration cutoff (m/s^2)
pub const DEFAULT_DECELERATION_CUTOFF: f64 = -3.0;
/// Default SASV speed threshold (m/s, ~30 km/h)
pub const DEFAULT_SASV_SPEED_THRESHOLD: f64 = 8.33;
/// Default SASV heading-change threshold (degrees)
pub const DEFAULT_SASV_HEADING_THRESHOLD: f64 = 45.0;
/// Default speed limit for the violation flag (m/s, ~120 km/h)
pub const DEFAULT_SPEED_LIMIT: f64 = 33.3;

/// Thresholds governing feature extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Acceleration below this counts as a hard-braking sample (m/s^2)
    pub deceleration_cutoff: f64,
    /// Speed above this can contribute to an SASV co-occurrence (m/s)
    pub sasv_speed_threshold: f64,
    /// Heading change above this can contribute to an SASV co-occurrence (degrees)
    pub sasv_heading_threshold: f64,
    /// Any sample speed above this raises the violation flag (m/s)
    pub speed_limit: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            deceleration_cutoff: DEFAULT_DECELERATION_CUTOFF,
            sasv_speed_threshold: DEFAULT_SASV_SPEED_THRESHOLD,
            sasv_heading_threshold: DEFAULT_SASV_HEADING_THRESHOLD,
            speed_limit: DEFAULT_SPEED_LIMIT,
        }
    }
}

/// Result of reducing one accepted batch.
#[derive(Debug, Clone)]
pub struct ExtractedBatch {
    /// The per-batch feature vector
    pub vector: FeatureVector,
    /// Sum of segment distances within the batch (meters)
    pub distance: f64,
}

/// Extractor that reduces an accepted batch to one feature vector.
#[derive(Debug, Clone, Default)]
pub struct BatchFeatureExtractor {
    config: FeatureConfig,
}

impl BatchFeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Extract the feature vector and total segment distance for a batch.
    ///
    /// Requires at least 2 points. Undefined ratios (series too short for
    /// the derivative chain) propagate as `None`, never as 0. Extraction is
    /// pure: on error nothing has been mutated anywhere.
    pub fn extract(&self, points: &[GpsPoint]) -> Result<ExtractedBatch, EngineError> {
        if points.len() < 2 {
            return Err(EngineError::InsufficientPoints(points.len()));
        }
        for p in points {
            p.validate()?;
        }

        // Per-pair speeds and segment durations. geo::speed surfaces
        // InvalidInterval for identical or reversed timestamps.
        let mut speeds = Vec::with_capacity(points.len() - 1);
        let mut intervals = Vec::with_capacity(points.len() - 1);
        let mut distance = 0.0;
        for pair in points.windows(2) {
            speeds.push(geo::speed(&pair[0], &pair[1])?);
            intervals.push(geo::elapsed_seconds(&pair[0], &pair[1]));
            distance += geo::distance(&pair[0], &pair[1]);
        }

        // Each derivative consumes the duration of its later sub-interval.
        let mut accelerations = Vec::new();
        for i in 1..speeds.len() {
            accelerations.push(geo::acceleration(speeds[i - 1], speeds[i], intervals[i])?);
        }
        let mut jerks = Vec::new();
        for i in 1..accelerations.len() {
            jerks.push(geo::jerk(
                accelerations[i - 1],
                accelerations[i],
                intervals[i + 1],
            )?);
        }

        let heading_changes: Vec<f64> = points
            .windows(3)
            .map(|w| geo::heading_change(&w[0], &w[1], &w[2]))
            .collect();

        let vector = FeatureVector {
            speed: mean(&speeds),
            acceleration: mean(&accelerations),
            jerk: mean(&jerks),
            heading_change: mean(&heading_changes),
            braking_intensity: compute_braking_intensity(
                &accelerations,
                self.config.deceleration_cutoff,
            ),
            sasv: compute_sasv(
                &speeds,
                &heading_changes,
                self.config.sasv_speed_threshold,
                self.config.sasv_heading_threshold,
            ),
            speed_violation: speeds.iter().any(|&s| s > self.config.speed_limit),
        };

        Ok(ExtractedBatch { vector, distance })
    }
}

fn mean(series: &[f64]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    Some(series.iter().sum::<f64>() / series.len() as f64)
}

/// Fraction of acceleration samples below the hard-deceleration cutoff, 0-1.
fn compute_braking_intensity(accelerations: &[f64], cutoff: f64) -> Option<f64> {
    if accelerations.is_empty() {
        return None;
    }
    let hard = accelerations.iter().filter(|&&a| a < cutoff).count();
    Some(hard as f64 / accelerations.len() as f64)
}

/// Fraction of sub-intervals where high speed and high heading change
/// co-occur, 0-1.
///
/// Heading sample `i` describes the turn into segment `i + 1`, so it is
/// paired with that segment's speed.
fn compute_sasv(
    speeds: &[f64],
    heading_changes: &[f64],
    speed_threshold: f64,
    heading_threshold: f64,
) -> Option<f64> {
    if heading_changes.is_empty() {
        return None;
    }
    let violations = heading_changes
        .iter()
        .enumerate()
        .filter(|&(i, &h)| h > heading_threshold && speeds[i + 1] > speed_threshold)
        .count();
    Some(violations as f64 / heading_changes.len() as f64)
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

    /// Straight northbound run at a steady ~2.5 m/s, 60 s per segment.
    fn steady_run(n: usize) -> Vec<GpsPoint> {
        (0..n)
            .map(|i| point(26.6337 + 0.00135 * i as f64, 92.7926, 60 * i as i64))
            .collect()
    }

    #[test]
    fn test_rejects_insufficient_points() {
        let extractor = BatchFeatureExtractor::default();
        assert!(matches!(
            extractor.extract(&[point(26.6337, 92.7926, 0)]),
            Err(EngineError::InsufficientPoints(1))
        ));
        assert!(matches!(
            extractor.extract(&[]),
            Err(EngineError::InsufficientPoints(0))
        ));
    }

    #[test]
    fn test_rejects_identical_timestamps() {
        let extractor = BatchFeatureExtractor::default();
        let batch = vec![point(26.6337, 92.7926, 0), point(26.6347, 92.7936, 0)];
        assert!(matches!(
            extractor.extract(&batch),
            Err(EngineError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        let extractor = BatchFeatureExtractor::default();
        let batch = vec![point(95.0, 92.7926, 0), point(26.6347, 92.7936, 60)];
        assert!(matches!(
            extractor.extract(&batch),
            Err(EngineError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_two_points_yield_speed_only() {
        let extractor = BatchFeatureExtractor::default();
        let batch = vec![point(26.6337, 92.7926, 0), point(26.6347, 92.7936, 60)];

        let extracted = extractor.extract(&batch).unwrap();
        let fv = extracted.vector;

        // One segment: speed is defined, every derivative is not.
        assert!(fv.speed.is_some());
        assert_eq!(fv.acceleration, None);
        assert_eq!(fv.jerk, None);
        assert_eq!(fv.heading_change, None);
        assert_eq!(fv.braking_intensity, None);
        assert_eq!(fv.sasv, None);
        assert!(!fv.speed_violation);
        assert!((extracted.distance - 149.1).abs() < 1.0);
    }

    #[test]
    fn test_steady_run_features() {
        let extractor = BatchFeatureExtractor::default();
        let extracted = extractor.extract(&steady_run(5)).unwrap();
        let fv = extracted.vector;

        // Constant speed northbound: near-zero acceleration, jerk, and
        // heading change, no braking, no SASV co-occurrence.
        let speed = fv.speed.unwrap();
        assert!((speed - 2.5).abs() < 0.1, "speed was {speed}");
        assert!(fv.acceleration.unwrap().abs() < 0.01);
        assert!(fv.jerk.unwrap().abs() < 0.01);
        assert!(fv.heading_change.unwrap() < 0.5);
        assert_eq!(fv.braking_intensity, Some(0.0));
        assert_eq!(fv.sasv, Some(0.0));
        assert!(!fv.speed_violation);
    }

    #[test]
    fn test_braking_intensity_counts_hard_decelerations() {
        let extractor = BatchFeatureExtractor::default();
        // Fast segment then a near stop over one second: acceleration of the
        // second sub-interval is far below -3 m/s^2.
        let batch = vec![
            point(26.6337, 92.7926, 0),
            point(26.6437, 92.7926, 60),
            point(26.64371, 92.7926, 61),
        ];

        let fv = extractor.extract(&batch).unwrap().vector;
        // One acceleration sample, and it is a hard braking event.
        assert_eq!(fv.braking_intensity, Some(1.0));
    }

    #[test]
    fn test_speed_violation_flag() {
        let extractor = BatchFeatureExtractor::default();
        // ~0.01 degrees latitude (~1112 m) in 30 s is ~37 m/s.
        let batch = vec![point(26.6337, 92.7926, 0), point(26.6437, 92.7926, 30)];
        let fv = extractor.extract(&batch).unwrap().vector;
        assert!(fv.speed_violation);
    }

    #[test]
    fn test_sasv_flags_fast_sharp_turns() {
        let extractor = BatchFeatureExtractor::default();
        // Fast northbound leg, then a fast 90 degree turn east: the single
        // heading sample pairs with an above-threshold segment speed.
        let batch = vec![
            point(26.6337, 92.7926, 0),
            point(26.6437, 92.7926, 60),
            point(26.6437, 92.8026, 120),
        ];

        let fv = extractor.extract(&batch).unwrap().vector;
        assert_eq!(fv.sasv, Some(1.0));
    }

    #[test]
    fn test_sasv_ignores_slow_turns() {
        let extractor = BatchFeatureExtractor::default();
        // Same 90 degree geometry but at ~2.5 m/s, below the SASV speed bar.
        let batch = vec![
            point(26.6337, 92.7926, 0),
            point(26.6350, 92.7926, 60),
            point(26.6350, 92.7941, 120),
        ];

        let fv = extractor.extract(&batch).unwrap().vector;
        assert_eq!(fv.sasv, Some(0.0));
    }
}
