//! Motion-state detection
//!
//! Decides idle vs. moving at batch boundaries. The detector compares the
//! last point of the session's prior tail against the first point of the
//! incoming batch: below the speed threshold the vehicle is judged
//! stationary and the batch is rejected without being scored.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geo;
use crate::types::GpsPoint;

/// Default motion threshold in m/s (~7.2 km/h)
pub const DEFAULT_SPEED_THRESHOLD: f64 = 2.0;

/// Decision for an incoming batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionDecision {
    /// The vehicle is moving; merge and score the batch.
    Accept,
    /// Inter-batch speed fell below the threshold; discard the batch.
    RejectIdle,
}

/// Gate that decides whether an incoming batch represents actual movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionStateDetector {
    /// Minimum inter-batch speed to count as movement (m/s)
    pub speed_threshold: f64,
}

impl Default for MotionStateDetector {
    fn default() -> Self {
        Self {
            speed_threshold: DEFAULT_SPEED_THRESHOLD,
        }
    }
}

impl MotionStateDetector {
    pub fn new(speed_threshold: f64) -> Self {
        Self { speed_threshold }
    }

    /// Assess the lead-in from the session tail to the incoming batch.
    ///
    /// The first batch of a session has no tail and is unconditionally
    /// accepted. A zero-or-negative time delta between tail and batch is not
    /// idleness; it surfaces [`EngineError::InvalidTimestamp`] so the caller
    /// can reject the batch without mutating session state.
    pub fn assess(
        &self,
        tail: Option<&GpsPoint>,
        first: &GpsPoint,
    ) -> Result<MotionDecision, EngineError> {
        let tail = match tail {
            Some(t) => t,
            None => return Ok(MotionDecision::Accept),
        };

        let dt = geo::elapsed_seconds(tail, first);
        if dt <= 0.0 {
            return Err(EngineError::InvalidTimestamp(format!(
                "batch starts {dt} s relative to the session tail"
            )));
        }

        let lead_in_speed = geo::distance(tail, first) / dt;
        if lead_in_speed < self.speed_threshold {
            log::debug!(
                "idle lead-in: {lead_in_speed:.2} m/s below threshold {:.2} m/s",
                self.speed_threshold
            );
            Ok(MotionDecision::RejectIdle)
        } else {
            Ok(MotionDecision::Accept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn point(lat: f64, lon: f64, seconds: i64) -> GpsPoint {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        GpsPoint::new(lat, lon, base + Duration::seconds(seconds))
    }

    #[test]
    fn test_first_batch_is_always_accepted() {
        let detector = MotionStateDetector::default();
        let first = point(26.6337, 92.7926, 0);
        assert_eq!(
            detector.assess(None, &first).unwrap(),
            MotionDecision::Accept
        );
    }

    #[test]
    fn test_moving_lead_in_is_accepted() {
        // ~149 m in 60 s is ~2.5 m/s, above the 2 m/s default.
        let detector = MotionStateDetector::default();
        let tail = point(26.6337, 92.7926, 0);
        let first = point(26.6347, 92.7936, 60);
        assert_eq!(
            detector.assess(Some(&tail), &first).unwrap(),
            MotionDecision::Accept
        );
    }

    #[test]
    fn test_slow_lead_in_is_rejected_as_idle() {
        // ~15 m in 60 s is well below the threshold.
        let detector = MotionStateDetector::default();
        let tail = point(26.6337, 92.7926, 0);
        let first = point(26.63383, 92.7926, 60);
        assert_eq!(
            detector.assess(Some(&tail), &first).unwrap(),
            MotionDecision::RejectIdle
        );
    }

    #[test]
    fn test_non_monotonic_tail_is_an_error_not_idle() {
        let detector = MotionStateDetector::default();
        let tail = point(26.6337, 92.7926, 60);
        let same_time = point(26.6347, 92.7936, 60);
        let earlier = point(26.6347, 92.7936, 30);

        assert!(matches!(
            detector.assess(Some(&tail), &same_time),
            Err(EngineError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            detector.assess(Some(&tail), &earlier),
            Err(EngineError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_custom_threshold() {
        let detector = MotionStateDetector::new(5.0);
        let tail = point(26.6337, 92.7926, 0);
        let first = point(26.6347, 92.7936, 60);
        // ~2.5 m/s is moving under the default but idle under 5 m/s.
        assert_eq!(
            detector.assess(Some(&tail), &first).unwrap(),
            MotionDecision::RejectIdle
        );
    }
}
