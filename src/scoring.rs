//! Driving-behavior scoring
//!
//! Pure, deterministic mapping from an aggregated feature set to a bounded
//! score and category:
//!
//! ```text
//! score = clamp(100 - sum(w_i * penalty_i), 0, 100)
//! ```
//!
//! Penalties come from braking intensity, jerk, SASV, and the
//! speed-violation rate. Missing feature values contribute zero penalty;
//! scoring never fails on not-available inputs.

use serde::{Deserialize, Serialize};

use crate::types::{DrivingCategory, FeatureVector};

/// Jerk magnitude that earns the full jerk penalty (m/s^3)
pub const DEFAULT_JERK_FULL_SCALE: f64 = 2.0;

/// Penalty weights. Each weight is the number of score points lost when its
/// penalty saturates at 1.0; the defaults sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub braking: f64,
    pub jerk: f64,
    pub sasv: f64,
    pub speed_violation: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            braking: 35.0,
            jerk: 20.0,
            sasv: 25.0,
            speed_violation: 20.0,
        }
    }
}

/// Aggregated features handed to the scorer.
///
/// Built from a trip's feature history or a daily record's running means;
/// `None` marks a dimension with no defined samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInput {
    /// Mean braking intensity (0-1)
    pub braking_intensity: Option<f64>,
    /// Mean jerk (m/s^3)
    pub jerk: Option<f64>,
    /// Mean SASV rate (0-1)
    pub sasv: Option<f64>,
    /// Fraction of units (batches or trips) with a speed violation (0-1)
    pub speed_violation_rate: f64,
}

impl ScoreInput {
    /// Aggregate a feature history by arithmetic mean per dimension,
    /// skipping not-available samples.
    pub fn from_history(history: &[FeatureVector]) -> Self {
        let violations = history.iter().filter(|f| f.speed_violation).count();
        Self {
            braking_intensity: mean_of(history.iter().map(|f| f.braking_intensity)),
            jerk: mean_of(history.iter().map(|f| f.jerk)),
            sasv: mean_of(history.iter().map(|f| f.sasv)),
            speed_violation_rate: if history.is_empty() {
                0.0
            } else {
                violations as f64 / history.len() as f64
            },
        }
    }
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let defined: Vec<f64> = values.flatten().collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

/// Deterministic scoring rubric with configurable weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringEngine {
    pub weights: ScoreWeights,
    /// Jerk magnitude mapped to penalty 1.0 (m/s^3)
    pub jerk_full_scale: f64,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            jerk_full_scale: DEFAULT_JERK_FULL_SCALE,
        }
    }
}

impl ScoringEngine {
    pub fn new(weights: ScoreWeights, jerk_full_scale: f64) -> Self {
        Self {
            weights,
            jerk_full_scale,
        }
    }

    /// Compute the driving score, always within [0, 100].
    pub fn score(&self, input: &ScoreInput) -> f64 {
        let braking_penalty = input.braking_intensity.unwrap_or(0.0).clamp(0.0, 1.0);
        let jerk_penalty = input
            .jerk
            .map(|j| (j.abs() / self.jerk_full_scale).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        let sasv_penalty = input.sasv.unwrap_or(0.0).clamp(0.0, 1.0);
        let violation_penalty = input.speed_violation_rate.clamp(0.0, 1.0);

        let total_penalty = self.weights.braking * braking_penalty
            + self.weights.jerk * jerk_penalty
            + self.weights.sasv * sasv_penalty
            + self.weights.speed_violation * violation_penalty;

        (100.0 - total_penalty).clamp(0.0, 100.0)
    }

    /// Categorize a finalized score: a monotonic step function.
    pub fn category(&self, score: f64) -> DrivingCategory {
        if score >= 80.0 {
            DrivingCategory::Safe
        } else if score >= 50.0 {
            DrivingCategory::Moderate
        } else {
            DrivingCategory::Aggressive
        }
    }
}
