//! Core types for the telematics pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: raw GPS points, per-batch feature vectors, trip summaries,
//! and daily records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// A single raw position sample captured by the vehicle.
///
/// Immutable once captured. Timestamps are strictly increasing within one
/// trip; the session layer enforces this across batches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,
    /// Capture time (UTC)
    pub timestamp: DateTime<Utc>,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Check that the coordinates are physically meaningful.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(-90.0..=90.0).contains(&self.latitude)
            || !(-180.0..=180.0).contains(&self.longitude)
            || !self.latitude.is_finite()
            || !self.longitude.is_finite()
        {
            return Err(EngineError::InvalidCoordinate {
                lat: self.latitude,
                lon: self.longitude,
            });
        }
        Ok(())
    }
}

/// Kinematic features reduced from one accepted batch.
///
/// `None` is the distinguished "not-available" marker for ratios that are
/// undefined on the batch (too few samples for the derivative chain). It is
/// never silently coerced to 0.
///
/// Field identifiers are stable strings consumed by downstream collaborators
/// and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean speed over the batch (m/s)
    #[serde(rename = "Speed(m/s)")]
    pub speed: Option<f64>,
    /// Mean acceleration over the batch (m/s^2)
    #[serde(rename = "Acceleration(m/s^2)")]
    pub acceleration: Option<f64>,
    /// Mean jerk over the batch (m/s^3)
    #[serde(rename = "Jerk(m/s^3)")]
    pub jerk: Option<f64>,
    /// Mean absolute heading change between consecutive segments (degrees)
    #[serde(rename = "Heading_Change(degrees)")]
    pub heading_change: Option<f64>,
    /// Fraction of acceleration samples below the hard-deceleration cutoff (0-1)
    #[serde(rename = "Braking_Intensity")]
    pub braking_intensity: Option<f64>,
    /// Fraction of sub-intervals where high speed and high heading change
    /// co-occur (0-1)
    #[serde(rename = "SASV")]
    pub sasv: Option<f64>,
    /// Whether any sample speed exceeded the configured limit
    #[serde(rename = "Speed_Violation")]
    pub speed_violation: bool,
}

impl FeatureVector {
    /// A vector with every feature marked not-available.
    ///
    /// Produced for degenerate trips that close without a single accepted
    /// batch.
    pub fn unavailable() -> Self {
        Self {
            speed: None,
            acceleration: None,
            jerk: None,
            heading_change: None,
            braking_intensity: None,
            sasv: None,
            speed_violation: false,
        }
    }
}

/// Trip lifecycle state.
///
/// `Closed` is terminal: a closed session is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    Idle,
    Moving,
    Closed,
}

impl TripState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripState::Idle => "idle",
            TripState::Moving => "moving",
            TripState::Closed => "closed",
        }
    }
}

/// Driving-behavior category, a monotonic step function of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingCategory {
    Safe,
    Moderate,
    Aggressive,
}

impl DrivingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrivingCategory::Safe => "safe",
            DrivingCategory::Moderate => "moderate",
            DrivingCategory::Aggressive => "aggressive",
        }
    }
}

/// Immutable summary produced when a trip closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSummary {
    /// Trip identifier
    pub trip_id: Uuid,
    /// Owning driver
    pub driver_id: String,
    /// When the trip started (UTC)
    pub start_time: DateTime<Utc>,
    /// Total accepted distance (meters)
    pub distance: f64,
    /// Per-batch feature history, in acceptance order
    pub features: Vec<FeatureVector>,
    /// Mean of the feature history (not-available where no batch defined it)
    pub mean_features: FeatureVector,
    /// Per-trip driving score, [0, 100]
    pub score: f64,
    /// Category derived from the per-trip score
    pub category: DrivingCategory,
}

/// Aggregated per-driver, per-day record.
///
/// One instance per (driver, date), created lazily on the first trip close
/// of the day. The day boundary rollover is owned by an external
/// collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub driver_id: String,
    pub date: NaiveDate,
    /// Number of trips folded into this record
    pub trip_count: u32,
    /// Sum of trip distances (meters)
    pub total_distance: f64,
    /// Running mean speed (m/s)
    #[serde(rename = "Speed(m/s)")]
    pub avg_speed: Option<f64>,
    /// Running mean acceleration (m/s^2)
    #[serde(rename = "Acceleration(m/s^2)")]
    pub avg_acceleration: Option<f64>,
    /// Running mean jerk (m/s^3)
    #[serde(rename = "Jerk(m/s^3)")]
    pub avg_jerk: Option<f64>,
    /// Running mean heading change (degrees)
    #[serde(rename = "Heading_Change(degrees)")]
    pub avg_heading_change: Option<f64>,
    /// Running mean braking intensity (0-1)
    #[serde(rename = "Braking_Intensity")]
    pub avg_braking_intensity: Option<f64>,
    /// Running mean SASV rate (0-1)
    #[serde(rename = "SASV")]
    pub avg_sasv: Option<f64>,
    /// Fraction of trips with a speed violation (0-1)
    #[serde(rename = "Speed_Violation")]
    pub speed_violation_rate: f64,
    /// Daily driving score, [0, 100]
    pub driving_score: f64,
    /// Category derived from the daily score
    pub category: DrivingCategory,
}
