//! Error types for the telematics engine

use thiserror::Error;

/// Errors that can occur while ingesting or processing telematics data.
///
/// An erroring batch produces no partial state mutation: acceptance is
/// all-or-nothing. Idle rejection is a normal outcome, not an error, and is
/// reported through [`crate::session::BatchOutcome`] instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid time interval: delta must be positive, got {0} s")]
    InvalidInterval(f64),

    #[error("Insufficient points in batch: need at least 2, got {0}")]
    InsufficientPoints(usize),

    #[error("Coordinate out of range: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Non-monotonic timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("Unknown trip: {0}")]
    UnknownTrip(String),

    #[error("Trip already closed: {0}")]
    TripAlreadyClosed(String),
}
