//! DriveIQ Core - telematics compute engine for driving-behavior scoring
//!
//! The crate ingests batches of raw GPS position samples, decides whether
//! the vehicle is actually moving, derives kinematic driving-behavior
//! features from accepted batches, accumulates them per trip and per
//! (driver, day), and converts the aggregate into a bounded driving score
//! and category:
//!
//! raw batch → motion gate → feature extraction → trip session →
//! daily aggregation → scoring → daily record.
//!
//! Page rendering, persistence, transport, and timers are external
//! collaborators that call through [`TelematicsEngine`] and subscribe to its
//! events. The core performs no I/O and holds no timer threads.

pub mod daily;
pub mod engine;
pub mod error;
pub mod events;
pub mod features;
pub mod geo;
pub mod motion;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod types;

pub use daily::{DailyAggregator, DailyStore};
pub use engine::{EngineConfig, TelematicsEngine};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use features::{BatchFeatureExtractor, FeatureConfig};
pub use motion::{MotionDecision, MotionStateDetector};
pub use registry::DriverRegistry;
pub use scoring::{ScoreInput, ScoreWeights, ScoringEngine};
pub use session::{BatchOutcome, TripSession};
pub use types::{
    DailyRecord, DrivingCategory, FeatureVector, GpsPoint, TripState, TripSummary,
};

/// Engine version embedded by collaborators in exported payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
