//! Geodesic kinematics
//!
//! Pure math over coordinate pairs: great-circle distance, speed,
//! acceleration, jerk, and heading change. Every function is stateless and
//! side-effect-free. No function fabricates a zero for an undefined ratio;
//! a non-positive time delta surfaces [`EngineError::InvalidInterval`].

use crate::error::EngineError;
use crate::types::GpsPoint;

/// Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle (haversine) distance between two points, in meters.
///
/// Symmetric; zero for identical points.
pub fn distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Elapsed time between two points in seconds.
pub fn elapsed_seconds(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    (p2.timestamp - p1.timestamp).num_milliseconds() as f64 / 1000.0
}

/// Average speed between two points, in m/s.
pub fn speed(p1: &GpsPoint, p2: &GpsPoint) -> Result<f64, EngineError> {
    let dt = elapsed_seconds(p1, p2);
    if dt <= 0.0 {
        return Err(EngineError::InvalidInterval(dt));
    }
    Ok(distance(p1, p2) / dt)
}

/// Change in speed over time between two consecutive speed samples, in m/s^2.
///
/// `dt` is the duration of the later sub-interval.
pub fn acceleration(speed1: f64, speed2: f64, dt: f64) -> Result<f64, EngineError> {
    if dt <= 0.0 {
        return Err(EngineError::InvalidInterval(dt));
    }
    Ok((speed2 - speed1) / dt)
}

/// Change in acceleration over time between two consecutive acceleration
/// samples, in m/s^3.
pub fn jerk(accel1: f64, accel2: f64, dt: f64) -> Result<f64, EngineError> {
    if dt <= 0.0 {
        return Err(EngineError::InvalidInterval(dt));
    }
    Ok((accel2 - accel1) / dt)
}

/// Initial compass bearing from `p1` to `p2`, normalized to [0, 360) degrees.
pub fn bearing(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let x = lat2.cos() * d_lon.sin();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Absolute bearing delta between segments (p1 -> p2) and (p2 -> p3),
/// wrapped into [0, 180] degrees.
pub fn heading_change(p1: &GpsPoint, p2: &GpsPoint, p3: &GpsPoint) -> f64 {
    let delta = (bearing(p2, p3) - bearing(p1, p2)).abs() % 360.0;
    if delta > 180.0 {
        360.0 - delta
    } else {
        delta
    }
}
