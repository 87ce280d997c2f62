//! Driver registry
//!
//! Process-wide owner of active trip sessions. Each session lives behind its
//! own lock, giving one driver's trip strictly single-writer mutation while
//! distinct drivers process fully in parallel. The registry holds no timer
//! thread; an external timer collaborator drives eviction through
//! [`DriverRegistry::evict_inactive`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::scoring::ScoringEngine;
use crate::session::TripSession;
use crate::types::TripSummary;

/// Default inactivity timeout before a session is eligible for eviction (seconds)
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: i64 = 300;

#[derive(Debug, Default)]
struct RegistryState {
    /// trip_id -> session
    sessions: HashMap<Uuid, Arc<Mutex<TripSession>>>,
    /// driver_id -> active trip ids
    by_driver: HashMap<String, Vec<Uuid>>,
}

/// Map from driver identity to active sessions; lifecycle and eviction owner.
#[derive(Debug)]
pub struct DriverRegistry {
    state: Mutex<RegistryState>,
    inactivity_timeout: Duration,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_INACTIVITY_TIMEOUT_SECS))
    }
}

impl DriverRegistry {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            inactivity_timeout,
        }
    }

    /// Start a new trip for a driver and return its id.
    pub fn start_trip(&self, driver_id: &str) -> Uuid {
        let session = TripSession::start(driver_id);
        let trip_id = session.trip_id();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .sessions
            .insert(trip_id, Arc::new(Mutex::new(session)));
        state
            .by_driver
            .entry(driver_id.to_string())
            .or_default()
            .push(trip_id);

        log::info!("trip {trip_id} started for driver {driver_id}");
        trip_id
    }

    /// Active trip ids for a driver.
    ///
    /// A driver is known once it has started at least one trip; a driver
    /// whose trips have all closed is still known, with no active trips.
    pub fn get_active(&self, driver_id: &str) -> Result<Vec<Uuid>, EngineError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .by_driver
            .get(driver_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDriver(driver_id.to_string()))
    }

    /// Look up the session for a trip owned by a specific driver.
    pub fn session_for_driver(
        &self,
        driver_id: &str,
        trip_id: Uuid,
    ) -> Result<Arc<Mutex<TripSession>>, EngineError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let trips = state
            .by_driver
            .get(driver_id)
            .ok_or_else(|| EngineError::UnknownDriver(driver_id.to_string()))?;
        if !trips.contains(&trip_id) {
            return Err(EngineError::UnknownTrip(trip_id.to_string()));
        }
        state
            .sessions
            .get(&trip_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTrip(trip_id.to_string()))
    }

    /// Close a trip, remove it from the active maps, and return its summary.
    pub fn close_trip(
        &self,
        trip_id: Uuid,
        scorer: &ScoringEngine,
    ) -> Result<TripSummary, EngineError> {
        let session = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .sessions
                .get(&trip_id)
                .cloned()
                .ok_or_else(|| EngineError::UnknownTrip(trip_id.to_string()))?
        };

        let summary = session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .close(scorer)?;
        self.forget(trip_id, &summary.driver_id);
        Ok(summary)
    }

    /// Close every session inactive beyond the timeout, on behalf of an
    /// external timer collaborator.
    pub fn evict_inactive(&self, now: DateTime<Utc>, scorer: &ScoringEngine) -> Vec<TripSummary> {
        let stale: Vec<Arc<Mutex<TripSession>>> = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .sessions
                .values()
                .filter(|s| {
                    let session = s.lock().unwrap_or_else(|e| e.into_inner());
                    now - session.last_activity() > self.inactivity_timeout
                })
                .cloned()
                .collect()
        };

        let mut summaries = Vec::new();
        for session in stale {
            let summary = {
                let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
                match session.close(scorer) {
                    Ok(summary) => summary,
                    // Raced with an explicit close; nothing left to do.
                    Err(_) => continue,
                }
            };
            log::warn!(
                "evicted inactive trip {} for driver {}",
                summary.trip_id,
                summary.driver_id
            );
            self.forget(summary.trip_id, &summary.driver_id);
            summaries.push(summary);
        }
        summaries
    }

    fn forget(&self, trip_id: Uuid, driver_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sessions.remove(&trip_id);
        if let Some(trips) = state.by_driver.get_mut(driver_id) {
            trips.retain(|id| *id != trip_id);
        }
    }
}
