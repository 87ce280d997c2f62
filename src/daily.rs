//! Daily aggregation
//!
//! Folds trip summaries into per-driver, per-day records using incremental
//! mean updates, so no per-trip history is retained. The day key comes from
//! trip start timestamps, not wall-clock receipt time. Same-key accumulation
//! is serialized behind a per-key lock; distinct keys are independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreInput, ScoringEngine};
use crate::types::{DailyRecord, TripSummary};

/// Incremental (Welford-style) running mean.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RunningMean {
    count: u64,
    mean: f64,
}

impl RunningMean {
    fn update(&mut self, sample: f64) {
        self.count += 1;
        self.mean += (sample - self.mean) / self.count as f64;
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }
}

/// Running per-driver, per-day aggregate of trip summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAggregator {
    driver_id: String,
    date: NaiveDate,
    trip_count: u32,
    total_distance: f64,
    /// Trips whose summary carried a speed violation
    violation_trips: u32,
    speed: RunningMean,
    acceleration: RunningMean,
    jerk: RunningMean,
    heading_change: RunningMean,
    braking_intensity: RunningMean,
    sasv: RunningMean,
}

impl DailyAggregator {
    pub fn new(driver_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            driver_id: driver_id.into(),
            date,
            trip_count: 0,
            total_distance: 0.0,
            violation_trips: 0,
            speed: RunningMean::default(),
            acceleration: RunningMean::default(),
            jerk: RunningMean::default(),
            heading_change: RunningMean::default(),
            braking_intensity: RunningMean::default(),
            sasv: RunningMean::default(),
        }
    }

    pub fn trip_count(&self) -> u32 {
        self.trip_count
    }

    /// Fold one trip summary into the running record.
    ///
    /// Not-available feature dimensions are skipped, never counted as 0.
    pub fn accumulate(&mut self, summary: &TripSummary) {
        self.trip_count += 1;
        self.total_distance += summary.distance;
        if summary.mean_features.speed_violation {
            self.violation_trips += 1;
        }

        let f = &summary.mean_features;
        if let Some(v) = f.speed {
            self.speed.update(v);
        }
        if let Some(v) = f.acceleration {
            self.acceleration.update(v);
        }
        if let Some(v) = f.jerk {
            self.jerk.update(v);
        }
        if let Some(v) = f.heading_change {
            self.heading_change.update(v);
        }
        if let Some(v) = f.braking_intensity {
            self.braking_intensity.update(v);
        }
        if let Some(v) = f.sasv {
            self.sasv.update(v);
        }
    }

    fn speed_violation_rate(&self) -> f64 {
        if self.trip_count == 0 {
            0.0
        } else {
            self.violation_trips as f64 / self.trip_count as f64
        }
    }

    /// Produce a snapshot record and score it.
    ///
    /// Pure over the current aggregate state: calling it twice without new
    /// accumulates returns identical records.
    pub fn finalize(&self, scorer: &ScoringEngine) -> DailyRecord {
        let input = ScoreInput {
            braking_intensity: self.braking_intensity.value(),
            jerk: self.jerk.value(),
            sasv: self.sasv.value(),
            speed_violation_rate: self.speed_violation_rate(),
        };
        let driving_score = scorer.score(&input);

        DailyRecord {
            driver_id: self.driver_id.clone(),
            date: self.date,
            trip_count: self.trip_count,
            total_distance: self.total_distance,
            avg_speed: self.speed.value(),
            avg_acceleration: self.acceleration.value(),
            avg_jerk: self.jerk.value(),
            avg_heading_change: self.heading_change.value(),
            avg_braking_intensity: self.braking_intensity.value(),
            avg_sasv: self.sasv.value(),
            speed_violation_rate: self.speed_violation_rate(),
            driving_score,
            category: scorer.category(driving_score),
        }
    }
}

/// Store of daily aggregates keyed by (driver, date).
///
/// Records are created lazily on the first accumulate for a key. The map
/// lock is held only to fetch the per-key entry; accumulation itself holds
/// the entry lock, so different keys fold in parallel while one key folds
/// strictly serially. Day rollover is owned externally via [`remove`].
///
/// [`remove`]: DailyStore::remove
#[derive(Debug, Default)]
pub struct DailyStore {
    inner: Mutex<HashMap<(String, NaiveDate), Arc<Mutex<DailyAggregator>>>>,
}

impl DailyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, driver_id: &str, date: NaiveDate) -> Arc<Mutex<DailyAggregator>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry((driver_id.to_string(), date))
            .or_insert_with(|| Arc::new(Mutex::new(DailyAggregator::new(driver_id, date))))
            .clone()
    }

    /// Fold a trip summary into its (driver, date) record, keyed by the
    /// trip's start timestamp.
    pub fn accumulate(&self, summary: &TripSummary) {
        let date = summary.start_time.date_naive();
        let entry = self.entry(&summary.driver_id, date);
        let mut aggregator = entry.lock().unwrap_or_else(|e| e.into_inner());
        aggregator.accumulate(summary);
        log::debug!(
            "daily {}/{}: {} trips after fold",
            summary.driver_id,
            date,
            aggregator.trip_count()
        );
    }

    /// Snapshot and score the record for a key, if one exists.
    pub fn finalize(
        &self,
        driver_id: &str,
        date: NaiveDate,
        scorer: &ScoringEngine,
    ) -> Option<DailyRecord> {
        let entry = {
            let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.get(&(driver_id.to_string(), date)).cloned()
        }?;
        let aggregator = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(aggregator.finalize(scorer))
    }

    /// Drop the record for a key; used by the external day-rollover owner.
    pub fn remove(&self, driver_id: &str, date: NaiveDate) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&(driver_id.to_string(), date)).is_some()
    }
}
