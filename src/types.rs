use serde::{Deserialize, Serialize};

/// One raw fix from the host location subsystem. Never mutated; each fix is
/// superseded by the next.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GpsSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
    pub speed_mps: Option<f64>,
    pub accuracy_m: Option<f64>,
}

impl GpsSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        GpsSample {
            latitude,
            longitude,
            timestamp_ms,
            speed_mps: None,
            accuracy_m: None,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Recorded path point (the accepted-for-path channel).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
}

impl From<&GpsSample> for TrackPoint {
    fn from(sample: &GpsSample) -> Self {
        TrackPoint {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp_ms: sample.timestamp_ms,
        }
    }
}

/// Cumulative (distance, timestamp) checkpoint consumed by the distance
/// window estimator. Entries older than the window are evicted on push.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PaceSnapshot {
    pub distance_m: f64,
    pub timestamp_ms: i64,
}

/// Most recent accepted-for-pace observation. One logical slot, overwritten.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaceSignal {
    pub timestamp_ms: i64,
    pub speed_mps: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub distance_delta_m: Option<f64>,
}

/// Active tracking session record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunningSession {
    pub id: i64,
    pub start_time_ms: i64,
    pub is_active: bool,
    pub total_distance_m: f64,
    pub location_count: i32,
}

impl RunningSession {
    pub fn new(id: i64, start_time_ms: i64) -> Self {
        RunningSession {
            id,
            start_time_ms,
            is_active: true,
            total_distance_m: 0.0,
            location_count: 0,
        }
    }
}

/// Display-oriented pace in seconds per kilometer. `total_seconds` is the
/// source of truth; minutes/seconds are its decomposition. A zeroed value is
/// the "no pace" sentinel shown while stationary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaceData {
    pub minutes: i32,
    pub seconds: i32,
    pub total_seconds: i32,
}

impl PaceData {
    pub fn from_seconds_per_km(seconds_per_km: f64) -> Self {
        if !seconds_per_km.is_finite() || seconds_per_km <= 0.0 {
            return PaceData::none();
        }
        let total = seconds_per_km.round() as i32;
        PaceData {
            minutes: total / 60,
            seconds: total % 60,
            total_seconds: total,
        }
    }

    /// Sentinel shown when no meaningful pace exists (stationary, no data).
    pub fn none() -> Self {
        PaceData {
            minutes: 0,
            seconds: 0,
            total_seconds: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.total_seconds == 0
    }
}

impl Default for PaceData {
    fn default() -> Self {
        PaceData::none()
    }
}

/// Last fusion result, persisted so pace queries are pure reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaceOutput {
    pub pace: PaceData,
    pub fused_speed_mps: f64,
    pub is_stationary: bool,
}

impl Default for PaceOutput {
    fn default() -> Self {
        PaceOutput {
            pace: PaceData::none(),
            fused_speed_mps: 0.0,
            is_stationary: false,
        }
    }
}
