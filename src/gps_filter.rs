// gps_filter.rs — per-fix acceptance gating for the run tracker
//
// Takes the previous accepted raw sample and a new raw sample and decides,
// independently for the three downstream consumers (distance accumulation,
// path recording, pace estimation), whether the new sample should be trusted.
// Pure: no I/O, no shared state. The caller owns FilterState and threads it
// through explicitly.

use serde::{Deserialize, Serialize};

use crate::types::GpsSample;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Per-channel acceptance thresholds. The three channels are deliberately
/// independent knobs: the trust bar differs per downstream use.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    // ── Distance accumulation gate ──
    pub distance_max_accuracy_m: f64,
    pub distance_min_step_m: f64,
    pub distance_max_step_m: f64,

    // ── Path recording gate (looser, keeps the drawn track continuous) ──
    pub path_max_accuracy_m: f64,
    pub path_max_step_m: f64,

    // ── Pace gate ──
    pub pace_max_accuracy_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            distance_max_accuracy_m: 20.0,
            distance_min_step_m: 2.0,
            distance_max_step_m: 100.0,
            path_max_accuracy_m: 35.0,
            path_max_step_m: 250.0,
            pace_max_accuracy_m: 20.0,
        }
    }
}

/// Continuity anchor between fixes. Cleared at session start, pause and
/// resume so the first fix after a gap only seeds and never produces a jump.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub last_sample: Option<GpsSample>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.last_sample = None;
    }

    pub fn anchor_timestamp_ms(&self) -> Option<i64> {
        self.last_sample.as_ref().map(|s| s.timestamp_ms)
    }
}

/// Verdict for one sample pair. Consumed immediately by the batch handler.
#[derive(Clone, Copy, Debug)]
pub struct FilterResult {
    pub distance_m: f64,
    pub speed_mps: f64,
    pub accepted_for_distance: bool,
    pub accepted_for_path: bool,
    pub accepted_for_pace: bool,
}

impl FilterResult {
    fn seed_only() -> Self {
        FilterResult {
            distance_m: 0.0,
            speed_mps: 0.0,
            accepted_for_distance: false,
            accepted_for_path: false,
            accepted_for_pace: false,
        }
    }
}

/// Evaluate one new fix against the previous anchor.
///
/// With no anchor the fix only seeds state: distance 0, all channels
/// rejected. The caller updates `FilterState.last_sample` after every
/// evaluation regardless of the verdict (rejected samples still anchor the
/// next comparison).
pub fn evaluate(prev: &FilterState, current: &GpsSample, cfg: &FilterConfig) -> FilterResult {
    let Some(last) = prev.last_sample.as_ref() else {
        return FilterResult::seed_only();
    };

    if !current.latitude.is_finite() || !current.longitude.is_finite() {
        return FilterResult::seed_only();
    }

    let distance_m = haversine_distance(
        last.latitude,
        last.longitude,
        current.latitude,
        current.longitude,
    );
    if !distance_m.is_finite() {
        return FilterResult::seed_only();
    }

    let elapsed_s = (current.timestamp_ms - last.timestamp_ms) as f64 / 1000.0;
    // Identical timestamps must not divide: zero speed, not usable for pace.
    let derived_speed = if elapsed_s > 0.0 {
        distance_m / elapsed_s
    } else {
        0.0
    };

    let device_speed = current
        .speed_mps
        .filter(|s| s.is_finite() && *s >= 0.0);

    let speed_mps = device_speed.unwrap_or(derived_speed);

    let accepted_for_distance = accuracy_within(current.accuracy_m, cfg.distance_max_accuracy_m)
        && distance_m >= cfg.distance_min_step_m
        && distance_m <= cfg.distance_max_step_m;

    let accepted_for_path = accuracy_within(current.accuracy_m, cfg.path_max_accuracy_m)
        && distance_m <= cfg.path_max_step_m;

    let has_usable_speed = device_speed.is_some() || (elapsed_s > 0.0 && derived_speed.is_finite());
    let accepted_for_pace =
        accuracy_within(current.accuracy_m, cfg.pace_max_accuracy_m) && has_usable_speed;

    FilterResult {
        distance_m,
        speed_mps,
        accepted_for_distance,
        accepted_for_path,
        accepted_for_pace,
    }
}

/// Missing accuracy is trusted per policy default; a non-finite accuracy
/// field fails the gate.
fn accuracy_within(accuracy_m: Option<f64>, ceiling_m: f64) -> bool {
    match accuracy_m {
        None => true,
        Some(a) => a.is_finite() && a <= ceiling_m,
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ~1 degree of latitude is 111.19 km on the sphere used here
    const METERS_PER_DEG_LAT: f64 = 111_194.9;

    fn state_with(sample: GpsSample) -> FilterState {
        FilterState {
            last_sample: Some(sample),
        }
    }

    fn north_of(base: &GpsSample, meters: f64, dt_ms: i64) -> GpsSample {
        GpsSample {
            latitude: base.latitude + meters / METERS_PER_DEG_LAT,
            longitude: base.longitude,
            timestamp_ms: base.timestamp_ms + dt_ms,
            speed_mps: None,
            accuracy_m: base.accuracy_m,
        }
    }

    #[test]
    fn test_first_sample_only_seeds() {
        let state = FilterState::new();
        let sample = GpsSample::new(47.37, 8.54, 1_000).with_accuracy(5.0);
        let result = evaluate(&state, &sample, &FilterConfig::default());

        assert_eq!(result.distance_m, 0.0);
        assert!(!result.accepted_for_distance);
        assert!(!result.accepted_for_path);
        assert!(!result.accepted_for_pace);
    }

    #[test]
    fn test_haversine_known_distance() {
        let base = GpsSample::new(47.37, 8.54, 0);
        let moved = north_of(&base, 100.0, 1_000);
        let d = haversine_distance(base.latitude, base.longitude, moved.latitude, moved.longitude);
        assert_relative_eq!(d, 100.0, max_relative = 0.01);
    }

    #[test]
    fn test_plausible_step_accepted_for_distance() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let next = north_of(&base, 5.0, 1_000);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert!(result.accepted_for_distance);
        assert!(result.accepted_for_path);
        assert!(result.accepted_for_pace);
        assert_relative_eq!(result.distance_m, 5.0, max_relative = 0.02);
        assert_relative_eq!(result.speed_mps, 5.0, max_relative = 0.02);
    }

    #[test]
    fn test_jitter_below_min_step_rejected() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let next = north_of(&base, 1.0, 1_000);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert!(!result.accepted_for_distance);
        // Still fine for the drawn track and for pace
        assert!(result.accepted_for_path);
        assert!(result.accepted_for_pace);
    }

    #[test]
    fn test_teleport_rejected() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let next = north_of(&base, 500.0, 1_000);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert!(!result.accepted_for_distance);
        // 500 m also exceeds the path ceiling
        assert!(!result.accepted_for_path);
    }

    #[test]
    fn test_poor_accuracy_rejected_for_distance_but_kept_on_path() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let mut next = north_of(&base, 10.0, 1_000);
        next.accuracy_m = Some(30.0);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert!(!result.accepted_for_distance);
        assert!(!result.accepted_for_pace);
        assert!(result.accepted_for_path);
    }

    #[test]
    fn test_missing_accuracy_is_trusted() {
        let base = GpsSample::new(47.37, 8.54, 0);
        let next = north_of(&base, 10.0, 1_000);
        assert!(next.accuracy_m.is_none());
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert!(result.accepted_for_distance);
    }

    #[test]
    fn test_zero_elapsed_does_not_divide() {
        let base = GpsSample::new(47.37, 8.54, 1_000).with_accuracy(5.0);
        let next = north_of(&base, 10.0, 0);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert_eq!(result.speed_mps, 0.0);
        assert!(!result.accepted_for_pace);
    }

    #[test]
    fn test_device_speed_preferred_over_derived() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let next = north_of(&base, 10.0, 1_000).with_speed(3.2);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert_relative_eq!(result.speed_mps, 3.2);
    }

    #[test]
    fn test_negative_device_speed_falls_back_to_derived() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let next = north_of(&base, 10.0, 1_000).with_speed(-1.0);
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert_relative_eq!(result.speed_mps, 10.0, max_relative = 0.02);
        assert!(result.accepted_for_pace);
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let base = GpsSample::new(47.37, 8.54, 0).with_accuracy(5.0);
        let mut next = north_of(&base, 10.0, 1_000);
        next.latitude = f64::NAN;
        let result = evaluate(&state_with(base), &next, &FilterConfig::default());

        assert_eq!(result.distance_m, 0.0);
        assert!(!result.accepted_for_distance);
        assert!(!result.accepted_for_path);
        assert!(!result.accepted_for_pace);
    }
}
