// pace_fusion.rs — smoothed pace + stationary/moving latch
//
// Blends the device-reported GPS speed with the distance-window speed,
// smooths the result with an EMA, rate-limits the displayed pace, and runs a
// hysteresis latch that suppresses pace output while the runner has stopped.
// Pure: all memory lives in PaceFusionState, threaded through by the caller.

use serde::{Deserialize, Serialize};

use crate::types::{PaceData, PaceSignal};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct PaceFusionConfig {
    // ── GPS trust ──
    pub high_quality_accuracy_m: f64,
    pub fresh_signal_s: f64,
    pub gps_weight_high: f64,
    pub gps_weight_low: f64,

    // ── Smoothing ──
    pub ema_alpha: f64,

    // ── Pace rate limit (seconds-per-km change allowed per second) ──
    pub max_pace_change_per_s: f64,

    // ── Stationary latch ──
    pub stationary_speed_mps: f64,
    pub stationary_enter_s: f64,
    pub moving_exit_speed_mps: f64,
    pub moving_exit_count: i32,
}

impl Default for PaceFusionConfig {
    fn default() -> Self {
        Self {
            high_quality_accuracy_m: 15.0,
            fresh_signal_s: 2.0,
            gps_weight_high: 0.65,
            gps_weight_low: 0.25,
            ema_alpha: 0.35,
            max_pace_change_per_s: 25.0,
            stationary_speed_mps: 0.8,
            stationary_enter_s: 3.0,
            moving_exit_speed_mps: 1.2,
            moving_exit_count: 2,
        }
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// All fusion memory between invocations. A session starts in the Moving
/// state (the user is assumed active).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaceFusionState {
    pub ema_speed_mps: Option<f64>,
    pub last_pace_s_per_km: Option<f64>,
    pub last_timestamp_ms: Option<i64>,
    pub stationary_accumulated_s: f64,
    pub moving_streak: i32,
    pub is_stationary: bool,
}

impl PaceFusionState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ─── Input / output ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct FusionInput<'a> {
    pub distance_window_speed_mps: Option<f64>,
    pub pace_signal: Option<&'a PaceSignal>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct FusionOutput {
    pub pace: PaceData,
    pub fused_speed_mps: f64,
    pub is_stationary: bool,
    pub next_state: PaceFusionState,
}

// ─── Fusion ──────────────────────────────────────────────────────────────────

/// One fusion step. Call once per ingested batch with `now_ms` set to the
/// newest processed fix.
pub fn fuse(input: &FusionInput, prev: &PaceFusionState, cfg: &PaceFusionConfig) -> FusionOutput {
    // 1. Elapsed time since the previous step, clamped: never accumulate with
    //    zero or negative time.
    let delta_s = match prev.last_timestamp_ms {
        Some(last_ms) => {
            let d = (input.now_ms - last_ms) as f64 / 1000.0;
            if d.is_finite() && d > 0.0 {
                d
            } else {
                1.0
            }
        }
        None => 1.0,
    };

    // 2. GPS weight: trust the device speed more when the signal is both
    //    fresh and high quality.
    let gps_speed = input
        .pace_signal
        .and_then(|s| s.speed_mps)
        .filter(|v| v.is_finite() && *v >= 0.0);
    let gps_weight = match (gps_speed, input.pace_signal) {
        (Some(_), Some(signal)) => {
            let age_s = ((input.now_ms - signal.timestamp_ms) as f64 / 1000.0).max(0.0);
            let fresh = age_s <= cfg.fresh_signal_s;
            let high_quality = signal
                .accuracy_m
                .map(|a| a.is_finite() && a <= cfg.high_quality_accuracy_m)
                .unwrap_or(false);
            if fresh && high_quality {
                cfg.gps_weight_high
            } else {
                cfg.gps_weight_low
            }
        }
        _ => 0.0,
    };

    // 3. Base speed: weighted blend when both sources exist, single source
    //    otherwise, 0 when neither.
    let window_speed = input
        .distance_window_speed_mps
        .filter(|v| v.is_finite() && *v >= 0.0);
    let base_speed = match (gps_speed, window_speed) {
        (Some(gps), Some(window)) => gps_weight * gps + (1.0 - gps_weight) * window,
        (Some(gps), None) => gps,
        (None, Some(window)) => window,
        (None, None) => 0.0,
    };

    // 4. Exponential smoothing, seeded directly on the very first sample.
    let ema_speed = match prev.ema_speed_mps.filter(|e| e.is_finite()) {
        Some(prev_ema) => cfg.ema_alpha * base_speed + (1.0 - cfg.ema_alpha) * prev_ema,
        None => base_speed,
    };

    // 5. Stationary/moving hysteresis. Strong signals come straight from the
    //    GPS observation and take precedence over the smoothed EMA, which
    //    lags behind a real transition.
    let distance_delta = input
        .pace_signal
        .and_then(|s| s.distance_delta_m)
        .filter(|d| d.is_finite());
    let strong_stationary = gps_speed.map_or(false, |g| g < cfg.stationary_speed_mps)
        && distance_delta.map_or(true, |d| d <= 0.5);
    let strong_moving = gps_speed.map_or(false, |g| g > cfg.moving_exit_speed_mps)
        && distance_delta.map_or(true, |d| d > 0.5);

    let mut stationary_accumulated_s = prev.stationary_accumulated_s;
    let mut moving_streak = prev.moving_streak;
    if strong_moving || (!strong_stationary && ema_speed > cfg.moving_exit_speed_mps) {
        moving_streak += 1;
        if moving_streak >= cfg.moving_exit_count {
            stationary_accumulated_s = 0.0;
        }
    } else if strong_stationary || ema_speed < cfg.stationary_speed_mps {
        stationary_accumulated_s += delta_s;
        moving_streak = 0;
    }
    // Ambiguous zone: neither accumulator changes.

    let mut is_stationary = prev.is_stationary;
    if stationary_accumulated_s >= cfg.stationary_enter_s {
        is_stationary = true;
    }
    if moving_streak >= cfg.moving_exit_count {
        is_stationary = false;
    }

    // 6. Pace while moving; sentinel while stationary.
    let raw_pace = if !is_stationary && ema_speed > 0.0 {
        Some(1000.0 / ema_speed)
    } else {
        None
    };

    // 7. Rate limit against the previous displayed pace.
    let pace_s_per_km = match (raw_pace, prev.last_pace_s_per_km) {
        (Some(raw), Some(prev_pace)) => {
            let max_delta = cfg.max_pace_change_per_s * delta_s;
            Some(raw.clamp(prev_pace - max_delta, prev_pace + max_delta))
        }
        (Some(raw), None) => Some(raw),
        (None, _) => None,
    };

    let pace = pace_s_per_km
        .map(PaceData::from_seconds_per_km)
        .unwrap_or_else(PaceData::none);

    FusionOutput {
        pace,
        fused_speed_mps: ema_speed,
        is_stationary,
        next_state: PaceFusionState {
            ema_speed_mps: Some(ema_speed),
            last_pace_s_per_km: pace_s_per_km,
            last_timestamp_ms: Some(input.now_ms),
            stationary_accumulated_s,
            moving_streak,
            is_stationary,
        },
    }
}
