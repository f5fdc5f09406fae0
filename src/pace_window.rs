// pace_window.rs — trailing-window speed estimate from distance checkpoints
//
// Fallback/complement to the device-reported speed: derives a speed from the
// cumulative distance accumulated over the last few seconds. Feeds the pace
// fusion as the "distance window" source.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::PaceSnapshot;

pub const DEFAULT_WINDOW_MS: i64 = 10_000;

/// Bounded rolling buffer of (cumulative distance, timestamp) checkpoints.
/// Eviction happens on push so the buffer stays O(window), not O(session).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaceWindow {
    snapshots: VecDeque<PaceSnapshot>,
    #[serde(default = "default_window_ms")]
    window_ms: i64,
}

fn default_window_ms() -> i64 {
    DEFAULT_WINDOW_MS
}

impl Default for PaceWindow {
    fn default() -> Self {
        PaceWindow::new(DEFAULT_WINDOW_MS)
    }
}

impl PaceWindow {
    pub fn new(window_ms: i64) -> Self {
        PaceWindow {
            snapshots: VecDeque::new(),
            window_ms,
        }
    }

    pub fn push(&mut self, snapshot: PaceSnapshot) {
        self.snapshots.push_back(snapshot);
        while let Some(front) = self.snapshots.front() {
            if snapshot.timestamp_ms - front.timestamp_ms > self.window_ms {
                self.snapshots.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Speed over the trailing window ending at `now_ms`, or `None` when the
    /// buffer cannot support an estimate.
    pub fn speed_over_window(&self, now_ms: i64) -> Option<f64> {
        speed_over_window(self.snapshots.iter(), now_ms, self.window_ms)
    }
}

/// Derive a speed from the snapshots inside `[now_ms - window_ms, now_ms]`.
///
/// Needs at least two in-window snapshots. Returns `None` on non-positive
/// elapsed time or a non-positive distance delta: a stale or decreasing
/// buffer must never fabricate a speed.
pub fn speed_over_window<'a, I>(snapshots: I, now_ms: i64, window_ms: i64) -> Option<f64>
where
    I: IntoIterator<Item = &'a PaceSnapshot>,
{
    let cutoff = now_ms - window_ms;
    let mut in_window = 0usize;
    let mut oldest: Option<PaceSnapshot> = None;
    let mut newest: Option<PaceSnapshot> = None;
    for snap in snapshots {
        if snap.timestamp_ms < cutoff {
            continue;
        }
        in_window += 1;
        if oldest.is_none() {
            oldest = Some(*snap);
        }
        newest = Some(*snap);
    }
    if in_window < 2 {
        return None;
    }
    let (oldest, newest) = (oldest?, newest?);

    let elapsed_s = (newest.timestamp_ms - oldest.timestamp_ms) as f64 / 1000.0;
    let delta_m = newest.distance_m - oldest.distance_m;
    if elapsed_s <= 0.0 || delta_m <= 0.0 {
        return None;
    }
    Some(delta_m / elapsed_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snap(distance_m: f64, timestamp_ms: i64) -> PaceSnapshot {
        PaceSnapshot {
            distance_m,
            timestamp_ms,
        }
    }

    #[test]
    fn test_single_snapshot_gives_no_estimate() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(10.0, 1_000));
        assert!(window.speed_over_window(1_000).is_none());
    }

    #[test]
    fn test_two_snapshots_give_speed() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(0.0, 0));
        window.push(snap(10.0, 2_000));
        let speed = window.speed_over_window(2_000).unwrap();
        assert_relative_eq!(speed, 5.0);
    }

    #[test]
    fn test_stale_snapshots_fall_out_of_window() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(0.0, 0));
        window.push(snap(100.0, 1_000));
        // Both entries are older than the window at t=20s
        assert!(window.speed_over_window(20_000).is_none());
    }

    #[test]
    fn test_eviction_on_push_bounds_buffer() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        for i in 0..100 {
            window.push(snap(i as f64, i * 1_000));
        }
        // 10s window at 1 Hz keeps at most 11 entries
        assert!(window.len() <= 11);
    }

    #[test]
    fn test_decreasing_distance_gives_no_estimate() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(50.0, 0));
        window.push(snap(40.0, 1_000));
        assert!(window.speed_over_window(1_000).is_none());
    }

    #[test]
    fn test_identical_timestamps_give_no_estimate() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(0.0, 1_000));
        window.push(snap(5.0, 1_000));
        assert!(window.speed_over_window(1_000).is_none());
    }

    #[test]
    fn test_uses_oldest_and_newest_in_window() {
        let mut window = PaceWindow::new(DEFAULT_WINDOW_MS);
        window.push(snap(0.0, 0));
        window.push(snap(3.0, 1_000));
        window.push(snap(9.0, 3_000));
        // (9 - 0) / 3s
        let speed = window.speed_over_window(3_000).unwrap();
        assert_relative_eq!(speed, 3.0);
    }
}
