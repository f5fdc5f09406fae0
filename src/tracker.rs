// tracker.rs — session lifecycle + batch ingest
//
// The host's location subsystem delivers fixes in batches, possibly while the
// application is suspended, so every invocation is load → compute → atomic
// save. The batch handler is the only writer of the persisted state; all
// queries are plain reads of the last checkpoint.

use chrono::Utc;
use log::{debug, info};

use crate::error::{TrackerError, TrackerResult};
use crate::gps_filter::{self, FilterConfig};
use crate::pace_fusion::{self, FusionInput, PaceFusionConfig};
use crate::store::{SessionStateStore, TrackerState};
use crate::types::{GpsSample, PaceOutput, PaceSignal, PaceSnapshot, RunningSession, TrackPoint};

/// All engine tunables in one place.
#[derive(Clone, Debug, Default)]
pub struct TrackerConfig {
    pub filter: FilterConfig,
    pub fusion: PaceFusionConfig,
}

/// What happened while ingesting one batch, for the caller's logging.
#[derive(Clone, Debug)]
pub enum IngestEvent {
    FixRejected {
        timestamp_ms: i64,
        distance_m: f64,
        accuracy_m: Option<f64>,
    },
    ReplaySkipped {
        timestamp_ms: i64,
    },
    StationaryEntered,
    StationaryExited,
}

/// Per-batch accounting returned by `handle_batch`.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub processed: u32,
    pub accepted_for_distance: u32,
    pub accepted_for_path: u32,
    pub accepted_for_pace: u32,
    pub replayed_skipped: u32,
    pub distance_added_m: f64,
    pub events: Vec<IngestEvent>,
}

/// The run tracking engine: filter, window estimator and pace fusion wired
/// over a durable state store.
pub struct RunTracker {
    store: SessionStateStore,
    config: TrackerConfig,
}

impl RunTracker {
    pub fn new(store: SessionStateStore, config: TrackerConfig) -> Self {
        RunTracker { store, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ── Session lifecycle ────────────────────────────────────────────────

    /// Start a brand-new session, replacing any stopped one. Fails with
    /// `AlreadyRunning` while a session is active.
    pub fn start_session(&self) -> TrackerResult<RunningSession> {
        self.start_session_at(Utc::now().timestamp_millis())
    }

    pub fn start_session_at(&self, now_ms: i64) -> TrackerResult<RunningSession> {
        let state = self.store.load();
        if state.session.as_ref().is_some_and(|s| s.is_active) {
            return Err(TrackerError::AlreadyRunning);
        }

        let session = RunningSession::new(now_ms, now_ms);
        let fresh = TrackerState {
            session: Some(session.clone()),
            ..TrackerState::default()
        };
        self.store.save(&fresh)?;
        info!("session {} started", session.id);
        Ok(session)
    }

    /// Deactivate the session and clear the filter anchor so the next
    /// resumed fix is not compared against a stale, far-away position.
    pub fn pause_session(&self) -> TrackerResult<()> {
        let mut state = self.store.load();
        let session = state.session.as_mut().ok_or(TrackerError::NotRunning)?;
        if !session.is_active {
            return Err(TrackerError::InvalidState("already paused".to_string()));
        }
        session.is_active = false;
        state.filter.clear();
        self.store.save(&state)?;
        info!("session paused");
        Ok(())
    }

    /// Reactivate a paused session. The filter anchor is cleared again for
    /// the same reason as on pause: the first post-resume fix only seeds.
    pub fn resume_session(&self) -> TrackerResult<()> {
        let mut state = self.store.load();
        let session = state.session.as_mut().ok_or(TrackerError::NotRunning)?;
        if session.is_active {
            return Err(TrackerError::InvalidState("already running".to_string()));
        }
        session.is_active = true;
        state.filter.clear();
        self.store.save(&state)?;
        info!("session resumed");
        Ok(())
    }

    /// Deactivate the session, leaving all data queryable until `clear_all`.
    pub fn stop_session(&self) -> TrackerResult<()> {
        let mut state = self.store.load();
        let session = state.session.as_mut().ok_or(TrackerError::NotRunning)?;
        session.is_active = false;
        state.filter.clear();
        self.store.save(&state)?;
        info!("session stopped");
        Ok(())
    }

    /// Delete session, track, filter state and pace signal.
    pub fn clear_all(&self) -> TrackerResult<()> {
        self.store.clear()?;
        info!("tracker state cleared");
        Ok(())
    }

    // ── Batch ingest ─────────────────────────────────────────────────────

    /// Entry point invoked by the host with a batch of new fixes.
    ///
    /// With no active session the batch is discarded silently; that is the
    /// common case between activities. Fixes are processed in non-decreasing
    /// timestamp order; fixes at or before the persisted anchor timestamp
    /// are treated as replays and skipped without touching the anchor, so
    /// re-delivering the same batch never double-counts.
    pub fn handle_batch(&self, fixes: &[GpsSample]) -> TrackerResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut state = self.store.load();

        let Some(mut session) = state.session.take().filter(|s| s.is_active) else {
            debug!("no active session, discarding batch of {} fixes", fixes.len());
            return Ok(summary);
        };

        let mut ordered: Vec<&GpsSample> = fixes.iter().collect();
        ordered.sort_by_key(|f| f.timestamp_ms);

        let mut last_processed_ms: Option<i64> = None;
        for fix in ordered {
            if let Some(anchor_ms) = state.filter.anchor_timestamp_ms() {
                if fix.timestamp_ms <= anchor_ms {
                    summary.replayed_skipped += 1;
                    summary.events.push(IngestEvent::ReplaySkipped {
                        timestamp_ms: fix.timestamp_ms,
                    });
                    continue;
                }
            }

            let result = gps_filter::evaluate(&state.filter, fix, &self.config.filter);

            if result.accepted_for_distance {
                session.total_distance_m += result.distance_m;
                summary.distance_added_m += result.distance_m;
                summary.accepted_for_distance += 1;
                state.pace_window.push(PaceSnapshot {
                    distance_m: session.total_distance_m,
                    timestamp_ms: fix.timestamp_ms,
                });
            }

            if result.accepted_for_path {
                state.track.push(TrackPoint::from(fix));
                session.location_count += 1;
                summary.accepted_for_path += 1;
            }

            if result.accepted_for_pace {
                state.pace_signal = Some(PaceSignal {
                    timestamp_ms: fix.timestamp_ms,
                    speed_mps: Some(result.speed_mps),
                    accuracy_m: fix.accuracy_m,
                    distance_delta_m: Some(result.distance_m),
                });
                summary.accepted_for_pace += 1;
            }

            let was_anchored = state.filter.last_sample.is_some();
            if was_anchored
                && !result.accepted_for_distance
                && !result.accepted_for_path
                && !result.accepted_for_pace
            {
                summary.events.push(IngestEvent::FixRejected {
                    timestamp_ms: fix.timestamp_ms,
                    distance_m: result.distance_m,
                    accuracy_m: fix.accuracy_m,
                });
            }

            // Rejected samples still anchor the next comparison.
            state.filter.last_sample = Some(fix.clone());
            last_processed_ms = Some(fix.timestamp_ms);
            summary.processed += 1;
        }

        // One fusion step per batch, clocked by the newest processed fix.
        if let Some(now_ms) = last_processed_ms {
            let window_speed = state.pace_window.speed_over_window(now_ms);
            let out = pace_fusion::fuse(
                &FusionInput {
                    distance_window_speed_mps: window_speed,
                    pace_signal: state.pace_signal.as_ref(),
                    now_ms,
                },
                &state.fusion,
                &self.config.fusion,
            );
            if out.is_stationary != state.fusion.is_stationary {
                summary.events.push(if out.is_stationary {
                    IngestEvent::StationaryEntered
                } else {
                    IngestEvent::StationaryExited
                });
            }
            state.fusion = out.next_state;
            state.last_pace = Some(PaceOutput {
                pace: out.pace,
                fused_speed_mps: out.fused_speed_mps,
                is_stationary: out.is_stationary,
            });
        }

        state.session = Some(session);
        self.store.save(&state)?;
        Ok(summary)
    }

    // ── Queries (read-only snapshots of the last checkpoint) ─────────────

    pub fn current_session(&self) -> Option<RunningSession> {
        self.store.load().session
    }

    pub fn total_distance(&self) -> f64 {
        self.store
            .load()
            .session
            .map(|s| s.total_distance_m)
            .unwrap_or(0.0)
    }

    pub fn latest_pace_signal(&self) -> Option<PaceSignal> {
        self.store.load().pace_signal
    }

    pub fn locations(&self) -> Vec<TrackPoint> {
        self.store.load().track
    }

    pub fn current_pace(&self) -> PaceOutput {
        self.store.load().last_pace.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(dir: &std::path::Path) -> RunTracker {
        RunTracker::new(SessionStateStore::new(dir), TrackerConfig::default())
    }

    #[test]
    fn test_batch_without_session_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());
        let summary = t
            .handle_batch(&[GpsSample::new(47.37, 8.54, 1_000)])
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert!(t.current_session().is_none());
    }

    #[test]
    fn test_start_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());
        t.start_session_at(1_000).unwrap();
        assert!(matches!(
            t.start_session_at(2_000),
            Err(TrackerError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());

        assert!(matches!(t.pause_session(), Err(TrackerError::NotRunning)));

        t.start_session_at(1_000).unwrap();
        assert!(t.current_session().unwrap().is_active);

        t.pause_session().unwrap();
        assert!(!t.current_session().unwrap().is_active);
        assert!(matches!(
            t.pause_session(),
            Err(TrackerError::InvalidState(_))
        ));

        t.resume_session().unwrap();
        assert!(t.current_session().unwrap().is_active);
        assert!(matches!(
            t.resume_session(),
            Err(TrackerError::InvalidState(_))
        ));

        t.stop_session().unwrap();
        assert!(!t.current_session().unwrap().is_active);

        // Stopped data stays queryable until cleared
        t.clear_all().unwrap();
        assert!(t.current_session().is_none());
    }

    #[test]
    fn test_start_after_stop_replaces_session() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());
        t.start_session_at(1_000).unwrap();
        t.stop_session().unwrap();

        let session = t.start_session_at(50_000).unwrap();
        assert_eq!(session.start_time_ms, 50_000);
        assert_eq!(session.total_distance_m, 0.0);
        assert!(t.locations().is_empty());
    }

    #[test]
    fn test_out_of_order_batch_is_sorted_before_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());
        t.start_session_at(0).unwrap();

        let base = GpsSample::new(47.37, 8.54, 1_000).with_accuracy(5.0);
        let step = 5.0 / 111_194.9;
        let second = GpsSample::new(47.37 + step, 8.54, 2_000).with_accuracy(5.0);
        let third = GpsSample::new(47.37 + 2.0 * step, 8.54, 3_000).with_accuracy(5.0);

        // Delivered out of order
        let summary = t
            .handle_batch(&[third.clone(), base.clone(), second.clone()])
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.accepted_for_distance, 2);
        assert!((t.total_distance() - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_replayed_fixes_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let t = tracker(dir.path());
        t.start_session_at(0).unwrap();

        let step = 5.0 / 111_194.9;
        let batch = vec![
            GpsSample::new(47.37, 8.54, 1_000).with_accuracy(5.0),
            GpsSample::new(47.37 + step, 8.54, 2_000).with_accuracy(5.0),
        ];
        t.handle_batch(&batch).unwrap();
        let distance_first = t.total_distance();
        assert!(distance_first > 0.0);

        // Host redelivers the same batch after a restart
        let summary = t.handle_batch(&batch).unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.replayed_skipped, 2);
        assert_eq!(t.total_distance(), distance_first);
    }
}
