// store.rs — durable checkpoint of all tracker state
//
// The host process can be suspended and resumed between batch deliveries, so
// every piece of algorithm state is checkpointed here after each batch and
// reloaded before the next. The whole document is written in one atomic
// rename so a crash mid-write can never leave distance accumulated without
// its filter-state anchor (or vice versa).

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::TrackerResult;
use crate::gps_filter::FilterState;
use crate::pace_fusion::PaceFusionState;
use crate::pace_window::PaceWindow;
use crate::types::{PaceOutput, PaceSignal, RunningSession, TrackPoint};

const STATE_FILE: &str = "tracker_state.json";
const STATE_TMP_FILE: &str = "tracker_state.json.tmp";

/// Everything the engine needs to survive a process teardown: the session
/// record, the filter anchor, the recorded track, the latest pace signal,
/// the window buffer and the fusion memory. One logical unit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackerState {
    pub session: Option<RunningSession>,
    pub filter: FilterState,
    pub track: Vec<TrackPoint>,
    pub pace_signal: Option<PaceSignal>,
    pub pace_window: PaceWindow,
    pub fusion: PaceFusionState,
    pub last_pace: Option<PaceOutput>,
}

/// JSON-file backed store. The batch handler is the only writer; readers
/// tolerate eventually-consistent snapshots.
#[derive(Clone, Debug)]
pub struct SessionStateStore {
    dir: PathBuf,
}

impl SessionStateStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        SessionStateStore { dir: dir.into() }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the persisted state. Missing or corrupt state degrades to the
    /// empty default: a batch that cannot be attributed to a valid session is
    /// not actionable, and that is the common case between activities.
    pub fn load(&self) -> TrackerState {
        let path = self.state_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return TrackerState::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "corrupt tracker state at {}, starting empty: {}",
                    path.display(),
                    err
                );
                TrackerState::default()
            }
        }
    }

    /// Persist the full state in one atomic write (temp file + rename).
    pub fn save(&self, state: &TrackerState) -> TrackerResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.dir.join(STATE_TMP_FILE);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.state_path())?;
        Ok(())
    }

    /// Delete the persisted state entirely (session clear / test reset).
    pub fn clear(&self) -> TrackerResult<()> {
        match fs::remove_file(self.state_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
