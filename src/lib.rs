//! Run tracking engine: turns a noisy, bursty stream of GPS fixes into
//! trustworthy cumulative distance, a smoothed jitter-resistant pace, and a
//! stationary/moving classification.
//!
//! The algorithmic core is pure functions over explicitly threaded state
//! ([`gps_filter`], [`pace_window`], [`pace_fusion`]); [`tracker`] wires them
//! over a durable JSON checkpoint ([`store`]) so the engine survives host
//! process suspension between batch deliveries. The host registers
//! [`RunTracker::handle_batch`] as its location callback and queries the last
//! checkpoint for display.

pub mod error;
pub mod gps_filter;
pub mod pace_fusion;
pub mod pace_window;
pub mod store;
pub mod tracker;
pub mod types;

pub use error::{TrackerError, TrackerResult};
pub use gps_filter::{FilterConfig, FilterResult, FilterState};
pub use pace_fusion::{FusionInput, FusionOutput, PaceFusionConfig, PaceFusionState};
pub use pace_window::PaceWindow;
pub use store::{SessionStateStore, TrackerState};
pub use tracker::{BatchSummary, IngestEvent, RunTracker, TrackerConfig};
pub use types::{
    GpsSample, PaceData, PaceOutput, PaceSignal, PaceSnapshot, RunningSession, TrackPoint,
};
