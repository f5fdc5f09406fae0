// Offline replay: feed a recorded fix log through the tracker in batches and
// print what the engine would have shown live. Used for tuning the filter and
// fusion knobs against real recordings.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use run_tracker_rs::{GpsSample, RunTracker, SessionStateStore, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a recorded GPS fix log through the run tracking engine", long_about = None)]
struct Args {
    /// Path to a JSON array of fixes
    log: PathBuf,

    /// State directory (defaults to a throwaway temp dir)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Fixes per delivered batch
    #[arg(long, default_value = "5")]
    batch_size: usize,

    /// Distance gate: accuracy ceiling (meters)
    #[arg(long, default_value = "20.0")]
    max_accuracy: f64,

    /// Distance gate: minimum plausible step (meters)
    #[arg(long, default_value = "2.0")]
    min_step: f64,

    /// Distance gate: maximum plausible step (meters)
    #[arg(long, default_value = "100.0")]
    max_step: f64,

    /// EMA smoothing factor
    #[arg(long, default_value = "0.35")]
    ema_alpha: f64,

    /// Max pace change (s/km) allowed per second
    #[arg(long, default_value = "25.0")]
    max_pace_change: f64,

    /// Stationary entry threshold (m/s)
    #[arg(long, default_value = "0.8")]
    stationary_speed: f64,

    /// Moving exit threshold (m/s)
    #[arg(long, default_value = "1.2")]
    moving_exit_speed: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = File::open(&args.log)
        .with_context(|| format!("failed to open log {}", args.log.display()))?;
    let fixes: Vec<GpsSample> =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse fix log")?;
    println!("Loaded {} fixes from {}", fixes.len(), args.log.display());

    let mut config = TrackerConfig::default();
    config.filter.distance_max_accuracy_m = args.max_accuracy;
    config.filter.distance_min_step_m = args.min_step;
    config.filter.distance_max_step_m = args.max_step;
    config.fusion.ema_alpha = args.ema_alpha;
    config.fusion.max_pace_change_per_s = args.max_pace_change;
    config.fusion.stationary_speed_mps = args.stationary_speed;
    config.fusion.moving_exit_speed_mps = args.moving_exit_speed;

    let state_dir = match args.state_dir {
        Some(dir) => dir,
        None => throwaway_state_dir()?,
    };
    let tracker = RunTracker::new(SessionStateStore::new(&state_dir), config);

    let start_ms = fixes.first().map(|f| f.timestamp_ms).unwrap_or(0);
    tracker.clear_all()?;
    tracker.start_session_at(start_ms)?;

    for (i, batch) in fixes.chunks(args.batch_size.max(1)).enumerate() {
        let summary = tracker.handle_batch(batch)?;
        let pace = tracker.current_pace();
        println!(
            "batch {:>4}: {:>2} fixes, +{:>6.1} m (dist {}/path {}/pace {}), speed {:>5.2} m/s, pace {:>3}:{:02}{}",
            i,
            summary.processed,
            summary.distance_added_m,
            summary.accepted_for_distance,
            summary.accepted_for_path,
            summary.accepted_for_pace,
            pace.fused_speed_mps,
            pace.pace.minutes,
            pace.pace.seconds,
            if pace.is_stationary { "  [stationary]" } else { "" },
        );
    }

    tracker.stop_session()?;
    if let Some(session) = tracker.current_session() {
        println!(
            "\nSession {}: {:.1} m over {} recorded points",
            session.id, session.total_distance_m, session.location_count
        );
    }
    Ok(())
}

fn throwaway_state_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "run_tracker_replay_{}",
        chrono::Utc::now().timestamp_millis()
    ));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
