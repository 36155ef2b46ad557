// src/main.rs
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use form_coach::calibration::CalibrationEngine;
use form_coach::config::CoachSettings;
use form_coach::data::SessionExporter;
use form_coach::programming::{warmup_for, BEGINNER_3X};
use form_coach::session::{CoachSession, TracingVoice};
use form_coach::simulation::{BlankFrameSource, SimulatedPoseEstimator};
use form_coach::storage::JsonFileStore;
use form_coach::tracking::PoseEngine;
use form_coach::validators::{create_validator, load_validator, Exercise};

const DEFAULT_SECONDS: u64 = 20;
const CALIBRATION_SECONDS: u64 = 6;

struct Args {
    exercise: Exercise,
    seconds: u64,
    calibrate: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        exercise: Exercise::Squat,
        seconds: DEFAULT_SECONDS,
        calibrate: false,
    };
    let mut positional = 0;

    for arg in std::env::args().skip(1) {
        if arg == "--calibrate" {
            args.calibrate = true;
            continue;
        }
        match positional {
            0 => args.exercise = arg.parse().with_context(|| format!("Bad exercise '{arg}'"))?,
            1 => args.seconds = arg.parse().with_context(|| format!("Bad duration '{arg}'"))?,
            _ => bail!("usage: form_coach [squat|pushup|plank] [seconds] [--calibrate]"),
        }
        positional += 1;
    }
    Ok(args)
}

fn settings_path() -> PathBuf {
    directories::ProjectDirs::from("com", "formcoach", "FormCoach")
        .map(|dirs| dirs.config_dir().join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("./form_coach_settings.json"))
}

fn start_engine(exercise: Exercise, settings: &CoachSettings) -> Result<PoseEngine> {
    let mut engine = PoseEngine::new(
        SimulatedPoseEstimator::new(exercise),
        BlankFrameSource::default(),
        settings.engine_options(),
    );
    engine.start().context("Failed to start pose engine")?;
    Ok(engine)
}

async fn calibrate(exercise: Exercise, settings: &CoachSettings, store: &JsonFileStore) -> Result<()> {
    let mut engine = start_engine(exercise, settings)?;
    let mut rx = engine.subscribe();
    let mut calibration = CalibrationEngine::new(exercise);
    // Scratch session; only the calibration samples matter here.
    let mut scratch = CoachSession::new(
        create_validator(exercise, settings.validator_config()),
        Box::new(TracingVoice),
    );
    scratch.set_muted(true);

    calibration.start();
    let _ = tokio::time::timeout(
        Duration::from_secs(CALIBRATION_SECONDS),
        scratch.follow(&mut rx, Some(&mut calibration)),
    )
    .await;
    calibration.stop();
    engine.stop();

    if let Some(preview) = calibration.preview() {
        info!(
            low = preview.range_low,
            high = preview.range_high,
            samples = preview.sample_count,
            "Calibration range"
        );
    }
    match calibration.save(store)? {
        Some(record) => println!("Calibrated {}: {:?}", exercise, record.thresholds),
        None => warn!(%exercise, "No pose seen during calibration, keeping previous thresholds"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let settings = CoachSettings::load(settings_path()).context("Failed to load settings")?;
    let store = JsonFileStore::open(&settings.store_path)
        .with_context(|| format!("Failed to open store at {}", settings.store_path.display()))?;
    info!(store = %store.path().display(), "Threshold store ready");

    let warmup = warmup_for(args.exercise);
    println!("{}:", warmup.title);
    for step in warmup.steps {
        println!("  - {step}");
    }
    if let Some(block) = BEGINNER_3X.days[0].blocks.iter().find(|b| b.exercise == args.exercise) {
        println!("Goal ({}): {:?} {}", BEGINNER_3X.name, block.goal.kind, block.goal.value);
    }

    if args.calibrate {
        calibrate(args.exercise, &settings, &store).await?;
    }

    let validator = load_validator(args.exercise, &store, settings.validator_config())?;
    let mut session = CoachSession::new(validator, Box::new(TracingVoice));
    session.set_muted(settings.muted);

    let mut engine = start_engine(args.exercise, &settings)?;
    let mut rx = engine.subscribe();
    info!(exercise = %args.exercise, seconds = args.seconds, session = %session.id(), "Coaching");

    tokio::select! {
        _ = session.follow(&mut rx, None) => warn!("Pose stream ended early"),
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    engine.stop();

    let summary = session.finish();
    println!("{} reps of {} in {}s", summary.total_reps, summary.exercise, summary.total_time_seconds);
    for rep in session.reps() {
        println!(
            "  #{:<3} {:>7}ms - {:>7}ms  depth {:?}  angle {:?}",
            rep.idx, rep.start_ms, rep.end_ms, rep.peak_depth, rep.peak_angle
        );
    }

    let dir = SessionExporter::new(&settings.output_directory, None)
        .export(&summary, session.reps())
        .context("Failed to export session")?;
    println!("Session saved to {}", dir.display());
    Ok(())
}
