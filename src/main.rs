// src/main.rs

mod config;
mod detection;
mod pipeline;
mod signal;
mod types;

use anyhow::{Context, Result};
use detection::{BrakeClassifier, LaneDriftDetector};
use pipeline::{BrakeRunner, ConfiguredSink, LaneRunner, PipelineMetrics, TickLog};
use signal::synthetic::{default_accel_scenario, default_lane_scenario};
use signal::{
    AccelSample, LaneSample, NoTurnSignals, ReplayAccelSource, ReplayLaneSource,
    ScriptedTurnSignals, SignalSource, SyntheticAccelSource, SyntheticLaneSource, TurnSignalInput,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::{Config, SourceKind, StreamConfig};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// Synthetic timestamps when the loop is unpaced
const NOMINAL_LANE_PERIOD_MS: f64 = 100.0;
const NOMINAL_IMU_PERIOD_MS: f64 = 20.0;

type LaneSource = Box<dyn SignalSource<Sample = LaneSample>>;
type AccelSource = Box<dyn SignalSource<Sample = AccelSample>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, from_file) = Config::load_or_default(&config_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("violation_detection={}", config.logging.level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 Violation Detection System Starting");
    if from_file {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("No config at {}, running with built-in defaults", config_path);
    }

    let drift_config = config.drift_config();
    let brake_config = config.brake_config();
    info!(
        "Lane thresholds: band=±{:.0}px, persistence={} frames, cooldown={:.1}s, alpha={:.2}",
        drift_config.drift_band_px(),
        drift_config.persistence_frames,
        config.lane.cooldown_secs,
        drift_config.ema_alpha
    );
    info!(
        "Brake thresholds: moderate>{:.2}g, hard>{:.2}g, cooldown={:.1}s",
        brake_config.moderate_threshold_g, brake_config.hard_threshold_g, config.brake.cooldown_secs
    );

    let output_dir = PathBuf::from(&config.logging.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

    let sink = ConfiguredSink::from_config(&config.sink)?;
    let metrics = PipelineMetrics::new();

    let mut lane_runner = if config.source.lane.enabled {
        let log = TickLog::create(output_dir.join(format!("lane_{}.jsonl", stamp)))?;
        let runner = LaneRunner::new(
            build_lane_source(&config)?,
            build_turn_signals(&config),
            LaneDriftDetector::new(drift_config),
        );
        Some(runner.with_log(log))
    } else {
        info!("⚪ Lane loop disabled");
        None
    };

    let mut brake_runner = if config.source.brake.enabled {
        let log = TickLog::create(output_dir.join(format!("brake_{}.jsonl", stamp)))?;
        let runner = BrakeRunner::new(build_accel_source(&config)?, BrakeClassifier::new(brake_config));
        Some(runner.with_log(log))
    } else {
        info!("⚪ Brake loop disabled");
        None
    };

    let lane_interval = config.source.lane.tick_interval_ms;
    let brake_interval = config.source.brake.tick_interval_ms;

    let lane_loop = async {
        if let Some(runner) = lane_runner.as_mut() {
            runner.run(&sink, &metrics, lane_interval).await;
        }
    };
    let brake_loop = async {
        if let Some(runner) = brake_runner.as_mut() {
            runner.run(&sink, &metrics, brake_interval).await;
        }
    };

    tokio::select! {
        _ = async { tokio::join!(lane_loop, brake_loop) } => info!("✓ All sources exhausted"),
        _ = shutdown_signal() => info!("🛑 Interrupted, stopping loops"),
    }

    if let Some(runner) = brake_runner.as_ref() {
        let path = output_dir.join(format!("behavior_analysis_{}.json", stamp));
        match runner.session().write_summary(&path) {
            Ok(()) => info!("💾 Behavior summary saved to {}", path.display()),
            Err(e) => warn!("{:#}", e),
        }
    }

    let summary = metrics.summary();
    let metrics_path = output_dir.join(format!("metrics_{}.json", stamp));
    if let Err(e) = write_json(&metrics_path, &summary) {
        warn!("{:#}", e);
    }

    info!("\n========================================");
    info!("Session complete ({:.1}s)", summary.elapsed_secs);
    info!(
        "  Lane frames: {} ({} dropped, {} missed)",
        summary.lane_ticks, summary.lane_frames_dropped, summary.lane_missed
    );
    info!("  IMU samples: {} ({} missed)", summary.brake_ticks, summary.brake_missed);
    info!(
        "  ⚠️  Unsignaled drifts: {} left, {} right",
        summary.violations_left, summary.violations_right
    );
    info!(
        "  🛑 Brakes: {} moderate, {} hard",
        summary.moderate_brakes, summary.hard_brakes
    );
    info!("  🔺 Behavior changes: {}", summary.behavior_changes);
    info!(
        "  📡 Sink: {} delivered, {} failed",
        summary.sink_successes, summary.sink_failures
    );
    info!("========================================\n");

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

fn sample_period_ms(stream: &StreamConfig, nominal_ms: f64) -> f64 {
    if stream.tick_interval_ms > 0 {
        stream.tick_interval_ms as f64
    } else {
        nominal_ms
    }
}

fn replay_path(stream: &StreamConfig) -> Result<&str> {
    stream
        .path
        .as_deref()
        .context("Replay source configured without a path")
}

fn build_lane_source(config: &Config) -> Result<LaneSource> {
    let stream = &config.source.lane;
    let source: LaneSource = match stream.kind {
        SourceKind::Synthetic => Box::new(SyntheticLaneSource::new(
            default_lane_scenario(),
            sample_period_ms(stream, NOMINAL_LANE_PERIOD_MS),
            config.lane.center_tolerance_px,
        )),
        SourceKind::Replay => Box::new(ReplayLaneSource::open(replay_path(stream)?)?),
    };
    info!("📹 Lane source: {}", source.name());
    Ok(source)
}

fn build_accel_source(config: &Config) -> Result<AccelSource> {
    let stream = &config.source.brake;
    let source: AccelSource = match stream.kind {
        SourceKind::Synthetic => Box::new(SyntheticAccelSource::new(
            default_accel_scenario(),
            sample_period_ms(stream, NOMINAL_IMU_PERIOD_MS),
        )),
        SourceKind::Replay => Box::new(ReplayAccelSource::open(replay_path(stream)?)?),
    };
    info!("📈 IMU source: {}", source.name());
    Ok(source)
}

fn build_turn_signals(config: &Config) -> Box<dyn TurnSignalInput> {
    if config.source.turn_signals.is_empty() {
        info!("⚪ No turn-signal input, blinkers read as off");
        Box::new(NoTurnSignals)
    } else {
        info!(
            "💡 {} scripted turn-signal window(s)",
            config.source.turn_signals.len()
        );
        Box::new(ScriptedTurnSignals::new(config.source.turn_signals.clone()))
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
