use crate::detection::{BrakeConfig, DriftConfig};
use crate::types::{Config, SourceKind, StreamConfig};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Overrides `sink.url` when set.
pub const SINK_URL_ENV: &str = "EVENT_SINK_URL";

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults when no config file exists at `path`.
    pub fn load_or_default(path: &str) -> Result<(Self, bool)> {
        if Path::new(path).exists() {
            return Ok((Self::load(path)?, true));
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, false))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(SINK_URL_ENV) {
            self.sink.url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lane = &self.lane;
        check_alpha("lane.ema_alpha", lane.ema_alpha)?;
        if lane.persistence_frames == 0 {
            bail!("lane.persistence_frames must be at least 1");
        }
        if lane.center_tolerance_px < 0.0 || lane.drift_margin_px < 0.0 {
            bail!("lane tolerance and margin must be non-negative");
        }
        check_cooldown("lane.cooldown_secs", lane.cooldown_secs)?;

        let brake = &self.brake;
        check_alpha("brake.ema_alpha", brake.ema_alpha)?;
        check_cooldown("brake.cooldown_secs", brake.cooldown_secs)?;
        if brake.moderate_threshold_g >= brake.hard_threshold_g {
            bail!(
                "brake.moderate_threshold_g ({}) must be below brake.hard_threshold_g ({})",
                brake.moderate_threshold_g,
                brake.hard_threshold_g
            );
        }
        if brake.force_scale <= 0.0 {
            bail!("brake.force_scale must be positive");
        }

        if self.sink.enabled && self.sink.timeout_ms == 0 {
            bail!("sink.timeout_ms must be positive when the sink is enabled");
        }

        check_stream("source.lane", &self.source.lane)?;
        check_stream("source.brake", &self.source.brake)?;
        for window in &self.source.turn_signals {
            if window.to_ms < window.from_ms {
                bail!(
                    "turn signal window ends before it starts ({} > {})",
                    window.from_ms,
                    window.to_ms
                );
            }
        }

        Ok(())
    }

    pub fn drift_config(&self) -> DriftConfig {
        DriftConfig {
            center_tolerance_px: self.lane.center_tolerance_px,
            drift_margin_px: self.lane.drift_margin_px,
            persistence_frames: self.lane.persistence_frames,
            cooldown_ms: self.lane.cooldown_secs * 1000.0,
            ema_alpha: self.lane.ema_alpha,
        }
    }

    pub fn brake_config(&self) -> BrakeConfig {
        BrakeConfig {
            hard_threshold_g: self.brake.hard_threshold_g,
            moderate_threshold_g: self.brake.moderate_threshold_g,
            cooldown_ms: self.brake.cooldown_secs * 1000.0,
            ema_alpha: self.brake.ema_alpha,
            force_scale: self.brake.force_scale,
        }
    }
}

fn check_alpha(name: &str, alpha: f64) -> Result<()> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        bail!("{} must be in (0, 1], got {}", name, alpha);
    }
    Ok(())
}

fn check_cooldown(name: &str, secs: f64) -> Result<()> {
    if !(secs >= 0.0) {
        bail!("{} must be non-negative, got {}", name, secs);
    }
    Ok(())
}

fn check_stream(name: &str, stream: &StreamConfig) -> Result<()> {
    if stream.enabled && stream.kind == SourceKind::Replay && stream.path.is_none() {
        bail!("{}: replay source needs a path", name);
    }
    Ok(())
}
