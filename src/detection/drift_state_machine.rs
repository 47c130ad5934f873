// src/detection/drift_state_machine.rs
//
// Unsignaled lane-drift detection.
//
// Smoothed lateral deviation -> per-direction persistence counters ->
// debounced violation. A drift has to sit outside the hysteresis band
// (tolerance + margin) for `persistence_frames` consecutive samples, the
// matching blinker has to be off, and the cooldown has to have elapsed.
// Inside the band both counters decay by one per sample, so a short
// excursion back toward center does not wipe a sustained drift.

use super::cooldown::CooldownTimer;
use super::smoother::Ema;
use super::types::{LaneDeviationEvent, ViolationEvent};
use crate::signal::{LaneSample, TurnSignalState};
use crate::types::Side;
use tracing::{debug, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// |deviation| at or below this is "centered" (px)
    pub center_tolerance_px: f64,
    /// Extra px beyond the tolerance before a sample counts as drift
    pub drift_margin_px: f64,
    /// Consecutive qualifying samples required to fire
    pub persistence_frames: u32,
    /// Minimum time between two drift violations
    pub cooldown_ms: f64,
    pub ema_alpha: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            center_tolerance_px: 40.0,
            drift_margin_px: 20.0,
            persistence_frames: 6,
            cooldown_ms: 3000.0,
            ema_alpha: 0.25,
        }
    }
}

impl DriftConfig {
    /// Half-width of the band a smoothed sample must leave to count as drift.
    pub fn drift_band_px(&self) -> f64 {
        self.center_tolerance_px + self.drift_margin_px
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftState {
    Centered,
    AccumulatingLeft(u32),
    AccumulatingRight(u32),
}

impl DriftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Centered => "CENTERED",
            Self::AccumulatingLeft(_) => "ACCUMULATING_LEFT",
            Self::AccumulatingRight(_) => "ACCUMULATING_RIGHT",
        }
    }
}

/// Persistence counters plus cooldown, fed with already-smoothed deviation.
#[derive(Debug, Clone)]
pub struct DriftStateMachine {
    band_px: f64,
    persistence_frames: u32,
    left_persist: u32,
    right_persist: u32,
    cooldown: CooldownTimer,
}

impl DriftStateMachine {
    pub fn new(config: &DriftConfig) -> Self {
        Self {
            band_px: config.drift_band_px(),
            persistence_frames: config.persistence_frames,
            left_persist: 0,
            right_persist: 0,
            cooldown: CooldownTimer::new(config.cooldown_ms),
        }
    }

    /// Advance one tick with a smoothed deviation (negative = left of center).
    pub fn step(
        &mut self,
        smoothed_px: f64,
        signals: TurnSignalState,
        now_ms: f64,
    ) -> Option<LaneDeviationEvent> {
        if smoothed_px < -self.band_px {
            self.left_persist += 1;
            self.right_persist = 0;
            self.try_fire(Side::Left, signals.left, smoothed_px, now_ms)
        } else if smoothed_px > self.band_px {
            self.right_persist += 1;
            self.left_persist = 0;
            self.try_fire(Side::Right, signals.right, smoothed_px, now_ms)
        } else {
            self.left_persist = self.left_persist.saturating_sub(1);
            self.right_persist = self.right_persist.saturating_sub(1);
            None
        }
    }

    fn try_fire(
        &mut self,
        side: Side,
        signal_on: bool,
        smoothed_px: f64,
        now_ms: f64,
    ) -> Option<LaneDeviationEvent> {
        let count = self.counter(side);
        if count < self.persistence_frames {
            return None;
        }
        if signal_on {
            debug!(
                "{} drift persisted {} frames with blinker on, not a violation",
                side.as_str(),
                count
            );
            return None;
        }
        if !self.cooldown.is_elapsed(now_ms) {
            debug!("{} drift suppressed by cooldown", side.as_str());
            return None;
        }

        match side {
            Side::Left => self.left_persist = 0,
            Side::Right => self.right_persist = 0,
        }
        self.cooldown.record(now_ms);

        Some(LaneDeviationEvent {
            timestamp_ms: now_ms,
            side,
            ema_deviation_px: smoothed_px,
        })
    }

    fn counter(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_persist,
            Side::Right => self.right_persist,
        }
    }

    pub fn state(&self) -> DriftState {
        if self.left_persist > 0 {
            DriftState::AccumulatingLeft(self.left_persist)
        } else if self.right_persist > 0 {
            DriftState::AccumulatingRight(self.right_persist)
        } else {
            DriftState::Centered
        }
    }

    pub fn counters(&self) -> (u32, u32) {
        (self.left_persist, self.right_persist)
    }

    pub fn last_fired_ms(&self) -> Option<f64> {
        self.cooldown.last_fired_ms()
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

/// Outcome of one lane tick.
#[derive(Debug, Clone)]
pub struct DriftTick {
    pub state: DriftState,
    pub smoothed_px: f64,
    /// The sample had no reliable deviation and was skipped
    pub dropped: bool,
    pub event: Option<ViolationEvent>,
}

/// One lane-drift detector instance: owns its EMA, counters and cooldown.
pub struct LaneDriftDetector {
    ema: Ema,
    machine: DriftStateMachine,
    frames_processed: u64,
    frames_dropped: u64,
}

impl LaneDriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            ema: Ema::new(config.ema_alpha),
            machine: DriftStateMachine::new(&config),
            frames_processed: 0,
            frames_dropped: 0,
        }
    }

    pub fn update(&mut self, sample: &LaneSample, signals: TurnSignalState) -> DriftTick {
        self.frames_processed += 1;

        // Occluded or half-detected frames are dropped outright. Feeding them
        // as zero would pull the EMA toward center and decay the counters.
        let raw = match sample.reliable_deviation() {
            Some(px) => px,
            None => {
                self.frames_dropped += 1;
                debug!(
                    "Dropping lane frame at {:.0}ms ({})",
                    sample.timestamp_ms,
                    sample.lane_state.as_str()
                );
                return DriftTick {
                    state: self.machine.state(),
                    smoothed_px: self.ema.value(),
                    dropped: true,
                    event: None,
                };
            }
        };

        let smoothed = self.ema.update(raw);
        let event = self.machine.step(smoothed, signals, sample.timestamp_ms);

        if let Some(ref e) = event {
            warn!(
                "⚠️  Unsignaled {} deviation | EMA deviation: {:.1}px",
                e.side.as_str(),
                e.ema_deviation_px
            );
        }

        DriftTick {
            state: self.machine.state(),
            smoothed_px: smoothed,
            dropped: false,
            event: event.map(ViolationEvent::LaneDeviation),
        }
    }

    pub fn state(&self) -> DriftState {
        self.machine.state()
    }

    pub fn smoothed_px(&self) -> f64 {
        self.ema.value()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}
