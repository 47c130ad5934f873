// src/pipeline/metrics.rs
//
// Counters shared by both detector loops. Logged at shutdown and written
// next to the session summary.

use crate::detection::ViolationKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub lane_ticks: Arc<AtomicU64>,
    pub lane_frames_dropped: Arc<AtomicU64>,
    pub lane_missed: Arc<AtomicU64>,
    pub brake_ticks: Arc<AtomicU64>,
    pub brake_missed: Arc<AtomicU64>,
    pub violations_left: Arc<AtomicU64>,
    pub violations_right: Arc<AtomicU64>,
    pub moderate_brakes: Arc<AtomicU64>,
    pub hard_brakes: Arc<AtomicU64>,
    pub behavior_changes: Arc<AtomicU64>,
    pub sink_successes: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            lane_ticks: Arc::new(AtomicU64::new(0)),
            lane_frames_dropped: Arc::new(AtomicU64::new(0)),
            lane_missed: Arc::new(AtomicU64::new(0)),
            brake_ticks: Arc::new(AtomicU64::new(0)),
            brake_missed: Arc::new(AtomicU64::new(0)),
            violations_left: Arc::new(AtomicU64::new(0)),
            violations_right: Arc::new(AtomicU64::new(0)),
            moderate_brakes: Arc::new(AtomicU64::new(0)),
            hard_brakes: Arc::new(AtomicU64::new(0)),
            behavior_changes: Arc::new(AtomicU64::new(0)),
            sink_successes: Arc::new(AtomicU64::new(0)),
            sink_failures: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_violation(&self, kind: ViolationKind) {
        let counter = match kind {
            ViolationKind::UnsignaledLeftDeviation => &self.violations_left,
            ViolationKind::UnsignaledRightDeviation => &self.violations_right,
            ViolationKind::ModerateBrake => &self.moderate_brakes,
            ViolationKind::HardBrake => &self.hard_brakes,
            ViolationKind::BehaviorChange => &self.behavior_changes,
        };
        self.inc(counter);
    }

    fn rate(&self, counter: &AtomicU64) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            counter.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let violations = [
            &self.violations_left,
            &self.violations_right,
            &self.moderate_brakes,
            &self.hard_brakes,
            &self.behavior_changes,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum();

        MetricsSummary {
            lane_ticks: self.lane_ticks.load(Ordering::Relaxed),
            lane_hz: self.rate(&self.lane_ticks),
            lane_frames_dropped: self.lane_frames_dropped.load(Ordering::Relaxed),
            lane_missed: self.lane_missed.load(Ordering::Relaxed),
            brake_ticks: self.brake_ticks.load(Ordering::Relaxed),
            brake_hz: self.rate(&self.brake_ticks),
            brake_missed: self.brake_missed.load(Ordering::Relaxed),
            violations_total: violations,
            violations_left: self.violations_left.load(Ordering::Relaxed),
            violations_right: self.violations_right.load(Ordering::Relaxed),
            moderate_brakes: self.moderate_brakes.load(Ordering::Relaxed),
            hard_brakes: self.hard_brakes.load(Ordering::Relaxed),
            behavior_changes: self.behavior_changes.load(Ordering::Relaxed),
            sink_successes: self.sink_successes.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub lane_ticks: u64,
    pub lane_hz: f64,
    pub lane_frames_dropped: u64,
    pub lane_missed: u64,
    pub brake_ticks: u64,
    pub brake_hz: f64,
    pub brake_missed: u64,
    pub violations_total: u64,
    pub violations_left: u64,
    pub violations_right: u64,
    pub moderate_brakes: u64,
    pub hard_brakes: u64,
    pub behavior_changes: u64,
    pub sink_successes: u64,
    pub sink_failures: u64,
    pub elapsed_secs: f64,
}
