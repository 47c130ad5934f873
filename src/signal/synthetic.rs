// src/signal/synthetic.rs
//
// Scripted scenarios for bench runs without a camera or IMU. Timestamps are
// virtual (frame index × period) so cooldowns behave the same whether or not
// the runner paces ticks in real time.

use super::{Acquisition, AccelSample, LaneSample, SignalSource};
use crate::types::{BehaviorClass, LaneState};

const LANE_JITTER_PX: f64 = 4.0;
const ACCEL_JITTER_G: f64 = 0.02;

/// `frames` ticks around a target deviation. `None` = no lanes detected.
#[derive(Debug, Clone, Copy)]
pub struct LaneSegment {
    pub frames: u32,
    pub deviation_px: Option<f64>,
}

impl LaneSegment {
    pub fn steady(frames: u32, deviation_px: f64) -> Self {
        Self {
            frames,
            deviation_px: Some(deviation_px),
        }
    }

    pub fn occluded(frames: u32) -> Self {
        Self {
            frames,
            deviation_px: None,
        }
    }
}

/// Centered → left drift → centered → occlusion → right drift → centered.
pub fn default_lane_scenario() -> Vec<LaneSegment> {
    vec![
        LaneSegment::steady(30, 0.0),
        LaneSegment::steady(25, -70.0),
        LaneSegment::steady(20, 0.0),
        LaneSegment::occluded(10),
        LaneSegment::steady(25, 70.0),
        LaneSegment::steady(30, 0.0),
    ]
}

pub struct SyntheticLaneSource {
    segments: Vec<LaneSegment>,
    frame_period_ms: f64,
    center_tolerance_px: f64,
    segment_idx: usize,
    frame_in_segment: u32,
    frame: u64,
}

impl SyntheticLaneSource {
    pub fn new(segments: Vec<LaneSegment>, frame_period_ms: f64, center_tolerance_px: f64) -> Self {
        Self {
            segments,
            frame_period_ms,
            center_tolerance_px,
            segment_idx: 0,
            frame_in_segment: 0,
            frame: 0,
        }
    }
}

impl SignalSource for SyntheticLaneSource {
    type Sample = LaneSample;

    fn acquire(&mut self) -> Acquisition<LaneSample> {
        let segment = loop {
            let Some(segment) = self.segments.get(self.segment_idx) else {
                return Acquisition::Exhausted;
            };
            if self.frame_in_segment < segment.frames {
                break *segment;
            }
            self.segment_idx += 1;
            self.frame_in_segment = 0;
        };

        let timestamp_ms = self.frame as f64 * self.frame_period_ms;
        let wobble = jitter(self.frame) * LANE_JITTER_PX;
        self.frame += 1;
        self.frame_in_segment += 1;

        let sample = match segment.deviation_px {
            Some(target) => {
                let px = target + wobble;
                LaneSample {
                    timestamp_ms,
                    deviation_px: Some(px),
                    lane_state: LaneState::from_deviation(px, self.center_tolerance_px),
                }
            }
            None => LaneSample {
                timestamp_ms,
                deviation_px: None,
                lane_state: LaneState::NoLanesDetected,
            },
        };
        Acquisition::Sample(sample)
    }

    fn name(&self) -> &str {
        "synthetic-lane"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccelSegment {
    pub frames: u32,
    pub accel_g: f64,
    pub behavior: Option<BehaviorClass>,
}

impl AccelSegment {
    pub fn new(frames: u32, accel_g: f64, behavior: Option<BehaviorClass>) -> Self {
        Self {
            frames,
            accel_g,
            behavior,
        }
    }
}

/// Cruise, moderate stop, hard stop, then an aggressive→dangerous stretch.
pub fn default_accel_scenario() -> Vec<AccelSegment> {
    use BehaviorClass::*;
    vec![
        AccelSegment::new(50, 0.97, None), // model warming up
        AccelSegment::new(100, 0.97, Some(Normal)),
        AccelSegment::new(10, 1.2, Some(Moderate)),
        AccelSegment::new(100, 0.97, Some(Normal)),
        AccelSegment::new(6, 1.75, Some(Aggressive)),
        AccelSegment::new(100, 0.97, Some(Dangerous)),
        AccelSegment::new(100, 0.97, Some(Normal)),
    ]
}

pub struct SyntheticAccelSource {
    segments: Vec<AccelSegment>,
    sample_period_ms: f64,
    segment_idx: usize,
    frame_in_segment: u32,
    frame: u64,
}

impl SyntheticAccelSource {
    pub fn new(segments: Vec<AccelSegment>, sample_period_ms: f64) -> Self {
        Self {
            segments,
            sample_period_ms,
            segment_idx: 0,
            frame_in_segment: 0,
            frame: 0,
        }
    }
}

impl SignalSource for SyntheticAccelSource {
    type Sample = AccelSample;

    fn acquire(&mut self) -> Acquisition<AccelSample> {
        let segment = loop {
            let Some(segment) = self.segments.get(self.segment_idx) else {
                return Acquisition::Exhausted;
            };
            if self.frame_in_segment < segment.frames {
                break *segment;
            }
            self.segment_idx += 1;
            self.frame_in_segment = 0;
        };

        let sample = AccelSample {
            timestamp_ms: self.frame as f64 * self.sample_period_ms,
            accel_g: segment.accel_g + jitter(self.frame) * ACCEL_JITTER_G,
            behavior: segment.behavior,
            confidence: segment.behavior.map(|_| 0.85),
        };
        self.frame += 1;
        self.frame_in_segment += 1;
        Acquisition::Sample(sample)
    }

    fn name(&self) -> &str {
        "synthetic-imu"
    }
}

/// Deterministic wobble in [-1, 1].
fn jitter(frame: u64) -> f64 {
    (frame as f64 * 0.7).sin()
}
