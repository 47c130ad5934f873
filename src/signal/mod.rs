// src/signal/mod.rs
//
// Inputs to the detectors. Everything upstream of a raw sample (camera,
// lane geometry, IMU registers, behavior model) lives outside this crate;
// sources here either synthesize a scenario or replay a recorded trace.

pub mod replay;
pub mod synthetic;
pub mod turn_signal;

use crate::types::{BehaviorClass, LaneState};
use serde::{Deserialize, Serialize};

pub use replay::{ReplayAccelSource, ReplayLaneSource};
pub use synthetic::{SyntheticAccelSource, SyntheticLaneSource};
pub use turn_signal::{NoTurnSignals, ScriptedTurnSignals, TurnSignalInput, TurnSignalState};

/// One vision tick: lateral deviation of the lane center from the frame
/// center (negative = vehicle drifting left) plus the geometry state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneSample {
    #[serde(rename = "t_ms")]
    pub timestamp_ms: f64,
    #[serde(default)]
    pub deviation_px: Option<f64>,
    pub lane_state: LaneState,
}

impl LaneSample {
    /// Deviation usable by the drift detector, or None for frames that must
    /// be dropped (missing boundary, no lanes, absent or non-finite value).
    pub fn reliable_deviation(&self) -> Option<f64> {
        if !self.lane_state.has_reliable_deviation() {
            return None;
        }
        self.deviation_px.filter(|px| px.is_finite())
    }
}

/// One IMU tick: acceleration magnitude in g plus the behavior model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    #[serde(rename = "t_ms")]
    pub timestamp_ms: f64,
    pub accel_g: f64,
    #[serde(default, rename = "behavior_class")]
    pub behavior: Option<BehaviorClass>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Result of asking a source for the next sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition<T> {
    Sample(T),
    /// Nothing usable this tick; the tick is skipped
    Missed,
    /// Source finished; the loop stops
    Exhausted,
}

/// Periodic producer of raw samples.
pub trait SignalSource {
    type Sample;

    fn acquire(&mut self) -> Acquisition<Self::Sample>;

    fn name(&self) -> &str;
}

impl<S: SignalSource + ?Sized> SignalSource for Box<S> {
    type Sample = S::Sample;

    fn acquire(&mut self) -> Acquisition<Self::Sample> {
        (**self).acquire()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
