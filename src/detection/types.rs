// src/detection/types.rs
use crate::types::{BehaviorClass, Severity, Side};

pub const LANE_MODULE: &str = "Lane Change Detection";
pub const BRAKE_MODULE: &str = "Brake Checking";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    UnsignaledLeftDeviation,
    UnsignaledRightDeviation,
    ModerateBrake,
    HardBrake,
    BehaviorChange,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsignaledLeftDeviation => "unsignaled_left_deviation",
            Self::UnsignaledRightDeviation => "unsignaled_right_deviation",
            Self::ModerateBrake => "moderate_brake",
            Self::HardBrake => "hard_brake",
            Self::BehaviorChange => "behavior_change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeLevel {
    Moderate,
    Hard,
}

impl BrakeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderate => "moderate",
            Self::Hard => "hard",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Moderate => Severity::Moderate,
            Self::Hard => Severity::High,
        }
    }
}

/// Unsignaled drift out of the lane center.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneDeviationEvent {
    pub timestamp_ms: f64,
    pub side: Side,
    /// Smoothed deviation at the moment of firing (negative = left)
    pub ema_deviation_px: f64,
}

impl LaneDeviationEvent {
    pub const FROM_LANE: &'static str = "Center";

    /// 0-100, lower is worse.
    pub fn safety_score(&self) -> u8 {
        (100.0 - self.ema_deviation_px.abs().trunc()).clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrakeEvent {
    pub timestamp_ms: f64,
    pub level: BrakeLevel,
    pub accel_magnitude_g: f64,
    /// 0-100 display value, see `BrakeConfig::force_scale`
    pub force: u8,
    pub estimated_speed_mph: u32,
    pub behavior: Option<BehaviorClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorChangeEvent {
    pub timestamp_ms: f64,
    pub class: BehaviorClass,
    pub previous: Option<BehaviorClass>,
    pub confidence: Option<f64>,
}

/// A fired violation. Built once when a detector fires and handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationEvent {
    LaneDeviation(LaneDeviationEvent),
    Brake(BrakeEvent),
    BehaviorChange(BehaviorChangeEvent),
}

impl ViolationEvent {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::LaneDeviation(e) => match e.side {
                Side::Left => ViolationKind::UnsignaledLeftDeviation,
                Side::Right => ViolationKind::UnsignaledRightDeviation,
            },
            Self::Brake(e) => match e.level {
                BrakeLevel::Moderate => ViolationKind::ModerateBrake,
                BrakeLevel::Hard => ViolationKind::HardBrake,
            },
            Self::BehaviorChange(_) => ViolationKind::BehaviorChange,
        }
    }

    pub fn module(&self) -> &'static str {
        match self {
            Self::LaneDeviation(_) => LANE_MODULE,
            Self::Brake(_) | Self::BehaviorChange(_) => BRAKE_MODULE,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::LaneDeviation(_) => Severity::High,
            Self::Brake(e) => e.level.severity(),
            Self::BehaviorChange(e) => match e.class {
                BehaviorClass::Dangerous => Severity::High,
                _ => Severity::Moderate,
            },
        }
    }

    /// Deviation in px, acceleration in g, or the behavior class code.
    pub fn magnitude(&self) -> f64 {
        match self {
            Self::LaneDeviation(e) => e.ema_deviation_px,
            Self::Brake(e) => e.accel_magnitude_g,
            Self::BehaviorChange(e) => e.class.code() as f64,
        }
    }

    pub fn timestamp_ms(&self) -> f64 {
        match self {
            Self::LaneDeviation(e) => e.timestamp_ms,
            Self::Brake(e) => e.timestamp_ms,
            Self::BehaviorChange(e) => e.timestamp_ms,
        }
    }

    pub fn event_type(&self) -> String {
        match self {
            Self::LaneDeviation(e) => {
                format!("{} to {}", LaneDeviationEvent::FROM_LANE, e.side.lane_name())
            }
            Self::Brake(e) => e.level.as_str().to_string(),
            Self::BehaviorChange(_) => "behavior_change".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::LaneDeviation(e) => format!(
                "⚠️ Lane change WITHOUT signal! Moved from {} to {} lane. Use turn signals!",
                LaneDeviationEvent::FROM_LANE,
                e.side.lane_name()
            ),
            Self::Brake(e) => match e.level {
                BrakeLevel::Hard => format!(
                    "⚠️ HARD BRAKING DETECTED at {} mph! Maintain safe following distance.",
                    e.estimated_speed_mph
                ),
                BrakeLevel::Moderate => format!(
                    "⚡ Moderate braking at {} mph. Monitor traffic ahead.",
                    e.estimated_speed_mph
                ),
            },
            Self::BehaviorChange(e) => format!(
                "⚠️ {} detected! Risk Level: {}",
                e.class.behavior_type(),
                e.class.risk_level()
            ),
        }
    }
}
