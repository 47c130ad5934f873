use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIG TREE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lane: LaneConfig,
    pub brake: BrakeSection,
    pub sink: SinkConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub center_tolerance_px: f64,
    pub drift_margin_px: f64,
    pub persistence_frames: u32,
    pub cooldown_secs: f64,
    pub ema_alpha: f64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            center_tolerance_px: 40.0,
            drift_margin_px: 20.0, // extra px beyond tolerance to confirm drift
            persistence_frames: 6,
            cooldown_secs: 3.0,
            ema_alpha: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeSection {
    pub hard_threshold_g: f64,
    pub moderate_threshold_g: f64,
    pub cooldown_secs: f64,
    /// 1.0 = classify the instantaneous magnitude
    pub ema_alpha: f64,
    pub force_scale: f64,
}

impl Default for BrakeSection {
    fn default() -> Self {
        Self {
            hard_threshold_g: 1.5,
            moderate_threshold_g: 1.0,
            cooldown_secs: 2.0,
            ema_alpha: 1.0,
            force_scale: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8000/emit".to_string(),
            timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub lane: StreamConfig,
    pub brake: StreamConfig,
    /// Turn-signal windows for replay/simulation. Empty = no blinker hardware.
    pub turn_signals: Vec<TurnSignalWindow>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            lane: StreamConfig {
                tick_interval_ms: 100, // ~10 fps camera loop
                ..StreamConfig::default()
            },
            brake: StreamConfig {
                tick_interval_ms: 20, // 50 Hz IMU
                ..StreamConfig::default()
            },
            turn_signals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub kind: SourceKind,
    /// JSONL trace for `kind: replay`
    pub path: Option<String>,
    /// 0 = no pacing, process as fast as samples arrive
    pub tick_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: SourceKind::Synthetic,
            path: None,
            tick_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    Replay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TurnSignalWindow {
    pub side: Side,
    pub from_ms: f64,
    pub to_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for tick logs and the session summary
    pub output_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output_dir: "logs".to_string(),
        }
    }
}

// ============================================================================
// SHARED DOMAIN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn lane_name(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

/// Categorical lane state reported by the upstream geometry stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneState {
    Centered,
    LeftDrift,
    RightDrift,
    #[serde(rename = "lane_boundary_missing", alias = "boundary_missing")]
    BoundaryMissing,
    NoLanesDetected,
}

impl LaneState {
    /// State label the geometry stage attaches to a measured deviation.
    pub fn from_deviation(deviation_px: f64, center_tolerance_px: f64) -> Self {
        if deviation_px.abs() <= center_tolerance_px {
            Self::Centered
        } else if deviation_px > 0.0 {
            Self::RightDrift
        } else {
            Self::LeftDrift
        }
    }

    /// False for frames where the geometry stage could not place both boundaries.
    pub fn has_reliable_deviation(&self) -> bool {
        !matches!(self, Self::BoundaryMissing | Self::NoLanesDetected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Centered => "centered",
            Self::LeftDrift => "left_drift",
            Self::RightDrift => "right_drift",
            Self::BoundaryMissing => "lane_boundary_missing",
            Self::NoLanesDetected => "no_lanes_detected",
        }
    }
}

/// Output class of the external driving-behavior model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BehaviorClass {
    Normal = 1,
    Moderate = 2,
    Aggressive = 3,
    Dangerous = 4,
}

impl BehaviorClass {
    pub const ALL: [BehaviorClass; 4] = [
        Self::Normal,
        Self::Moderate,
        Self::Aggressive,
        Self::Dangerous,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn behavior_type(&self) -> &'static str {
        match self {
            Self::Normal => "Normal Driving",
            Self::Moderate => "Moderate Driving",
            Self::Aggressive => "Aggressive Driving",
            Self::Dangerous => "Dangerous Driving",
        }
    }

    pub fn risk_level(&self) -> &'static str {
        match self {
            Self::Normal => "Low",
            Self::Moderate => "Low-Medium",
            Self::Aggressive => "High",
            Self::Dangerous => "Very High",
        }
    }

    pub fn is_risky(&self) -> bool {
        matches!(self, Self::Aggressive | Self::Dangerous)
    }
}

impl TryFrom<u8> for BehaviorClass {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Moderate),
            3 => Ok(Self::Aggressive),
            4 => Ok(Self::Dangerous),
            other => Err(format!("behavior class must be 1-4, got {}", other)),
        }
    }
}

impl From<BehaviorClass> for u8 {
    fn from(class: BehaviorClass) -> u8 {
        class.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_class_codes() {
        for class in BehaviorClass::ALL {
            assert_eq!(BehaviorClass::try_from(class.code()), Ok(class));
        }
        assert!(BehaviorClass::try_from(0).is_err());
        assert!(BehaviorClass::try_from(5).is_err());
    }

    #[test]
    fn test_lane_state_reliability() {
        assert!(LaneState::Centered.has_reliable_deviation());
        assert!(LaneState::LeftDrift.has_reliable_deviation());
        assert!(!LaneState::BoundaryMissing.has_reliable_deviation());
        assert!(!LaneState::NoLanesDetected.has_reliable_deviation());
    }

    #[test]
    fn test_lane_state_accepts_recorded_labels() {
        let state: LaneState = serde_json::from_str("\"lane_boundary_missing\"").unwrap();
        assert_eq!(state, LaneState::BoundaryMissing);
        let state: LaneState = serde_json::from_str("\"no_lanes_detected\"").unwrap();
        assert_eq!(state, LaneState::NoLanesDetected);
        let state: LaneState = serde_json::from_str("\"boundary_missing\"").unwrap();
        assert_eq!(state, LaneState::BoundaryMissing);
    }

    #[test]
    fn test_lane_state_serializes_as_its_label() {
        for state in [
            LaneState::Centered,
            LaneState::LeftDrift,
            LaneState::RightDrift,
            LaneState::BoundaryMissing,
            LaneState::NoLanesDetected,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }
}
