// src/detection/brake_classifier.rs
//
// Brake and driving-behavior events from the IMU acceleration magnitude.
//
// Two independent rules:
//   1. Brake level from |a| (> hard → hard, > moderate → moderate), gated by
//      a brake-only cooldown.
//   2. Behavior change: fires when the behavior model's class moves INTO
//      Aggressive or Dangerous from any other class. No cooldown, only edges.

use super::cooldown::CooldownTimer;
use super::smoother::Ema;
use super::types::{BehaviorChangeEvent, BrakeEvent, BrakeLevel, ViolationEvent};
use crate::signal::AccelSample;
use crate::types::BehaviorClass;
use tracing::{info, warn};

/// Speed assumed when the behavior model has not produced a class yet.
const DEFAULT_SPEED_MPH: u32 = 45;

#[derive(Debug, Clone)]
pub struct BrakeConfig {
    pub hard_threshold_g: f64,
    pub moderate_threshold_g: f64,
    pub cooldown_ms: f64,
    /// 1.0 classifies the instantaneous magnitude
    pub ema_alpha: f64,
    /// g → 0-100 force display scale. A display heuristic, not calibrated.
    pub force_scale: f64,
}

impl Default for BrakeConfig {
    fn default() -> Self {
        Self {
            hard_threshold_g: 1.5,
            moderate_threshold_g: 1.0,
            cooldown_ms: 2000.0,
            ema_alpha: 1.0,
            force_scale: 50.0,
        }
    }
}

/// Classify an acceleration magnitude. Both thresholds are exclusive.
pub fn classify_brake(accel_g: f64, moderate_threshold_g: f64, hard_threshold_g: f64) -> Option<BrakeLevel> {
    if accel_g > hard_threshold_g {
        Some(BrakeLevel::Hard)
    } else if accel_g > moderate_threshold_g {
        Some(BrakeLevel::Moderate)
    } else {
        None
    }
}

/// Rough speed guess from the behavior class.
///
/// Placeholder until a GPS speed feed is wired in; these numbers are not a
/// measurement and should not be read as one.
pub fn estimated_speed_mph(class: Option<BehaviorClass>) -> u32 {
    match class {
        Some(BehaviorClass::Normal) => 35,
        Some(BehaviorClass::Moderate) => 50,
        Some(BehaviorClass::Aggressive) => 60,
        Some(BehaviorClass::Dangerous) => 70,
        None => DEFAULT_SPEED_MPH,
    }
}

pub fn brake_force(accel_g: f64, force_scale: f64) -> u8 {
    (accel_g * force_scale).trunc().clamp(0.0, 100.0) as u8
}

/// Outcome of one IMU tick.
#[derive(Debug, Clone)]
pub struct BrakeTick {
    pub smoothed_g: f64,
    /// Classification of this sample, whether or not the cooldown let it fire
    pub level: Option<BrakeLevel>,
    pub events: Vec<ViolationEvent>,
}

/// One brake detector instance: owns its EMA, cooldown and last behavior class.
pub struct BrakeClassifier {
    config: BrakeConfig,
    ema: Ema,
    cooldown: CooldownTimer,
    previous_class: Option<BehaviorClass>,
}

impl BrakeClassifier {
    pub fn new(config: BrakeConfig) -> Self {
        Self {
            ema: Ema::new(config.ema_alpha),
            cooldown: CooldownTimer::new(config.cooldown_ms),
            previous_class: None,
            config,
        }
    }

    pub fn update(&mut self, sample: &AccelSample) -> BrakeTick {
        let now_ms = sample.timestamp_ms;
        let smoothed_g = self.ema.update(sample.accel_g);
        let level = classify_brake(
            smoothed_g,
            self.config.moderate_threshold_g,
            self.config.hard_threshold_g,
        );

        let mut events = Vec::new();

        if let Some(level) = level {
            if self.cooldown.is_elapsed(now_ms) {
                let speed = estimated_speed_mph(sample.behavior);
                warn!(
                    "🛑 {} braking: {:.2}g at ~{} mph",
                    level.as_str(),
                    smoothed_g,
                    speed
                );
                events.push(ViolationEvent::Brake(BrakeEvent {
                    timestamp_ms: now_ms,
                    level,
                    accel_magnitude_g: smoothed_g,
                    force: brake_force(smoothed_g, self.config.force_scale),
                    estimated_speed_mph: speed,
                    behavior: sample.behavior,
                }));
                self.cooldown.record(now_ms);
            }
        }

        // A tick without a class leaves the last known class in place.
        if let Some(class) = sample.behavior {
            if class.is_risky() && self.previous_class != Some(class) {
                info!(
                    "🔺 Behavior change: {:?} → {} (risk {})",
                    self.previous_class,
                    class.behavior_type(),
                    class.risk_level()
                );
                events.push(ViolationEvent::BehaviorChange(BehaviorChangeEvent {
                    timestamp_ms: now_ms,
                    class,
                    previous: self.previous_class,
                    confidence: sample.confidence,
                }));
            }
            self.previous_class = Some(class);
        }

        BrakeTick {
            smoothed_g,
            level,
            events,
        }
    }

    pub fn previous_class(&self) -> Option<BehaviorClass> {
        self.previous_class
    }

    pub fn last_brake_ms(&self) -> Option<f64> {
        self.cooldown.last_fired_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::ViolationKind;

    fn sample(t: f64, g: f64, class: Option<BehaviorClass>) -> AccelSample {
        AccelSample {
            timestamp_ms: t,
            accel_g: g,
            behavior: class,
            confidence: Some(0.9),
        }
    }

    fn kinds(tick: &BrakeTick) -> Vec<ViolationKind> {
        tick.events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(classify_brake(1.5, 1.0, 1.5), Some(BrakeLevel::Moderate));
        assert_eq!(classify_brake(1.50001, 1.0, 1.5), Some(BrakeLevel::Hard));
        assert_eq!(classify_brake(1.0, 1.0, 1.5), None);
        assert_eq!(classify_brake(1.00001, 1.0, 1.5), Some(BrakeLevel::Moderate));
        assert_eq!(classify_brake(0.2, 1.0, 1.5), None);
    }

    #[test]
    fn test_speed_lookup() {
        assert_eq!(estimated_speed_mph(Some(BehaviorClass::Normal)), 35);
        assert_eq!(estimated_speed_mph(Some(BehaviorClass::Moderate)), 50);
        assert_eq!(estimated_speed_mph(Some(BehaviorClass::Aggressive)), 60);
        assert_eq!(estimated_speed_mph(Some(BehaviorClass::Dangerous)), 70);
        assert_eq!(estimated_speed_mph(None), 45);
    }

    #[test]
    fn test_force_scale() {
        assert_eq!(brake_force(1.2, 50.0), 60);
        assert_eq!(brake_force(1.99, 50.0), 99);
        assert_eq!(brake_force(2.5, 50.0), 100);
        assert_eq!(brake_force(1.2, 25.0), 30);
    }

    #[test]
    fn test_hard_brake_event() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        let tick = clf.update(&sample(0.0, 1.8, Some(BehaviorClass::Normal)));

        assert_eq!(kinds(&tick), vec![ViolationKind::HardBrake]);
        match &tick.events[0] {
            ViolationEvent::Brake(e) => {
                assert_eq!(e.force, 90);
                assert_eq!(e.estimated_speed_mph, 35);
                assert_eq!(e.behavior, Some(BehaviorClass::Normal));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_exactly_hard_threshold_is_moderate() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        let tick = clf.update(&sample(0.0, 1.5, None));
        assert_eq!(kinds(&tick), vec![ViolationKind::ModerateBrake]);

        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        let tick = clf.update(&sample(0.0, 1.50001, None));
        assert_eq!(kinds(&tick), vec![ViolationKind::HardBrake]);
    }

    #[test]
    fn test_brake_cooldown() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        assert_eq!(clf.update(&sample(0.0, 1.2, None)).events.len(), 1);

        // Still braking inside the 2s window: classified, not emitted
        let tick = clf.update(&sample(1000.0, 1.7, None));
        assert_eq!(tick.level, Some(BrakeLevel::Hard));
        assert!(tick.events.is_empty());

        let tick = clf.update(&sample(2000.0, 1.7, None));
        assert!(tick.events.is_empty());

        let tick = clf.update(&sample(2000.5, 1.7, None));
        assert_eq!(kinds(&tick), vec![ViolationKind::HardBrake]);
        assert_eq!(clf.last_brake_ms(), Some(2000.5));
    }

    #[test]
    fn test_quiet_sample_does_not_start_cooldown() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        clf.update(&sample(0.0, 0.98, None));
        assert!(clf.last_brake_ms().is_none());
        assert_eq!(clf.update(&sample(20.0, 1.1, None)).events.len(), 1);
    }

    #[test]
    fn test_behavior_change_dedup() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        let quiet = 0.98;

        let mut fired = 0;
        for i in 0..10 {
            let tick = clf.update(&sample(i as f64 * 20.0, quiet, Some(BehaviorClass::Dangerous)));
            fired += tick.events.len();
        }
        assert_eq!(fired, 1);

        clf.update(&sample(300.0, quiet, Some(BehaviorClass::Normal)));
        let tick = clf.update(&sample(320.0, quiet, Some(BehaviorClass::Dangerous)));
        assert_eq!(kinds(&tick), vec![ViolationKind::BehaviorChange]);
    }

    #[test]
    fn test_behavior_escalation_emits_each_risky_class() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        let quiet = 0.5;

        assert!(clf.update(&sample(0.0, quiet, Some(BehaviorClass::Normal))).events.is_empty());
        assert!(clf.update(&sample(20.0, quiet, Some(BehaviorClass::Moderate))).events.is_empty());

        let tick = clf.update(&sample(40.0, quiet, Some(BehaviorClass::Aggressive)));
        match &tick.events[..] {
            [ViolationEvent::BehaviorChange(e)] => {
                assert_eq!(e.class, BehaviorClass::Aggressive);
                assert_eq!(e.previous, Some(BehaviorClass::Moderate));
            }
            other => panic!("unexpected events {:?}", other),
        }

        let tick = clf.update(&sample(60.0, quiet, Some(BehaviorClass::Dangerous)));
        assert_eq!(kinds(&tick), vec![ViolationKind::BehaviorChange]);

        // De-escalation never emits
        assert!(clf.update(&sample(80.0, quiet, Some(BehaviorClass::Moderate))).events.is_empty());
    }

    #[test]
    fn test_missing_class_keeps_previous() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        clf.update(&sample(0.0, 0.5, Some(BehaviorClass::Aggressive)));
        clf.update(&sample(20.0, 0.5, None));
        assert_eq!(clf.previous_class(), Some(BehaviorClass::Aggressive));

        let tick = clf.update(&sample(40.0, 0.5, Some(BehaviorClass::Aggressive)));
        assert!(tick.events.is_empty());
    }

    #[test]
    fn test_behavior_change_ignores_brake_cooldown() {
        let mut clf = BrakeClassifier::new(BrakeConfig::default());
        clf.update(&sample(0.0, 1.9, Some(BehaviorClass::Normal)));

        let tick = clf.update(&sample(20.0, 1.9, Some(BehaviorClass::Dangerous)));
        assert_eq!(kinds(&tick), vec![ViolationKind::BehaviorChange]);
    }

    #[test]
    fn test_smoothed_magnitude() {
        let config = BrakeConfig {
            ema_alpha: 0.5,
            ..BrakeConfig::default()
        };
        let mut clf = BrakeClassifier::new(config);

        // One spike is halved by the filter
        let tick = clf.update(&sample(0.0, 1.8, None));
        assert_eq!(tick.smoothed_g, 0.9);
        assert!(tick.events.is_empty());
    }
}
