// src/detection/smoother.rs

/// One step of an exponential moving average.
///
/// `alpha` weights the newest sample; higher alpha is more responsive and
/// less smooth. Callers guarantee `alpha` in (0, 1].
pub fn ema_update(previous: f64, current_raw: f64, alpha: f64) -> f64 {
    alpha * current_raw + (1.0 - alpha) * previous
}

/// EMA state owned by a single detector. Keeps only the current value;
/// any history for display is the caller's business.
#[derive(Debug, Clone)]
pub struct Ema {
    value: f64,
    alpha: f64,
}

impl Ema {
    /// Starts from 0.0 (centered lane, vehicle at rest).
    pub fn new(alpha: f64) -> Self {
        Self { value: 0.0, alpha }
    }

    pub fn update(&mut self, raw: f64) -> f64 {
        self.value = ema_update(self.value, raw, self.alpha);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_is_fixed_point() {
        for alpha in [0.05, 0.25, 0.5, 1.0] {
            let mut value = -37.5;
            for _ in 0..50 {
                value = ema_update(value, -37.5, alpha);
                assert_eq!(value, -37.5, "alpha {} drifted", alpha);
            }
        }
    }

    #[test]
    fn test_step_converges_without_overshoot() {
        let target = 80.0;
        let mut ema = Ema::new(0.25);
        let mut last = ema.value();

        for _ in 0..200 {
            let v = ema.update(target);
            assert!(v >= last, "not monotone: {} after {}", v, last);
            assert!(v <= target, "overshoot: {}", v);
            last = v;
        }
        assert!((target - last).abs() < 1e-6);
    }

    #[test]
    fn test_negative_step_converges_from_above() {
        let mut ema = Ema::new(0.4);
        let mut last = ema.value();
        for _ in 0..100 {
            let v = ema.update(-65.0);
            assert!(v <= last && v >= -65.0);
            last = v;
        }
    }

    #[test]
    fn test_alpha_one_is_passthrough() {
        let mut ema = Ema::new(1.0);
        assert_eq!(ema.update(1.73), 1.73);
        assert_eq!(ema.update(0.2), 0.2);
    }

    #[test]
    fn test_reference_weighting() {
        // 0.25 * 100 + 0.75 * 0
        assert_eq!(ema_update(0.0, 100.0, 0.25), 25.0);
        // 0.25 * 100 + 0.75 * 25
        assert_eq!(ema_update(25.0, 100.0, 0.25), 43.75);
    }

    #[test]
    fn test_reset() {
        let mut ema = Ema::new(0.5);
        ema.update(10.0);
        ema.reset();
        assert_eq!(ema.value(), 0.0);
    }
}
