// src/detection/cooldown.rs

/// Last-fired timestamp for one detector kind.
///
/// An unset timer counts as elapsed. Elapsed means strictly longer than the
/// configured window, so a second firing exactly `window_ms` later is refused.
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    window_ms: f64,
    last_fired_ms: Option<f64>,
}

impl CooldownTimer {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            last_fired_ms: None,
        }
    }

    pub fn is_elapsed(&self, now_ms: f64) -> bool {
        match self.last_fired_ms {
            None => true,
            Some(last) => now_ms - last > self.window_ms,
        }
    }

    pub fn record(&mut self, now_ms: f64) {
        self.last_fired_ms = Some(now_ms);
    }

    pub fn last_fired_ms(&self) -> Option<f64> {
        self.last_fired_ms
    }

    pub fn reset(&mut self) {
        self.last_fired_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_timer_is_elapsed() {
        let timer = CooldownTimer::new(3000.0);
        assert!(timer.is_elapsed(0.0));
        assert!(timer.last_fired_ms().is_none());
    }

    #[test]
    fn test_window_is_exclusive() {
        let mut timer = CooldownTimer::new(3000.0);
        timer.record(1000.0);

        assert!(!timer.is_elapsed(2500.0));
        assert!(!timer.is_elapsed(4000.0));
        assert!(timer.is_elapsed(4000.5));
    }

    #[test]
    fn test_reset_clears_last_fire() {
        let mut timer = CooldownTimer::new(2000.0);
        timer.record(500.0);
        timer.reset();
        assert!(timer.is_elapsed(600.0));
    }
}
