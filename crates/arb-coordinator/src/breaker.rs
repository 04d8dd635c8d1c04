use arb_metrics::CoordinatorMetrics;
use arb_types::config::BreakerConfig;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen
}

struct Inner {
    state:                BreakerState,
    consecutive_failures: u32,
    first_failure_millis: u64,
    opened_at_millis:     u64
}

/// Closed -> Open after `N` consecutive forward failures within window `W`;
/// Open -> HalfOpen after cooldown `C`; HalfOpen -> Closed on first success,
/// else back to Open.
pub struct CircuitBreaker {
    config:  BreakerConfig,
    inner:   Mutex<Inner>,
    metrics: CoordinatorMetrics
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state:                BreakerState::Closed,
                consecutive_failures: 0,
                first_failure_millis: 0,
                opened_at_millis:     0
            }),
            metrics: CoordinatorMetrics
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Lazily performs the Open -> HalfOpen transition if the cooldown has
    /// elapsed, then reports whether forwarding should be skipped.
    pub fn is_open(&self, now_millis: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::Open && now_millis.saturating_sub(inner.opened_at_millis) >= self.config.cooldown_millis {
            inner.state = BreakerState::HalfOpen;
            self.metrics.breaker_state_changed("half_open");
        }
        inner.state == BreakerState::Open
    }

    pub fn record_success(&self, _now_millis: u64) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                self.metrics.breaker_state_changed("closed");
            }
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self, now_millis: u64) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at_millis = now_millis;
                inner.consecutive_failures = 0;
                self.metrics.breaker_state_changed("open");
            }
            BreakerState::Closed => {
                if inner.consecutive_failures == 0 || now_millis.saturating_sub(inner.first_failure_millis) > self.config.window_millis {
                    inner.first_failure_millis = now_millis;
                    inner.consecutive_failures = 1;
                } else {
                    inner.consecutive_failures += 1;
                }
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at_millis = now_millis;
                    self.metrics.breaker_state_changed("open");
                }
            }
            BreakerState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig { failure_threshold: 3, window_millis: 60_000, cooldown_millis: 1_000 }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure(0);
        breaker.record_failure(100);
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure(200);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn resets_counter_outside_the_window() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure(0);
        breaker.record_failure(100);
        breaker.record_failure(70_000);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_closes_on_success_else_reopens() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure(0);
        breaker.record_failure(10);
        breaker.record_failure(20);
        assert!(breaker.is_open(20));
        assert!(!breaker.is_open(1_500));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success(1_500);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure(0);
        breaker.record_failure(10);
        breaker.record_failure(20);
        assert!(!breaker.is_open(1_500));
        breaker.record_failure(1_600);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
