use crate::foundation::CIRCUIT_BREAKER_BASE_BACKOFF_SECS;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MAX_BACKOFF_EXPONENT_SHIFT: u32 = 30;
const JITTER_PERCENT: i64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the endpoint is skipped.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Upper bound for how long an endpoint stays skipped (seconds).
    #[serde(default = "default_open_duration_secs")]
    pub open_duration_secs: u64,
    /// Successes required while probing before the endpoint is trusted again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_open_duration_secs() -> u64 {
    30
}

const fn default_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_secs: default_open_duration_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// Circuit breaker with Closed/Open/HalfOpen states; one per RPC endpoint.
pub struct CircuitBreaker {
    name: String,
    cfg: CircuitBreakerConfig,
    state: parking_lot::Mutex<State>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant, open_count: u32 },
    HalfOpen { successes: u32, open_count: u32 },
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self { name: name.into(), cfg, state: parking_lot::Mutex::new(State::Closed { failures: 0 }) }
    }

    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut guard = self.state.lock();
        match *guard {
            State::Closed { .. } | State::HalfOpen { .. } => true,
            State::Open { until, open_count } => {
                if now < until {
                    debug!(
                        "circuit breaker open endpoint={} open_for_ms={} open_count={}",
                        self.name,
                        until.saturating_duration_since(now).as_millis(),
                        open_count
                    );
                    false
                } else {
                    info!("circuit breaker open->half_open endpoint={} open_count={}", self.name, open_count);
                    *guard = State::HalfOpen { successes: 0, open_count };
                    true
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), State::Open { until, .. } if Instant::now() < until)
    }

    pub fn record_success(&self) {
        let mut guard = self.state.lock();
        match *guard {
            State::Closed { .. } => *guard = State::Closed { failures: 0 },
            State::HalfOpen { successes, open_count } => {
                let next = successes.saturating_add(1);
                if next >= self.cfg.success_threshold.max(1) {
                    info!("circuit breaker half_open->closed endpoint={} successes={}", self.name, next);
                    *guard = State::Closed { failures: 0 };
                } else {
                    *guard = State::HalfOpen { successes: next, open_count };
                }
            }
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.state.lock();
        match *guard {
            State::Closed { failures } => {
                let next = failures.saturating_add(1);
                if next >= self.cfg.failure_threshold.max(1) {
                    let until = self.open_until(1);
                    warn!(
                        "circuit breaker opened endpoint={} failures={} open_for_ms={}",
                        self.name,
                        next,
                        until.saturating_duration_since(Instant::now()).as_millis()
                    );
                    *guard = State::Open { until, open_count: 1 };
                } else {
                    *guard = State::Closed { failures: next };
                }
            }
            State::HalfOpen { open_count, .. } => {
                let next_open_count = open_count.saturating_add(1);
                let until = self.open_until(next_open_count);
                warn!("circuit breaker re-opened endpoint={} open_count={}", self.name, next_open_count);
                *guard = State::Open { until, open_count: next_open_count };
            }
            State::Open { .. } => {}
        }
    }

    /// Exponential backoff from `CIRCUIT_BREAKER_BASE_BACKOFF_SECS`, capped at `open_duration_secs`, with ±20% jitter.
    fn open_until(&self, open_count: u32) -> Instant {
        let base = Duration::from_secs(CIRCUIT_BREAKER_BASE_BACKOFF_SECS);
        let max = Duration::from_secs(self.cfg.open_duration_secs.max(1));
        let shift = open_count.saturating_sub(1).min(MAX_BACKOFF_EXPONENT_SHIFT);
        let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        let capped = base.checked_mul(factor).unwrap_or(max).min(max);

        let jitter = rand::thread_rng().gen_range(-JITTER_PERCENT..=JITTER_PERCENT);
        let jittered_ms = (capped.as_millis() as i64).saturating_mul(100 + jitter) / 100;
        Instant::now() + Duration::from_millis(jittered_ms.max(1) as u64)
    }
}
