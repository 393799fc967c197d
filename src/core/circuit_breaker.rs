//! Circuit breaker guarding calls to the external workload service.
//!
//! Three-state model:
//! - Closed -> Open: `failure_threshold` consecutive failures
//! - Open -> HalfOpen: first request after `cooldown` has elapsed since opening
//! - HalfOpen -> Closed: a probe succeeds
//! - HalfOpen -> Open: a trial call fails or is abandoned (cooldown restarts)
//!
//! Every admitted call holds a [`CallPermit`]; only a half-open trial permit
//! can close the breaker.
//!
//! The breaker is shared between request tasks through an `Arc`; all state sits
//! behind one mutex that is never held across an await point.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    #[default]
    Closed,
    /// Tripped, calls are short-circuited to the fallback.
    Open,
    /// Testing recovery with a limited number of probe calls.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time spent Open before a probe is allowed.
    pub cooldown: Duration,
    /// Probe calls admitted while HalfOpen.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls;
        self
    }
}

/// Point-in-time view of a breaker, as exposed on the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    pub half_open_max_calls: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Calls short-circuited since the last reset.
    pub rejected_calls: u64,
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
    half_open_in_flight: u32,
    // Bumped on every state change; permits from an older generation are stale
    generation: u64,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    rejected_calls: u64,
}

/// Admission to call the protected dependency.
///
/// Resolve it with [`CallPermit::success`] or [`CallPermit::failure`]. A trial
/// permit dropped unresolved (the call was cancelled or timed out) counts as a
/// failed trial, so the breaker reopens and the cooldown restarts. Outcomes
/// from a permit issued before the breaker last changed state are ignored.
#[must_use = "an unresolved half-open permit reopens the circuit when dropped"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    generation: u64,
    resolved: bool,
}

impl CallPermit<'_> {
    /// Whether this permit was admitted as a half-open trial call
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial, self.generation);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.trial, self.generation);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            self.breaker.on_abandoned_trial(self.generation);
        }
    }
}

impl fmt::Debug for CallPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name)
            .field("trial", &self.trial)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Thread-safe circuit breaker with an injected clock.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker driven by the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a breaker driven by the given clock.
    pub fn with_clock(
        name: impl Into<String>,
        mut config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        config.half_open_max_calls = config.half_open_max_calls.max(1);
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a call may go to the protected dependency.
    ///
    /// Returns `None` when the call must be short-circuited. An Open breaker
    /// whose cooldown has elapsed moves to HalfOpen and admits the caller as a
    /// probe.
    pub fn allow_request(&self) -> Option<CallPermit<'_>> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened) >= self.config.cooldown)
                    .unwrap_or(true);

                if !cooled_down {
                    inner.rejected_calls += 1;
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.generation += 1;
                inner.half_open_in_flight = 1;
                info!(breaker = %self.name, "Circuit breaker transitioning from Open to HalfOpen");
                true
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight >= self.config.half_open_max_calls {
                    inner.rejected_calls += 1;
                    return None;
                }
                inner.half_open_in_flight += 1;
                debug!(breaker = %self.name, "Circuit half-open, admitting probe");
                true
            }
        };

        Some(CallPermit {
            breaker: self,
            trial,
            generation: inner.generation,
            resolved: false,
        })
    }

    fn on_success(&self, trial: bool, generation: u64) {
        let mut inner = self.lock();
        inner.last_success_at = Some(Utc::now());

        if inner.generation != generation {
            debug!(breaker = %self.name, state = %inner.state, "Ignoring success from a stale permit");
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if trial => {
                Self::close(&mut inner);
                info!(breaker = %self.name, "Circuit breaker closed after successful probe");
            }
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool, generation: u64) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.last_failure_at = Some(Utc::now());

        if inner.generation != generation {
            debug!(breaker = %self.name, state = %inner.state, "Ignoring failure from a stale permit");
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    Self::open(&mut inner, now);
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker OPEN after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen if trial => {
                Self::open(&mut inner, now);
                warn!(breaker = %self.name, "Circuit breaker probe failed, returning to Open");
            }
            _ => {}
        }
    }

    fn on_abandoned_trial(&self, generation: u64) {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            Self::open(&mut inner, now);
            warn!(breaker = %self.name, "Circuit breaker half-open call abandoned, returning to Open");
        }
    }

    /// Current state. An Open breaker only reports HalfOpen once a request
    /// has been admitted after the cooldown.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Administrative reset back to Closed. Permits issued before the reset
    /// no longer affect the breaker.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let generation = inner.generation + 1;
        *inner = BreakerState {
            generation,
            ..BreakerState::default()
        };
        info!(breaker = %self.name, "Circuit breaker reset to Closed");
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let inner = self.lock();
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            cooldown_secs: self.config.cooldown.as_secs(),
            half_open_max_calls: self.config.half_open_max_calls,
            opened_at: inner.opened_at_wall,
            last_failure_at: inner.last_failure_at,
            last_success_at: inner.last_success_at,
            rejected_calls: inner.rejected_calls,
        }
    }

    fn open(inner: &mut BreakerState, now: Instant) {
        inner.state = CircuitState::Open;
        inner.generation += 1;
        inner.opened_at = Some(now);
        inner.opened_at_wall = Some(Utc::now());
        inner.half_open_in_flight = 0;
    }

    fn close(inner: &mut BreakerState) {
        inner.state = CircuitState::Closed;
        inner.generation += 1;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.opened_at_wall = None;
        inner.half_open_in_flight = 0;
    }
}
