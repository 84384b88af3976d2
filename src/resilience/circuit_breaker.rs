//! Circuit breaker for warehouse protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency presumed down, calls fail fast
//! - Half-Open: a bounded number of probe calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: timeout elapsed since last failure (checked lazily on state read)
//! Half-Open → Closed: consecutive probe successes >= success_threshold
//! Half-Open → Open: any probe failure
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, looked up through the registry
//! - The lock guards bookkeeping only; the wrapped operation runs unlocked
//! - Every admission remembers the generation it was admitted in; outcomes
//!   that arrive after a transition do not drive further transitions
//! - A call dropped before completing counts as a failure
//! - The wrapped operation's error is always handed back to the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge value (0=Closed, 1=Open, 2=HalfOpen).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker thresholds. Immutable once the breaker is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip a closed breaker.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before probing.
    pub timeout_secs: u64,

    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,

    /// Probe calls admitted concurrently while half-open.
    pub half_open_max_probes: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_secs: 60,
            success_threshold: 2,
            half_open_max_probes: 1,
        }
    }
}

/// Rejection raised when a call is not attempted because the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{breaker}' is open, service unavailable")]
pub struct CircuitOpenError {
    /// Name of the rejecting breaker.
    pub breaker: String,
}

/// Outcome of a guarded call that did not succeed.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The operation was not attempted.
    #[error(transparent)]
    Open(CircuitOpenError),

    /// The operation ran and failed with its own error.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open(_))
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open(_) => None,
        }
    }
}

/// Point-in-time view of a breaker, for health and metrics endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_secs: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub times_opened: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_wall: Option<DateTime<Utc>>,
    /// Bumped on every state change and on reset.
    generation: u64,
    /// Generation that began with the most recent reset.
    reset_generation: u64,
    probes_in_flight: u32,
    times_opened: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_wall: None,
            generation: 0,
            reset_generation: 0,
            probes_in_flight: 0,
            times_opened: 0,
            rejected_calls: 0,
        }
    }
}

/// Ticket for one admitted call.
#[derive(Debug, Clone, Copy)]
struct Permit {
    generation: u64,
    probe: bool,
}

/// A named circuit breaker guarding one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker driven by the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a breaker driven by the given clock.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            timeout_secs = config.timeout_secs,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );
        metrics::record_circuit_state(&name, CircuitState::Closed);

        Self {
            name,
            config,
            clock,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Moves an expired Open breaker to HalfOpen.
    pub fn state(&self) -> CircuitState {
        let mut s = self.lock();
        self.check_timeout(&mut s);
        s.state
    }

    /// Run an async operation through the breaker.
    ///
    /// # Errors
    /// [`CircuitBreakerError::Open`] if the call was rejected without running,
    /// [`CircuitBreakerError::Inner`] with the operation's own error otherwise.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit().map_err(CircuitBreakerError::Open)?;
        let guard = OutcomeGuard::new(self, permit);

        let result = operation().await;
        guard.complete(result.is_ok());
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Run a synchronous operation through the breaker.
    ///
    /// # Errors
    /// Same as [`CircuitBreaker::call`].
    pub fn call_blocking<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.admit().map_err(CircuitBreakerError::Open)?;
        let guard = OutcomeGuard::new(self, permit);

        let result = operation();
        guard.complete(result.is_ok());
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Force the breaker back to Closed with cleared counters.
    pub fn reset(&self) {
        let mut s = self.lock();
        let from = s.state;
        s.state = CircuitState::Closed;
        s.failure_count = 0;
        s.success_count = 0;
        s.last_failure = None;
        s.last_failure_wall = None;
        s.probes_in_flight = 0;
        s.generation += 1;
        s.reset_generation = s.generation;
        drop(s);

        metrics::record_circuit_state(&self.name, CircuitState::Closed);
        tracing::info!(breaker = %self.name, from = %from, "Circuit breaker manually reset");
    }

    /// Snapshot of the breaker. Does not apply the timeout transition.
    pub fn stats(&self) -> CircuitBreakerStats {
        let s = self.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: s.state,
            failure_count: s.failure_count,
            success_count: s.success_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            timeout_secs: self.config.timeout_secs,
            last_failure_time: s.last_failure_wall,
            times_opened: s.times_opened,
            rejected_calls: s.rejected_calls,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Bookkeeping never panics mid-update, so a poisoned lock still holds consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_timeout(&self, s: &mut BreakerState) {
        if s.state != CircuitState::Open {
            return;
        }
        let Some(last_failure) = s.last_failure else {
            return;
        };
        if self.clock.now().saturating_duration_since(last_failure) >= self.config.timeout() {
            self.transition(s, CircuitState::HalfOpen);
            tracing::info!(breaker = %self.name, "Circuit breaker entering half-open state");
        }
    }

    fn transition(&self, s: &mut BreakerState, to: CircuitState) {
        let from = s.state;
        s.state = to;
        s.generation += 1;
        s.success_count = 0;
        s.probes_in_flight = 0;
        match to {
            CircuitState::Closed => s.failure_count = 0,
            CircuitState::Open => s.times_opened += 1,
            CircuitState::HalfOpen => {}
        }

        metrics::record_circuit_transition(&self.name, to);
        tracing::debug!(breaker = %self.name, from = %from, to = %to, "Circuit state changed");
    }

    fn admit(&self) -> Result<Permit, CircuitOpenError> {
        let mut s = self.lock();
        self.check_timeout(&mut s);

        let state = s.state;
        match state {
            CircuitState::Closed => Ok(Permit {
                generation: s.generation,
                probe: false,
            }),
            CircuitState::HalfOpen if s.probes_in_flight < self.config.half_open_max_probes => {
                s.probes_in_flight += 1;
                Ok(Permit {
                    generation: s.generation,
                    probe: true,
                })
            }
            _ => {
                s.rejected_calls += 1;
                drop(s);

                metrics::record_circuit_rejection(&self.name);
                tracing::warn!(breaker = %self.name, state = %state, "Circuit breaker rejecting call");
                Err(CircuitOpenError {
                    breaker: self.name.clone(),
                })
            }
        }
    }

    /// Release the probe slot and report whether the outcome is still current.
    fn settle(&self, s: &mut BreakerState, permit: Permit) -> bool {
        if permit.generation != s.generation {
            tracing::debug!(
                breaker = %self.name,
                admitted_generation = permit.generation,
                current_generation = s.generation,
                "Ignoring outcome admitted before the last state change"
            );
            return false;
        }
        if permit.probe {
            s.probes_in_flight = s.probes_in_flight.saturating_sub(1);
        }
        true
    }

    fn on_success(&self, permit: Permit) {
        let mut s = self.lock();
        if !self.settle(&mut s, permit) {
            return;
        }

        let state = s.state;
        match state {
            CircuitState::Closed => s.failure_count = 0,
            CircuitState::HalfOpen => {
                s.failure_count = 0;
                s.success_count += 1;
                tracing::debug!(
                    breaker = %self.name,
                    successes = s.success_count,
                    threshold = self.config.success_threshold,
                    "Circuit breaker probe succeeded"
                );
                if s.success_count >= self.config.success_threshold {
                    self.transition(&mut s, CircuitState::Closed);
                    tracing::info!(breaker = %self.name, "Circuit breaker closed, service recovered");
                }
            }
            // Open admits nothing, so a current-generation outcome cannot land here.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, permit: Permit) {
        let mut s = self.lock();
        if !self.settle(&mut s, permit) {
            // A late failure still dates the latest failure in stats, unless a
            // reset has cleared the history since it was admitted. Timeout
            // gating keeps counting from the failure that opened the breaker.
            if permit.generation >= s.reset_generation {
                s.last_failure_wall = Some(self.clock.wall());
            }
            return;
        }

        let state = s.state;
        match state {
            CircuitState::Closed => {
                self.mark_failure(&mut s);
                tracing::warn!(
                    breaker = %self.name,
                    failures = s.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker recorded failure"
                );
                if s.failure_count >= self.config.failure_threshold {
                    self.transition(&mut s, CircuitState::Open);
                    tracing::error!(
                        breaker = %self.name,
                        failures = s.failure_count,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.mark_failure(&mut s);
                self.transition(&mut s, CircuitState::Open);
                tracing::error!(breaker = %self.name, "Circuit breaker reopened during recovery probe");
            }
            CircuitState::Open => {}
        }
    }

    fn mark_failure(&self, s: &mut BreakerState) {
        s.failure_count += 1;
        s.last_failure = Some(self.clock.now());
        s.last_failure_wall = Some(self.clock.wall());
    }
}

/// Records the outcome of an admitted call exactly once.
///
/// Dropping it without `complete` (a cancelled future or a panicking
/// operation) records a failure.
struct OutcomeGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Option<Permit>,
}

impl<'a> OutcomeGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, permit: Permit) -> Self {
        Self {
            breaker,
            permit: Some(permit),
        }
    }

    fn complete(mut self, ok: bool) {
        if let Some(permit) = self.permit.take() {
            if ok {
                self.breaker.on_success(permit);
            } else {
                self.breaker.on_failure(permit);
            }
        }
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            tracing::warn!(
                breaker = %self.breaker.name,
                "Guarded call abandoned before completion, counting it as a failure"
            );
            self.breaker.on_failure(permit);
        }
    }
}
