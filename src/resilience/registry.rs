//! Registry of named circuit breakers.
//!
//! Built once at startup and handed to every component that owns or reports
//! on a breaker. Lookups and registrations for different names do not
//! contend with each other.

use dashmap::DashMap;
use std::sync::Arc;

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use crate::resilience::clock::{Clock, SystemClock};

/// Process-wide collection of breakers keyed by dependency name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Registry whose lazily created breakers share the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            clock,
        }
    }

    /// Register a breaker under its own name, replacing any previous one.
    pub fn register(&self, breaker: Arc<CircuitBreaker>) {
        let name = breaker.name().to_string();
        if self.breakers.insert(name.clone(), breaker).is_some() {
            tracing::warn!(breaker = %name, "Replaced existing circuit breaker registration");
        } else {
            tracing::debug!(breaker = %name, "Registered circuit breaker");
        }
    }

    /// Look up a breaker by name.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Return the breaker for `name`, creating it with `config` on first use.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_clock(name, config, self.clock.clone()))
            })
            .value()
            .clone()
    }

    /// Reset a breaker by name. Returns false if no such breaker exists.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Snapshot every registered breaker, ordered by name.
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        // Collect handles first so no shard lock is held while locking breakers.
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|entry| entry.value().clone()).collect();

        let mut stats: Vec<CircuitBreakerStats> = breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
