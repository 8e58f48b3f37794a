//! Reconnection Circuit Breaker
//!
//! Implements the circuit breaker pattern for venue reconnection so a dead
//! remote is not stormed with attempts. Every counter and the state live
//! behind one mutex, so concurrent success/failure reports serialize.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - reconnects attempted freely
    Closed,
    /// Failure threshold exceeded - reconnects refused until cool-down elapses
    Open,
    /// Cool-down elapsed - a single trial reconnect is permitted
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<DateTime<Utc>>,
    trial_granted: bool,
    trial_granted_at: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    total_trips: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            trial_granted: false,
            trial_granted_at: None,
            last_success: None,
            last_failure: None,
            total_trips: 0,
        }
    }
}

/// Circuit breaker guarding reconnection attempts
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(BreakerConfig::default())
    }

    /// Get current state, applying the Open -> HalfOpen cool-down
    pub async fn state(&self) -> CircuitState {
        self.state_at(Utc::now()).await
    }

    pub async fn state_at(&self, now: DateTime<Utc>) -> CircuitState {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, now);
        inner.state
    }

    /// Whether a reconnect may be attempted now
    pub async fn allow_attempt(&self) -> bool {
        self.allow_attempt_at(Utc::now()).await
    }

    pub async fn allow_attempt_at(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, now);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.trial_granted {
                    debug!("Half-open trial already granted, refusing attempt");
                    false
                } else {
                    inner.trial_granted = true;
                    inner.trial_granted_at = Some(now);
                    true
                }
            }
        }
    }

    /// Record a successful connection
    pub async fn record_success(&self) {
        self.record_success_at(Utc::now()).await
    }

    pub async fn record_success_at(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, now);

        inner.consecutive_failures = 0;
        inner.last_success = Some(now);

        match inner.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    inner.trial_granted = false;
                    inner.trial_granted_at = None;
                    info!("Circuit breaker CLOSED - reconnects resumed");
                }
            }
            CircuitState::Open => {
                // A success reported by another path while still cooling down
                debug!("Success recorded while circuit open; waiting for cool-down");
            }
        }
    }

    /// Record a failed connection
    pub async fn record_failure(&self) {
        self.record_failure_at(Utc::now()).await
    }

    pub async fn record_failure_at(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, now);

        inner.consecutive_failures += 1;
        inner.consecutive_successes = 0;
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let failures = inner.consecutive_failures;
                    self.trip(&mut inner, now);
                    warn!(
                        "Circuit breaker TRIPPED: {} consecutive failures ({}s cool-down)",
                        failures, self.config.cooldown_secs
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.trip(&mut inner, now);
                warn!(
                    "Circuit breaker trial failed, re-opening ({}s cool-down)",
                    self.config.cooldown_secs
                );
            }
            CircuitState::Open => {
                debug!("Failure #{} recorded while circuit open", inner.consecutive_failures);
            }
        }
    }

    /// Seconds until a trial reconnect is permitted (0 unless Open)
    pub async fn time_until_recovery_at(&self, now: DateTime<Utc>) -> u64 {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, now);
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let elapsed = now.signed_duration_since(opened_at).num_seconds().max(0) as u64;
                self.config.cooldown_secs.saturating_sub(elapsed)
            }
            _ => 0,
        }
    }

    pub async fn time_until_recovery(&self) -> u64 {
        self.time_until_recovery_at(Utc::now()).await
    }

    /// Get circuit breaker statistics
    pub async fn get_stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner, Utc::now());
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            opened_at: inner.opened_at,
            last_success: inner.last_success,
            last_failure: inner.last_failure,
            total_trips: inner.total_trips,
        }
    }

    fn trip(&self, inner: &mut BreakerState, now: DateTime<Utc>) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.trial_granted = false;
        inner.trial_granted_at = None;
        inner.total_trips += 1;
    }

    fn refresh(&self, inner: &mut BreakerState, now: DateTime<Utc>) {
        let cooldown = self.config.cooldown_secs as i64;
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                if let Some(opened_at) = inner.opened_at {
                    let elapsed = now.signed_duration_since(opened_at).num_seconds();
                    if elapsed >= cooldown {
                        inner.state = CircuitState::HalfOpen;
                        inner.trial_granted = false;
                        inner.trial_granted_at = None;
                        inner.consecutive_successes = 0;
                        info!("Circuit breaker transitioning to HALF-OPEN after {}s", elapsed);
                    }
                }
            }
            CircuitState::HalfOpen => {
                // An unreported trial expires after one cool-down window
                if let (true, Some(granted_at)) = (inner.trial_granted, inner.trial_granted_at) {
                    let elapsed = now.signed_duration_since(granted_at).num_seconds();
                    if elapsed >= cooldown {
                        inner.trial_granted = false;
                        inner.trial_granted_at = None;
                        warn!(
                            "Half-open trial unreported for {}s, granting a new trial",
                            elapsed
                        );
                    }
                }
            }
        }
    }
}

/// Statistics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub total_trips: u64,
}
