//! Coordination Layer for venue connectivity
//!
//! - Circuit breaker gating reconnect attempts
//! - Escalating backoff schedule between attempts
//! - Reconnect supervisor composing the two

pub mod backoff;
pub mod circuit_breaker;
pub mod reconnect;

pub use backoff::BackoffSequencer;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use reconnect::{ReconnectOutcome, ReconnectSupervisor, VenueConnector};
