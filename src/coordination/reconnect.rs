//! Reconnect Supervisor
//!
//! Paces reconnects to the venue with the backoff schedule and stops them
//! altogether while the circuit breaker is open. Connection results are
//! reported to the breaker and surfaced as bot-event notifications.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backoff::BackoffSequencer;
use super::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::error::Result;
use crate::supervisor::{BotEvent, NotificationDispatcher, NotificationMessage};

/// Connection to the trading venue; the wire protocol lives behind it
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueConnector: Send + Sync {
    async fn connect(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Breaker open; no attempt made
    Refused { retry_in_secs: u64 },
    Connected { attempt: usize },
    Failed { attempt: usize, error: String },
}

impl ReconnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ReconnectOutcome::Connected { .. })
    }
}

pub struct ReconnectSupervisor {
    breaker: Arc<CircuitBreaker>,
    backoff: BackoffSequencer,
    /// Failed attempts since the last success; indexes the backoff schedule
    attempt: AtomicUsize,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ReconnectSupervisor {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        backoff: BackoffSequencer,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            breaker,
            backoff,
            attempt: AtomicUsize::new(0),
            dispatcher,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn failed_attempts(&self) -> usize {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Wait applied before the next attempt
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay_for(self.failed_attempts())
    }

    pub async fn allow_attempt(&self) -> bool {
        self.breaker.allow_attempt().await
    }

    /// Report a healthy connection. Resets the backoff index.
    pub async fn record_connection_success(&self) {
        let previous = self.attempt.swap(0, Ordering::SeqCst);
        self.breaker.record_success().await;

        if previous > 0 {
            info!("Venue connection restored after {} failed attempt(s)", previous);
            self.dispatcher.enqueue(NotificationMessage::bot_event(
                BotEvent::Reconnected,
                &format!("connection restored after {previous} failed attempt(s)"),
                Decimal::ZERO,
            ));
        }
    }

    /// Report a lost connection or a failed attempt
    pub async fn record_connection_failure(&self, reason: &str) {
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        self.breaker.record_failure().await;

        warn!("Venue connection failure #{}: {}", attempt, reason);
        self.dispatcher.enqueue(NotificationMessage::bot_event(
            BotEvent::Disconnected,
            &format!("attempt {attempt} failed: {reason}"),
            Decimal::ZERO,
        ));
    }

    /// One gated, paced reconnect attempt
    pub async fn attempt_reconnect(&self, connector: &dyn VenueConnector) -> ReconnectOutcome {
        if !self.breaker.allow_attempt().await {
            let retry_in_secs = self.breaker.time_until_recovery().await;
            debug!("Reconnect refused: circuit open, retry in {}s", retry_in_secs);
            return ReconnectOutcome::Refused { retry_in_secs };
        }

        let index = self.failed_attempts();
        let delay = self.backoff.delay_for(index);
        let attempt = index + 1;
        info!("Reconnect attempt {} in {:?}", attempt, delay);
        tokio::time::sleep(delay).await;

        match connector.connect().await {
            Ok(()) => {
                self.record_connection_success().await;
                ReconnectOutcome::Connected { attempt }
            }
            Err(e) => {
                let error = e.to_string();
                self.record_connection_failure(&error).await;
                ReconnectOutcome::Failed { attempt, error }
            }
        }
    }

    /// Keep attempting until connected, waiting out open-circuit periods.
    /// Gives up after `max_attempts` real attempts when set.
    pub async fn reconnect_until_connected(
        &self,
        connector: &dyn VenueConnector,
        max_attempts: Option<usize>,
    ) -> ReconnectOutcome {
        let mut made = 0usize;
        loop {
            let outcome = self.attempt_reconnect(connector).await;
            match &outcome {
                ReconnectOutcome::Connected { .. } => return outcome,
                ReconnectOutcome::Refused { retry_in_secs } => {
                    if self.breaker.state().await == CircuitState::HalfOpen {
                        // Trial already spent; wait for another health report
                        tokio::time::sleep(self.backoff.max_delay()).await;
                    } else {
                        tokio::time::sleep(Duration::from_secs((*retry_in_secs).max(1))).await;
                    }
                }
                ReconnectOutcome::Failed { .. } => {
                    made += 1;
                    if max_attempts.is_some_and(|max| made >= max) {
                        warn!("Giving up reconnect after {} attempt(s)", made);
                        return outcome;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerConfig, NotificationConfig};
    use crate::error::BulwarkError;
    use crate::adapters::LogTransport;
    use crate::supervisor::{NotificationLevel, NotificationKind};

    fn supervisor(schedule_secs: Vec<u64>) -> (ReconnectSupervisor, Arc<NotificationDispatcher>) {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            NotificationConfig {
                level: NotificationLevel::All,
                ..Default::default()
            },
            Some(Arc::new(LogTransport)),
        ));
        let backoff = BackoffSequencer::new(schedule_secs.into_iter().map(Duration::from_secs).collect());
        let supervisor = ReconnectSupervisor::new(
            Arc::new(CircuitBreaker::new(BreakerConfig::default())),
            backoff,
            dispatcher.clone(),
        );
        (supervisor, dispatcher)
    }

    #[tokio::test]
    async fn test_failure_then_success_resets_backoff() {
        let (supervisor, dispatcher) = supervisor(vec![0]);
        let mut connector = MockVenueConnector::new();
        let mut seq = mockall::Sequence::new();
        connector
            .expect_connect()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Err(BulwarkError::Connection("refused".to_string())));
        connector
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        assert!(matches!(
            supervisor.attempt_reconnect(&connector).await,
            ReconnectOutcome::Failed { attempt: 1, .. }
        ));
        assert!(matches!(
            supervisor.attempt_reconnect(&connector).await,
            ReconnectOutcome::Failed { attempt: 2, .. }
        ));
        assert_eq!(
            supervisor.attempt_reconnect(&connector).await,
            ReconnectOutcome::Connected { attempt: 3 }
        );
        assert_eq!(supervisor.failed_attempts(), 0);

        let kinds: Vec<_> = dispatcher.pending().iter().map(|m| m.title.clone()).collect();
        assert_eq!(kinds, vec!["BOT DISCONNECTED", "BOT DISCONNECTED", "BOT RECONNECTED"]);
        assert!(dispatcher.pending().iter().all(|m| m.kind == NotificationKind::BotEvent));
    }

    #[tokio::test]
    async fn test_open_circuit_refuses_without_connecting() {
        let (supervisor, _dispatcher) = supervisor(vec![0]);
        let mut connector = MockVenueConnector::new();
        connector
            .expect_connect()
            .times(5)
            .returning(|| Err(BulwarkError::Connection("timeout".to_string())));

        for _ in 0..5 {
            supervisor.attempt_reconnect(&connector).await;
        }

        match supervisor.attempt_reconnect(&connector).await {
            ReconnectOutcome::Refused { retry_in_secs } => {
                assert!(retry_in_secs > 0 && retry_in_secs <= 120)
            }
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_paces_attempts() {
        let (supervisor, _dispatcher) = supervisor(vec![5, 10, 30]);
        let mut connector = MockVenueConnector::new();
        connector
            .expect_connect()
            .returning(|| Err(BulwarkError::Connection("down".to_string())));

        let started = tokio::time::Instant::now();
        supervisor.attempt_reconnect(&connector).await;
        supervisor.attempt_reconnect(&connector).await;
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert_eq!(supervisor.next_delay(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (supervisor, _dispatcher) = supervisor(vec![0]);
        let mut connector = MockVenueConnector::new();
        connector
            .expect_connect()
            .times(3)
            .returning(|| Err(BulwarkError::Connection("down".to_string())));

        let outcome = supervisor.reconnect_until_connected(&connector, Some(3)).await;
        assert!(matches!(outcome, ReconnectOutcome::Failed { attempt: 3, .. }));
    }
}
