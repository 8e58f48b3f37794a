//! Resilience Core
//!
//! The single object the trading engine holds. Created once at process
//! start and torn down at shutdown; there is no global instance.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{NotificationTransport, TelegramNotifier};
use crate::config::{AppConfig, TelegramCredentials};
use crate::coordination::{
    BackoffSequencer, CircuitBreaker, CircuitBreakerStats, ReconnectOutcome, ReconnectSupervisor,
    VenueConnector,
};
use crate::domain::{RegulationParams, RiskLevel, TradeOutcome};
use crate::error::{BulwarkError, Result};
use crate::persistence::{EmergencyStore, FileEmergencyStore};
use crate::regulation::{BucketSummary, PerformanceReport, Recommendation, Regulator, Transition};
use crate::supervisor::{
    BotEvent, DispatcherStats, EnqueueOutcome, NotificationDispatcher, NotificationMessage,
};

pub struct ResilienceCore {
    dispatcher: Arc<NotificationDispatcher>,
    regulator: Regulator,
    reconnect: ReconnectSupervisor,
}

impl ResilienceCore {
    /// Build from configuration with the production collaborators:
    /// Telegram (from the environment) and the emergency file on disk.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let credentials = TelegramCredentials::from_env();
        let transport = TelegramNotifier::from_credentials(&credentials)
            .map(|t| t as Arc<dyn NotificationTransport>);
        let store = Arc::new(FileEmergencyStore::new(&config.persistence.emergency_file));

        let mut config = config;
        if let Some(level) = credentials.level {
            config.notifications.level = level;
        }

        Self::with_parts(config, transport, store).await
    }

    /// Build with explicit collaborators. Refuses an invalid configuration.
    pub async fn with_parts(
        config: AppConfig,
        transport: Option<Arc<dyn NotificationTransport>>,
        store: Arc<dyn EmergencyStore>,
    ) -> Result<Self> {
        config.validate().map_err(BulwarkError::InvalidConfig)?;

        let dispatcher = Arc::new(NotificationDispatcher::new(
            config.notifications.clone(),
            transport,
        ));
        dispatcher.start();

        let regulator = Regulator::start(config.regulation.clone(), dispatcher.clone(), store).await;
        let reconnect = ReconnectSupervisor::new(
            Arc::new(CircuitBreaker::new(config.breaker.clone())),
            BackoffSequencer::from_config(&config.backoff),
            dispatcher.clone(),
        );

        info!("Resilience core started: {}", config.summary());
        dispatcher.enqueue(NotificationMessage::bot_event(
            BotEvent::Started,
            "resilience core online",
            Decimal::ZERO,
        ));

        Ok(Self {
            dispatcher,
            regulator,
            reconnect,
        })
    }

    pub async fn record_trade_outcome(&self, outcome: TradeOutcome) -> Option<Transition> {
        self.regulator.record_trade_outcome(outcome).await
    }

    pub async fn record_connection_failure(&self, reason: &str) {
        self.reconnect.record_connection_failure(reason).await
    }

    pub async fn record_connection_success(&self) {
        self.reconnect.record_connection_success().await
    }

    pub async fn allow_reconnect_attempt(&self) -> bool {
        self.reconnect.allow_attempt().await
    }

    /// One breaker-gated, backoff-paced reconnect
    pub async fn attempt_reconnect(&self, connector: &dyn VenueConnector) -> ReconnectOutcome {
        self.reconnect.attempt_reconnect(connector).await
    }

    pub async fn current_params(&self) -> RegulationParams {
        self.regulator.current_params().await
    }

    pub async fn risk_level(&self) -> RiskLevel {
        self.regulator.risk_level().await
    }

    pub async fn performance_report(&self) -> PerformanceReport {
        self.regulator.performance_report().await
    }

    pub async fn optimal_config_for_hour(&self, hour: u8) -> Recommendation {
        self.regulator.optimal_config_for_hour(hour).await
    }

    pub async fn optimal_config_for_asset(&self, asset: &str) -> Recommendation {
        self.regulator.optimal_config_for_asset(asset).await
    }

    pub async fn performance_by_hour(&self) -> Vec<BucketSummary<u8>> {
        self.regulator.performance_by_hour().await
    }

    pub async fn performance_by_asset(&self) -> Vec<BucketSummary<String>> {
        self.regulator.performance_by_asset().await
    }

    /// Hand any message to the dispatcher (trade opened/closed, summaries, ...)
    pub fn notify(&self, message: NotificationMessage) -> EnqueueOutcome {
        self.dispatcher.enqueue(message)
    }

    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    pub async fn breaker_stats(&self) -> CircuitBreakerStats {
        self.reconnect.breaker().get_stats().await
    }

    /// Announce the stop and flush notifications within the grace period
    pub async fn shutdown(&self) {
        self.dispatcher.enqueue(NotificationMessage::bot_event(
            BotEvent::Stopped,
            "resilience core shutting down",
            Decimal::ZERO,
        ));
        if self.regulator.persistence_pending() {
            warn!("Stopping with an emergency record that was never written");
        }
        self.dispatcher.shutdown().await;
        info!("Resilience core stopped ({:?})", self.dispatcher.stats());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LogTransport;
    use crate::persistence::MemoryEmergencyStore;

    #[tokio::test]
    async fn test_invalid_config_refuses_to_start() {
        let mut config = AppConfig::default();
        config.regulation.emergency_threshold = 2;

        let result =
            ResilienceCore::with_parts(config, None, Arc::new(MemoryEmergencyStore::new())).await;
        assert!(matches!(result, Err(BulwarkError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_defaults_and_shutdown() {
        let core = ResilienceCore::with_parts(
            AppConfig::default(),
            Some(Arc::new(LogTransport)),
            Arc::new(MemoryEmergencyStore::new()),
        )
        .await
        .unwrap();

        assert_eq!(core.current_params().await, RegulationParams::new(0.55, 2));
        assert!(core.allow_reconnect_attempt().await);
        core.shutdown().await;

        let stats = core.dispatcher_stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.delivered, 2);
    }
}
