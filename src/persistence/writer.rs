//! Background writer for emergency records.
//!
//! Writes run on one task in submission order, off the caller's path. A
//! failed write is kept and re-submitted by [`EmergencyWriter::retry_pending`];
//! any later successful write supersedes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::emergency_store::{EmergencyRecord, EmergencyStore};

#[derive(Default)]
struct WriterState {
    failed: Mutex<Option<EmergencyRecord>>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl WriterState {
    fn failed(&self) -> std::sync::MutexGuard<'_, Option<EmergencyRecord>> {
        self.failed.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub struct EmergencyWriter {
    tx: mpsc::UnboundedSender<EmergencyRecord>,
    state: Arc<WriterState>,
}

impl EmergencyWriter {
    /// Spawn the writer task on the current runtime
    pub fn spawn(store: Arc<dyn EmergencyStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EmergencyRecord>();
        let state = Arc::new(WriterState::default());
        let worker_state = state.clone();

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match store.save(&record).await {
                    Ok(()) => {
                        *worker_state.failed() = None;
                        worker_state.written.fetch_add(1, Ordering::SeqCst);
                        info!(
                            "Emergency state persisted (level={}, confidence={:.2}, strategies={})",
                            record.risk_level,
                            record.params.min_confidence_threshold,
                            record.params.min_strategies_for_signal
                        );
                    }
                    Err(e) => {
                        error!("Failed to persist emergency state: {} (will retry on next transition)", e);
                        *worker_state.failed() = Some(record);
                        worker_state.failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            debug!("Emergency writer stopped");
        });

        Self { tx, state }
    }

    pub fn submit(&self, record: EmergencyRecord) {
        if self.tx.send(record).is_err() {
            warn!("Emergency writer is gone; record not persisted");
        }
    }

    /// Re-submit the last failed record, if any. Returns whether one was queued.
    pub fn retry_pending(&self) -> bool {
        let pending = self.state.failed().take();
        match pending {
            Some(record) => {
                info!("Retrying emergency state persistence");
                self.submit(record);
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.state.failed().is_some()
    }

    pub fn written(&self) -> u64 {
        self.state.written.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.state.failures.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegulationParams, RiskLevel};
    use crate::error::{BulwarkError, Result};
    use crate::persistence::MemoryEmergencyStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Fails until `healthy` is set
    struct FlakyStore {
        healthy: AtomicBool,
        inner: MemoryEmergencyStore,
    }

    #[async_trait]
    impl EmergencyStore for FlakyStore {
        async fn save(&self, record: &EmergencyRecord) -> Result<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(BulwarkError::Persistence("disk full".to_string()));
            }
            self.inner.save(record).await
        }

        async fn load(&self) -> Result<Option<EmergencyRecord>> {
            self.inner.load().await
        }
    }

    fn record() -> EmergencyRecord {
        EmergencyRecord::new(RiskLevel::Emergency, RegulationParams::new(0.7, 3), Utc::now())
    }

    async fn settle(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("writer did not settle");
    }

    #[tokio::test]
    async fn test_writes_in_order() {
        let store = Arc::new(MemoryEmergencyStore::new());
        let writer = EmergencyWriter::spawn(store.clone());

        writer.submit(record());
        let mut cleared = record();
        cleared.risk_level = RiskLevel::Normal;
        writer.submit(cleared);

        settle(|| writer.written() == 2).await;
        let writes = store.writes();
        assert_eq!(writes[0].risk_level, RiskLevel::Emergency);
        assert_eq!(writes[1].risk_level, RiskLevel::Normal);
    }

    #[tokio::test]
    async fn test_failed_write_kept_for_retry() {
        let store = Arc::new(FlakyStore {
            healthy: AtomicBool::new(false),
            inner: MemoryEmergencyStore::new(),
        });
        let writer = EmergencyWriter::spawn(store.clone());

        writer.submit(record());
        settle(|| writer.failures() == 1).await;
        assert!(writer.has_pending());

        store.healthy.store(true, Ordering::SeqCst);
        assert!(writer.retry_pending());
        settle(|| writer.written() == 1).await;
        assert!(!writer.has_pending());
        assert!(!writer.retry_pending());
        assert_eq!(store.inner.writes().len(), 1);
    }
}
