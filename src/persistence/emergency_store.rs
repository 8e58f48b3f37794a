//! Emergency State Store
//!
//! One JSON record holding the risk level and regulation parameters in
//! force at the last Emergency entry:
//!
//! ```json
//! {
//!   "risk_level": "emergency",
//!   "params": { "min_confidence_threshold": 0.7, "min_strategies_for_signal": 3 },
//!   "emergency_at": "2026-03-01T14:22:05Z"
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{RegulationParams, RiskLevel};
use crate::error::{BulwarkError, Result};

/// Persisted emergency state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRecord {
    pub risk_level: RiskLevel,
    pub params: RegulationParams,
    pub emergency_at: DateTime<Utc>,
}

impl EmergencyRecord {
    pub fn new(risk_level: RiskLevel, params: RegulationParams, emergency_at: DateTime<Utc>) -> Self {
        Self {
            risk_level,
            params,
            emergency_at,
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.risk_level == RiskLevel::Emergency
    }
}

/// Durable storage for the emergency record
#[async_trait]
pub trait EmergencyStore: Send + Sync {
    /// Overwrite the stored record
    async fn save(&self, record: &EmergencyRecord) -> Result<()>;

    /// Read the stored record, `None` if nothing was ever written
    async fn load(&self) -> Result<Option<EmergencyRecord>>;
}

/// JSON file on local disk
#[derive(Debug, Clone)]
pub struct FileEmergencyStore {
    path: PathBuf,
}

impl FileEmergencyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EmergencyStore for FileEmergencyStore {
    async fn save(&self, record: &EmergencyRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    BulwarkError::Persistence(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(record)?;

        // Write beside the target then rename so a crash never leaves half a record
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| BulwarkError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            BulwarkError::Persistence(format!("rename to {}: {}", self.path.display(), e))
        })?;

        debug!("Emergency state persisted to {}", self.path.display());
        Ok(())
    }

    async fn load(&self) -> Result<Option<EmergencyRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No emergency state at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(BulwarkError::Persistence(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let record: EmergencyRecord = serde_json::from_slice(&bytes)?;
        info!(
            "Loaded emergency state from {} (level={}, at={})",
            self.path.display(),
            record.risk_level,
            record.emergency_at
        );
        Ok(Some(record))
    }
}

/// In-process store; keeps every write for inspection
#[derive(Debug, Default)]
pub struct MemoryEmergencyStore {
    writes: Mutex<Vec<EmergencyRecord>>,
}

impl MemoryEmergencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record, as if written by a previous run
    pub fn with_record(record: EmergencyRecord) -> Self {
        Self {
            writes: Mutex::new(vec![record]),
        }
    }

    pub fn writes(&self) -> Vec<EmergencyRecord> {
        self.writes.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl EmergencyStore for MemoryEmergencyStore {
    async fn save(&self, record: &EmergencyRecord) -> Result<()> {
        self.writes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<EmergencyRecord>> {
        Ok(self
            .writes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .last()
            .cloned())
    }
}
