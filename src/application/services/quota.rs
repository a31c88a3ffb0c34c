use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{errors::QuotaError, repositories::QuotaStore};

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Admissions allowed per tenant per window unless overridden.
    pub default_limit: u32,
    /// Fixed window width; windows are epoch-aligned.
    pub window: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_limit: 1_000,
            window: Duration::hours(24),
        }
    }
}

/// Admission gate in front of the pipeline. Quota is consumed at admission
/// time, not on confirmed send, so a message that ultimately fails still
/// counts against its tenant's window.
pub struct QuotaGate {
    store: Arc<dyn QuotaStore>,
    config: QuotaConfig,
    overrides: RwLock<HashMap<Uuid, u32>>,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn QuotaStore>, config: QuotaConfig) -> Self {
        Self {
            store,
            config,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_limit(&self, tenant_id: Uuid, limit: u32) {
        self.overrides.write().await.insert(tenant_id, limit);
    }

    /// Atomically checks and increments the tenant's counter for the
    /// current window. `Ok(false)` means the tenant is at its limit and
    /// nothing was incremented. A store failure is reported as
    /// `Unavailable`; callers must treat that as admission failure (fail
    /// closed) rather than letting traffic through during an outage.
    pub async fn try_admit(&self, tenant_id: Uuid) -> Result<bool, QuotaError> {
        let limit = self.limit_for(tenant_id).await;
        let window_start = self.window_start(Utc::now());
        self.store
            .try_increment(tenant_id, window_start, limit)
            .await
            .map_err(QuotaError::Unavailable)
    }

    async fn limit_for(&self, tenant_id: Uuid) -> u32 {
        self.overrides
            .read()
            .await
            .get(&tenant_id)
            .copied()
            .unwrap_or(self.config.default_limit)
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.config.window.num_seconds().max(1);
        let bucket = now.timestamp().div_euclid(width) * width;
        DateTime::from_timestamp(bucket, 0).unwrap_or(now)
    }
}
