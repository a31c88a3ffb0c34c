use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::Message;

/// Durable record of every message and its lifecycle state. The store is
/// the single owner of `status` and `attempts`; terminal mutations must be
/// idempotent so duplicate deliveries of the same job resolve harmlessly.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: &Message) -> anyhow::Result<()>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>>;

    /// No-op when the record is already terminal; the first outcome wins.
    async fn mark_sent(&self, id: Uuid, provider_ref: &str) -> anyhow::Result<()>;

    /// No-op when the record is already terminal; the first outcome wins.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()>;

    /// Returns the attempt count after the increment.
    async fn increment_attempt(&self, id: Uuid) -> anyhow::Result<u32>;
}

/// Backing counter for the quota gate. `try_increment` must be a single
/// atomic check-and-increment: it returns `false` with no partial increment
/// when the tenant is at or above `limit` for the window.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn try_increment(
        &self,
        tenant_id: Uuid,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<bool>;
}
