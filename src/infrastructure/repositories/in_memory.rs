use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{Message, MessageStatus, TenantQuota},
    repositories::{MessageStore, QuotaStore},
};

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<Uuid, Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, message: &Message) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages.get(&id).cloned())
    }

    async fn mark_sent(&self, id: Uuid, provider_ref: &str) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if let Some(entry) = messages.get_mut(&id) {
            if entry.status.is_terminal() {
                return Ok(());
            }
            entry.status = MessageStatus::Sent;
            entry.provider_ref = Some(provider_ref.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        if let Some(entry) = messages.get_mut(&id) {
            if entry.status.is_terminal() {
                return Ok(());
            }
            entry.status = MessageStatus::Failed {
                reason: reason.to_string(),
            };
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn increment_attempt(&self, id: Uuid) -> anyhow::Result<u32> {
        let mut messages = self.messages.write().await;
        let entry = messages
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("message {id} not found"))?;
        entry.attempts += 1;
        entry.updated_at = Utc::now();
        Ok(entry.attempts)
    }
}

#[derive(Default)]
pub struct InMemoryQuotaStore {
    counters: Arc<RwLock<HashMap<(Uuid, DateTime<Utc>), TenantQuota>>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn try_increment(
        &self,
        tenant_id: Uuid,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<bool> {
        let mut counters = self.counters.write().await;

        // Elapsed windows for this tenant are dead weight.
        counters.retain(|(tenant, window), _| *tenant != tenant_id || *window >= window_start);

        let quota = counters
            .entry((tenant_id, window_start))
            .or_insert_with(|| TenantQuota {
                tenant_id,
                window_start,
                count: 0,
                limit,
            });
        quota.limit = limit;
        if quota.count >= quota.limit {
            return Ok(false);
        }
        quota.count += 1;
        Ok(true)
    }
}
