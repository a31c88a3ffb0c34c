use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{models::MessageStatus, repositories::MessageStore};

/// Status-query boundary consumed by dashboards and the public API.
pub struct GetMessageUseCase {
    store: Arc<dyn MessageStore>,
}

#[derive(Debug, Clone)]
pub struct MessageView {
    pub id: Uuid,
    pub status: MessageStatus,
    pub attempts: u32,
    pub provider_ref: Option<String>,
}

impl GetMessageUseCase {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, message_id: Uuid) -> anyhow::Result<Option<MessageView>> {
        let message = self.store.get(message_id).await?;
        Ok(message.map(|m| MessageView {
            id: m.id,
            status: m.status,
            attempts: m.attempts,
            provider_ref: m.provider_ref,
        }))
    }
}
