use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, MessageClass};

/// Queue envelope. Carries a pointer to the persisted message, never the
/// payload itself; workers reload the record by id on dequeue so a stale
/// copy can never be delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub message_id: Uuid,
    pub class: MessageClass,
    pub enqueued_at: DateTime<Utc>,
    pub attempt: u32,
}

impl Job {
    pub fn for_message(message: &Message) -> Self {
        Self {
            message_id: message.id,
            class: message.class,
            enqueued_at: Utc::now(),
            attempt: 1,
        }
    }
}
