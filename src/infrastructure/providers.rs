use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::services::deliverer::{Deliverer, ProviderError},
    domain::models::{Message, MessageClass},
};

/// Stand-in transport that logs the message and fabricates a provider
/// reference. Lets the binary run end to end without provider credentials.
/// TODO: replace with the SMTP and SMS gateway clients once their
/// credentials land in the deploy environment.
pub struct LogDeliverer {
    class: MessageClass,
}

impl LogDeliverer {
    pub fn new(class: MessageClass) -> Self {
        Self { class }
    }
}

#[async_trait]
impl Deliverer for LogDeliverer {
    fn class(&self) -> MessageClass {
        self.class
    }

    async fn deliver(&self, message: &Message) -> Result<String, ProviderError> {
        info!(
            message_id = %message.id,
            class = self.class.as_str(),
            recipient = %message.recipient,
            "delivering message (log transport)"
        );
        Ok(format!("log-{}", Uuid::new_v4()))
    }
}
