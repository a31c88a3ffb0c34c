use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{Message, MessageClass};

/// Provider outcomes, tagged by whether the attempt may be repeated.
/// Timeouts and provider 5xx map to `Transient`; malformed recipients and
/// provider 4xx rejections map to `Terminal` and bypass the retry budget.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("provider rejected message: {0}")]
    Terminal(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Opaque delivery capability for one message class. The actual transport
/// (SMTP, SMS gateway HTTP) lives behind this seam.
#[async_trait]
pub trait Deliverer: Send + Sync {
    fn class(&self) -> MessageClass;

    /// Returns the provider's delivery reference on success.
    async fn deliver(&self, message: &Message) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct DeliveryGateway {
    deliverers: HashMap<MessageClass, Arc<dyn Deliverer>>,
}

impl DeliveryGateway {
    pub fn new(deliverers: Vec<Arc<dyn Deliverer>>) -> Self {
        let mut map = HashMap::new();
        for deliverer in deliverers {
            map.insert(deliverer.class(), deliverer);
        }
        Self { deliverers: map }
    }

    pub fn get(&self, class: MessageClass) -> Option<Arc<dyn Deliverer>> {
        self.deliverers.get(&class).cloned()
    }
}
