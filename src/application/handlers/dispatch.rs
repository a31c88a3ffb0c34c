use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    application::services::{
        deliverer::{DeliveryGateway, ProviderError},
        queue::JobLease,
        retry::{RetryDecision, RetryPolicy},
    },
    domain::repositories::MessageStore,
};

/// Processes one dequeued job: load the record, deliver, write the outcome
/// back, settle the lease. Store errors propagate without settling the
/// lease, which leaves the job in flight until the visibility timeout
/// redelivers it; the terminal-state idempotence of the store makes that
/// duplicate processing harmless.
pub struct DispatchHandler {
    store: Arc<dyn MessageStore>,
    gateway: DeliveryGateway,
    policy: RetryPolicy,
    delivery_timeout: Duration,
}

impl DispatchHandler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        gateway: DeliveryGateway,
        policy: RetryPolicy,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
            delivery_timeout,
        }
    }

    pub async fn handle(&self, lease: Box<dyn JobLease>) -> anyhow::Result<()> {
        let job = lease.job().clone();

        let Some(message) = self.store.get(job.message_id).await? else {
            // Record gone: nothing to deliver, drop the job.
            warn!(message_id = %job.message_id, "job references missing message, dropping");
            return lease.ack().await;
        };

        if message.status.is_terminal() {
            // Duplicate or late redelivery after a terminal outcome.
            return lease.ack().await;
        }

        let Some(deliverer) = self.gateway.get(job.class) else {
            self.store
                .mark_failed(message.id, "no deliverer registered for class")
                .await?;
            return lease.ack().await;
        };

        let attempts = self.store.increment_attempt(message.id).await?;

        let outcome = match tokio::time::timeout(
            self.delivery_timeout,
            deliverer.deliver(&message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Transient("delivery timed out".to_string())),
        };

        match outcome {
            Ok(provider_ref) => {
                self.store.mark_sent(message.id, &provider_ref).await?;
                info!(
                    message_id = %message.id,
                    class = message.class.as_str(),
                    attempts,
                    "message delivered"
                );
                lease.ack().await
            }
            Err(err) => match self.policy.should_retry(attempts, &err) {
                RetryDecision::Retry { after } => {
                    warn!(
                        message_id = %message.id,
                        attempts,
                        delay_ms = after.as_millis() as u64,
                        error = %err,
                        "delivery failed, scheduling retry"
                    );
                    lease.nack(after).await
                }
                RetryDecision::GiveUp => {
                    self.store
                        .mark_failed(message.id, &err.to_string())
                        .await?;
                    warn!(
                        message_id = %message.id,
                        attempts,
                        error = %err,
                        "delivery failed permanently"
                    );
                    lease.ack().await
                }
            },
        }
    }
}
