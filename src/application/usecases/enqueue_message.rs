use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{
    application::services::{queue::JobQueue, quota::QuotaGate},
    domain::{
        errors::EnqueueError,
        models::{Job, Message, MessagePayload},
        repositories::MessageStore,
    },
};

/// Ingress boundary: validate, admit through the quota gate, persist and
/// hand the job to the dispatch queue. Errors here are returned
/// synchronously to the caller; once `Ok` the request has completed and
/// every later failure is resolved inside the pipeline.
pub struct EnqueueMessageUseCase {
    store: Arc<dyn MessageStore>,
    queue: Arc<dyn JobQueue>,
    gate: Arc<QuotaGate>,
}

pub struct EnqueueRequest {
    pub tenant_id: Uuid,
    pub payload: MessagePayload,
}

impl EnqueueMessageUseCase {
    pub fn new(
        store: Arc<dyn MessageStore>,
        queue: Arc<dyn JobQueue>,
        gate: Arc<QuotaGate>,
    ) -> Self {
        Self { store, queue, gate }
    }

    pub async fn execute(&self, request: EnqueueRequest) -> Result<Uuid, EnqueueError> {
        request.payload.validate()?;

        let admitted = self
            .gate
            .try_admit(request.tenant_id)
            .await
            .map_err(|err| EnqueueError::Unavailable(err.into()))?;
        if !admitted {
            return Err(EnqueueError::QuotaExceeded);
        }

        let message = Message::new(request.tenant_id, request.payload);
        self.store
            .create(&message)
            .await
            .map_err(EnqueueError::Unavailable)?;

        if let Err(err) = self.queue.enqueue(Job::for_message(&message)).await {
            // The job never reached the queue, so nothing will ever
            // deliver this record; close it out rather than leaving a
            // permanently Queued message behind the Unavailable error.
            if let Err(store_err) = self
                .store
                .mark_failed(message.id, "dispatch job could not be enqueued")
                .await
            {
                warn!(message_id = %message.id, error = %store_err, "failed to close out unenqueued message");
            }
            return Err(EnqueueError::Unavailable(err));
        }

        Ok(message.id)
    }
}
