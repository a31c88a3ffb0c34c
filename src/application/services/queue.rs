use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{Job, MessageClass};

/// A dequeued job together with the receipt needed to settle it. Dropping a
/// lease without acking leaves the job in flight until the queue's
/// visibility timeout elapses, after which it is redelivered.
#[async_trait]
pub trait JobLease: Send + Sync {
    fn job(&self) -> &Job;

    /// Permanently removes the job from the queue.
    async fn ack(self: Box<Self>) -> anyhow::Result<()>;

    /// Returns the job to the queue, visible again after `delay`. A nacked
    /// job re-enters behind newer arrivals; FIFO is per-class best-effort.
    async fn nack(self: Box<Self>, delay: Duration) -> anyhow::Result<()>;
}

/// Durable FIFO per message class with at-least-once delivery to workers.
/// A job is only removed on explicit ack, so a crashed worker never loses
/// work; the duplicate processing that redelivery can cause is absorbed by
/// the message store's terminal-state idempotence.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()>;

    /// Blocks until a job for `class` is available.
    async fn dequeue(&self, class: MessageClass) -> anyhow::Result<Box<dyn JobLease>>;
}
