use std::collections::HashMap;
use std::time::Duration;

use async_nats::jetstream::{
    self, AckKind,
    consumer::{AckPolicy, PullConsumer, pull},
};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

use crate::{
    application::services::queue::{JobLease, JobQueue},
    domain::models::{Job, MessageClass},
};

#[derive(Clone)]
pub struct JetStreamConfig {
    pub url: String,
    pub stream: String,
    pub subject_prefix: String,
    pub durable_prefix: String,
    /// Ack wait on the consumer; an un-acked job becomes visible again
    /// after this long.
    pub visibility_timeout: Duration,
    /// How long one pull waits for work before re-pulling.
    pub fetch_expires: Duration,
}

/// Durable queue on NATS JetStream. One stream, one subject and durable
/// pull consumer per message class; explicit acks give at-least-once
/// delivery, and `Nak` with a delay implements nack-with-backoff.
pub struct JetStreamJobQueue {
    context: jetstream::Context,
    subject_prefix: String,
    fetch_expires: Duration,
    consumers: HashMap<MessageClass, Mutex<PullConsumer>>,
}

impl JetStreamJobQueue {
    pub async fn connect(config: &JetStreamConfig) -> anyhow::Result<Self> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![format!("{}.>", config.subject_prefix)],
                ..Default::default()
            })
            .await?;

        let mut consumers = HashMap::new();
        for class in MessageClass::ALL {
            let durable = format!("{}-{}", config.durable_prefix, class.as_str());
            let consumer = stream
                .get_or_create_consumer(
                    &durable,
                    pull::Config {
                        durable_name: Some(durable.clone()),
                        filter_subject: format!("{}.{}", config.subject_prefix, class.as_str()),
                        ack_policy: AckPolicy::Explicit,
                        ack_wait: config.visibility_timeout,
                        ..Default::default()
                    },
                )
                .await?;
            consumers.insert(class, Mutex::new(consumer));
        }

        Ok(Self {
            context,
            subject_prefix: config.subject_prefix.clone(),
            fetch_expires: config.fetch_expires,
            consumers,
        })
    }

    fn subject(&self, class: MessageClass) -> String {
        format!("{}.{}", self.subject_prefix, class.as_str())
    }
}

#[async_trait]
impl JobQueue for JetStreamJobQueue {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&job)?;
        // The second await waits for the server's publish ack; without it
        // a broker-side storage failure would go unnoticed and the job
        // could be silently lost.
        self.context
            .publish(self.subject(job.class), payload.into())
            .await?
            .await?;
        Ok(())
    }

    async fn dequeue(&self, class: MessageClass) -> anyhow::Result<Box<dyn JobLease>> {
        let consumer = self
            .consumers
            .get(&class)
            .ok_or_else(|| anyhow::anyhow!("no consumer for class {}", class.as_str()))?;

        loop {
            // One message per pull; concurrent workers of the same class
            // serialize on the consumer, not on processing.
            let consumer = consumer.lock().await;
            let mut messages = consumer
                .batch()
                .max_messages(1)
                .expires(self.fetch_expires)
                .messages()
                .await?;

            match messages.next().await {
                Some(Ok(message)) => {
                    let job: Job = serde_json::from_slice(&message.payload)?;
                    return Ok(Box::new(JetStreamLease { message, job }));
                }
                Some(Err(err)) => return Err(anyhow::Error::from_boxed(err)),
                // Pull expired without work.
                None => continue,
            }
        }
    }
}

struct JetStreamLease {
    message: jetstream::Message,
    job: Job,
}

#[async_trait]
impl JobLease for JetStreamLease {
    fn job(&self) -> &Job {
        &self.job
    }

    async fn ack(self: Box<Self>) -> anyhow::Result<()> {
        self.message
            .ack()
            .await
            .map_err(|err| anyhow::anyhow!("failed to ack job: {err}"))
    }

    async fn nack(self: Box<Self>, delay: Duration) -> anyhow::Result<()> {
        self.message
            .ack_with(AckKind::Nak(Some(delay)))
            .await
            .map_err(|err| anyhow::anyhow!("failed to nack job: {err}"))
    }
}
