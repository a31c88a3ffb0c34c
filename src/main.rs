use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::main;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier::{
    application::{
        handlers::{
            dispatch::DispatchHandler,
            worker_pool::{WorkerPool, WorkerPoolConfig},
        },
        services::{deliverer::DeliveryGateway, queue::JobQueue, retry::RetryPolicy},
    },
    config::Config,
    domain::{models::MessageClass, repositories::MessageStore},
    infrastructure::{
        providers::LogDeliverer,
        queue::jetstream::{JetStreamConfig, JetStreamJobQueue},
        repositories::postgres::PostgresMessageStore,
    },
};

#[main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::try_parse().map_err(anyhow::Error::msg)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn MessageStore> = PostgresMessageStore::new(pool);

    let queue: Arc<dyn JobQueue> = Arc::new(
        JetStreamJobQueue::connect(&JetStreamConfig {
            url: config.nats_url.clone(),
            stream: config.queue_stream.clone(),
            subject_prefix: config.queue_subject_prefix.clone(),
            durable_prefix: config.queue_durable_prefix.clone(),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
            fetch_expires: Duration::from_secs(config.fetch_expires_secs),
        })
        .await?,
    );

    let gateway = DeliveryGateway::new(vec![
        Arc::new(LogDeliverer::new(MessageClass::Email)),
        Arc::new(LogDeliverer::new(MessageClass::Sms)),
    ]);

    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        base_delay: Duration::from_millis(config.retry_base_ms),
        max_delay: Duration::from_millis(config.retry_max_ms),
    };

    let handler = Arc::new(DispatchHandler::new(
        store,
        gateway,
        policy,
        Duration::from_secs(config.delivery_timeout_secs),
    ));

    let workers = WorkerPool::spawn(
        queue,
        handler,
        WorkerPoolConfig {
            workers_per_class: config.workers_per_class,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        },
    );

    info!("courier dispatcher running");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    workers.shutdown().await;
    Ok(())
}
