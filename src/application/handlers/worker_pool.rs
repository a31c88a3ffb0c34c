use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    application::{handlers::dispatch::DispatchHandler, services::queue::JobQueue},
    domain::models::MessageClass,
};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers_per_class: usize,
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers_per_class: 5,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Fixed-size pool of concurrent workers per message class. Workers share
/// the queue and store; the only cross-worker coordination is the queue's
/// own atomicity, so job processing interleaves freely.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    grace: Duration,
}

impl WorkerPool {
    pub fn spawn(
        queue: Arc<dyn JobQueue>,
        handler: Arc<DispatchHandler>,
        config: WorkerPoolConfig,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());
        let mut handles = Vec::new();

        for class in MessageClass::ALL {
            for index in 0..config.workers_per_class {
                handles.push(tokio::spawn(worker_loop(
                    class,
                    index,
                    queue.clone(),
                    handler.clone(),
                    running.clone(),
                    shutdown.clone(),
                )));
            }
        }

        info!(
            workers_per_class = config.workers_per_class,
            "dispatch worker pool started"
        );

        Self {
            handles,
            running,
            shutdown,
            grace: config.shutdown_grace,
        }
    }

    /// Cooperative shutdown. Workers blocked on dequeue stop immediately;
    /// in-flight deliveries get the grace period to finish, then are
    /// aborted. Jobs not yet acked reappear via the queue's visibility
    /// timeout, so shutdown never silently drops work.
    pub async fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        let drain = async {
            for handle in self.handles.iter_mut() {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            error!("shutdown grace elapsed, aborting remaining workers");
            for handle in &self.handles {
                handle.abort();
            }
        }

        info!("dispatch worker pool stopped");
    }
}

async fn worker_loop(
    class: MessageClass,
    index: usize,
    queue: Arc<dyn JobQueue>,
    handler: Arc<DispatchHandler>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    debug!(class = class.as_str(), index, "worker started");

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = shutdown.notified() => break,
            dequeued = queue.dequeue(class) => match dequeued {
                Ok(lease) => {
                    // Deliberately not raced against shutdown: an in-flight
                    // delivery runs to completion within the grace period.
                    if let Err(err) = handler.handle(lease).await {
                        error!(class = class.as_str(), index, error = %err, "job processing failed");
                    }
                }
                Err(err) => {
                    error!(class = class.as_str(), index, error = %err, "dequeue failed");
                    tokio::select! {
                        _ = shutdown.notified() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            },
        }
    }

    debug!(class = class.as_str(), index, "worker stopped");
}
