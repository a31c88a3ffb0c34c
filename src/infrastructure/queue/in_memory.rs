use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::{
    application::services::queue::{JobLease, JobQueue},
    domain::models::{Job, MessageClass},
};

/// In-process queue with the same contract the JetStream backend provides:
/// one FIFO per class, at-least-once delivery, redelivery of un-acked jobs
/// after a visibility timeout. Backs the test suite and single-node runs.
pub struct InMemoryJobQueue {
    classes: HashMap<MessageClass, Arc<ClassQueue>>,
    visibility_timeout: Duration,
}

struct ClassQueue {
    state: Mutex<ClassState>,
    notify: Notify,
}

#[derive(Default)]
struct ClassState {
    ready: VecDeque<Job>,
    delayed: Vec<(Instant, Job)>,
    in_flight: HashMap<u64, (Instant, Job)>,
    next_receipt: u64,
}

impl InMemoryJobQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        let classes = MessageClass::ALL
            .into_iter()
            .map(|class| {
                (
                    class,
                    Arc::new(ClassQueue {
                        state: Mutex::new(ClassState::default()),
                        notify: Notify::new(),
                    }),
                )
            })
            .collect();
        Self {
            classes,
            visibility_timeout,
        }
    }

    fn class_queue(&self, class: MessageClass) -> anyhow::Result<Arc<ClassQueue>> {
        self.classes
            .get(&class)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no queue for class {}", class.as_str()))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()> {
        let queue = self.class_queue(job.class)?;
        {
            let mut state = queue.state.lock().await;
            state.ready.push_back(job);
        }
        queue.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, class: MessageClass) -> anyhow::Result<Box<dyn JobLease>> {
        let queue = self.class_queue(class)?;
        loop {
            let next_wake = {
                let mut state = queue.state.lock().await;
                let now = Instant::now();

                // Reclaim leases whose visibility timeout elapsed.
                let expired: Vec<u64> = state
                    .in_flight
                    .iter()
                    .filter(|(_, (deadline, _))| *deadline <= now)
                    .map(|(receipt, _)| *receipt)
                    .collect();
                for receipt in expired {
                    if let Some((_, job)) = state.in_flight.remove(&receipt) {
                        state.ready.push_back(job);
                    }
                }

                // Promote nacked jobs whose delay elapsed.
                let mut index = 0;
                while index < state.delayed.len() {
                    if state.delayed[index].0 <= now {
                        let (_, job) = state.delayed.swap_remove(index);
                        state.ready.push_back(job);
                    } else {
                        index += 1;
                    }
                }

                if let Some(job) = state.ready.pop_front() {
                    let receipt = state.next_receipt;
                    state.next_receipt += 1;
                    state
                        .in_flight
                        .insert(receipt, (now + self.visibility_timeout, job.clone()));
                    return Ok(Box::new(InMemoryLease {
                        queue: queue.clone(),
                        receipt,
                        job,
                    }));
                }

                state
                    .delayed
                    .iter()
                    .map(|(ready_at, _)| *ready_at)
                    .chain(state.in_flight.values().map(|(deadline, _)| *deadline))
                    .min()
            };

            match next_wake {
                Some(deadline) => tokio::select! {
                    _ = queue.notify.notified() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                },
                None => queue.notify.notified().await,
            }
        }
    }
}

struct InMemoryLease {
    queue: Arc<ClassQueue>,
    receipt: u64,
    job: Job,
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> &Job {
        &self.job
    }

    async fn ack(self: Box<Self>) -> anyhow::Result<()> {
        let mut state = self.queue.state.lock().await;
        state.in_flight.remove(&self.receipt);
        Ok(())
    }

    async fn nack(self: Box<Self>, delay: Duration) -> anyhow::Result<()> {
        let requeued = {
            let mut state = self.queue.state.lock().await;
            // The receipt may already have been reclaimed by the
            // visibility timeout; in that case the job is back in the
            // queue and there is nothing left to do.
            match state.in_flight.remove(&self.receipt) {
                Some((_, job)) => {
                    if delay.is_zero() {
                        state.ready.push_back(job);
                    } else {
                        state.delayed.push((Instant::now() + delay, job));
                    }
                    true
                }
                None => false,
            }
        };
        if requeued {
            self.queue.notify.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn job(class: MessageClass) -> Job {
        Job {
            message_id: Uuid::new_v4(),
            class,
            enqueued_at: Utc::now(),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn dequeues_in_fifo_order_per_class() {
        let queue = InMemoryJobQueue::new(Duration::from_secs(30));
        let first = job(MessageClass::Email);
        let second = job(MessageClass::Email);
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        assert_eq!(lease.job().message_id, first.message_id);
        lease.ack().await.unwrap();

        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        assert_eq!(lease.job().message_id, second.message_id);
        lease.ack().await.unwrap();
    }

    #[tokio::test]
    async fn classes_are_independent() {
        let queue = InMemoryJobQueue::new(Duration::from_secs(30));
        queue.enqueue(job(MessageClass::Sms)).await.unwrap();

        let email = tokio::time::timeout(
            Duration::from_millis(50),
            queue.dequeue(MessageClass::Email),
        )
        .await;
        assert!(email.is_err(), "email queue should stay empty");

        let lease = queue.dequeue(MessageClass::Sms).await.unwrap();
        assert_eq!(lease.job().class, MessageClass::Sms);
    }

    #[tokio::test]
    async fn acked_job_is_gone_for_good() {
        let queue = InMemoryJobQueue::new(Duration::from_millis(20));
        queue.enqueue(job(MessageClass::Email)).await.unwrap();
        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        lease.ack().await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let redelivered = tokio::time::timeout(
            Duration::from_millis(50),
            queue.dequeue(MessageClass::Email),
        )
        .await;
        assert!(redelivered.is_err());
    }

    #[tokio::test]
    async fn dropped_lease_is_redelivered_after_visibility_timeout() {
        let queue = InMemoryJobQueue::new(Duration::from_millis(30));
        let original = job(MessageClass::Email);
        queue.enqueue(original.clone()).await.unwrap();

        // Simulated worker crash: dequeue and drop without settling.
        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        drop(lease);

        let lease = tokio::time::timeout(
            Duration::from_millis(500),
            queue.dequeue(MessageClass::Email),
        )
        .await
        .expect("job should become visible again")
        .unwrap();
        assert_eq!(lease.job().message_id, original.message_id);
        lease.ack().await.unwrap();
    }

    #[tokio::test]
    async fn nacked_job_reappears_after_delay_behind_newer_arrivals() {
        let queue = InMemoryJobQueue::new(Duration::from_secs(30));
        let first = job(MessageClass::Email);
        queue.enqueue(first.clone()).await.unwrap();

        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        lease.nack(Duration::from_millis(30)).await.unwrap();

        let newer = job(MessageClass::Email);
        queue.enqueue(newer.clone()).await.unwrap();

        let lease = queue.dequeue(MessageClass::Email).await.unwrap();
        assert_eq!(lease.job().message_id, newer.message_id);
        lease.ack().await.unwrap();

        let lease = tokio::time::timeout(
            Duration::from_millis(500),
            queue.dequeue(MessageClass::Email),
        )
        .await
        .expect("nacked job should come back")
        .unwrap();
        assert_eq!(lease.job().message_id, first.message_id);
        lease.ack().await.unwrap();
    }
}
