use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::task::JoinSet;
use uuid::Uuid;

use courier::{
    application::{
        services::{
            queue::JobQueue,
            quota::{QuotaConfig, QuotaGate},
        },
        usecases::enqueue_message::{EnqueueMessageUseCase, EnqueueRequest},
    },
    domain::{
        errors::EnqueueError,
        models::MessagePayload,
        repositories::MessageStore,
    },
    infrastructure::{
        queue::in_memory::InMemoryJobQueue,
        repositories::in_memory::{InMemoryMessageStore, InMemoryQuotaStore},
    },
};

fn payload() -> MessagePayload {
    MessagePayload::Email {
        recipient: "user@example.test".to_string(),
        subject: "hi".to_string(),
        body: "hello".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_admissions_never_exceed_the_limit() {
    let gate = Arc::new(QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 50,
            window: ChronoDuration::hours(24),
        },
    ));
    let tenant = Uuid::new_v4();

    let mut tasks = JoinSet::new();
    for _ in 0..100 {
        let gate = gate.clone();
        tasks.spawn(async move { gate.try_admit(tenant).await.unwrap() });
    }

    let mut admitted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn two_concurrent_enqueues_against_limit_one_admit_exactly_one() {
    let store = Arc::new(InMemoryMessageStore::new());
    let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(30)));
    let gate = Arc::new(QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 1,
            window: ChronoDuration::hours(24),
        },
    ));
    let enqueue = Arc::new(EnqueueMessageUseCase::new(
        store.clone() as Arc<dyn MessageStore>,
        queue.clone() as Arc<dyn JobQueue>,
        gate,
    ));
    let tenant = Uuid::new_v4();

    let mut tasks = JoinSet::new();
    for _ in 0..2 {
        let enqueue = enqueue.clone();
        tasks.spawn(async move {
            enqueue
                .execute(EnqueueRequest {
                    tenant_id: tenant,
                    payload: payload(),
                })
                .await
        });
    }

    let mut succeeded = 0;
    let mut quota_exceeded = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EnqueueError::QuotaExceeded) => quota_exceeded += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(quota_exceeded, 1);
}

#[tokio::test]
async fn per_tenant_override_takes_precedence_over_the_default() {
    let gate = QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 100,
            window: ChronoDuration::hours(24),
        },
    );
    let capped = Uuid::new_v4();
    gate.set_limit(capped, 1).await;

    assert!(gate.try_admit(capped).await.unwrap());
    assert!(!gate.try_admit(capped).await.unwrap());

    // Other tenants still get the default.
    assert!(gate.try_admit(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn zero_limit_blocks_a_tenant_entirely() {
    let gate = QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 100,
            window: ChronoDuration::hours(24),
        },
    );
    let blocked = Uuid::new_v4();
    gate.set_limit(blocked, 0).await;

    // Not even the first admission of a fresh window gets through.
    assert!(!gate.try_admit(blocked).await.unwrap());
    assert!(!gate.try_admit(blocked).await.unwrap());
}

#[tokio::test]
async fn quota_resets_when_the_window_rolls_over() {
    let gate = QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 1,
            window: ChronoDuration::seconds(1),
        },
    );
    let tenant = Uuid::new_v4();

    // Align to just after a boundary so both admissions land in the same
    // one-second window.
    let into_window = chrono::Utc::now().timestamp_subsec_millis() as u64;
    tokio::time::sleep(Duration::from_millis(1_050 - into_window.min(1_000))).await;

    assert!(gate.try_admit(tenant).await.unwrap());
    assert!(!gate.try_admit(tenant).await.unwrap());

    // Past the next window boundary the counter starts fresh.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(gate.try_admit(tenant).await.unwrap());
}

#[tokio::test]
async fn quota_is_consumed_even_when_later_steps_fail() {
    // Admission-time accounting: the counter moves on admission, before
    // the outcome of delivery is known.
    let store = Arc::new(InMemoryMessageStore::new());
    let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(30)));
    let gate = Arc::new(QuotaGate::new(
        Arc::new(InMemoryQuotaStore::new()),
        QuotaConfig {
            default_limit: 2,
            window: ChronoDuration::hours(24),
        },
    ));
    let enqueue = EnqueueMessageUseCase::new(
        store.clone() as Arc<dyn MessageStore>,
        queue.clone() as Arc<dyn JobQueue>,
        gate.clone(),
    );
    let tenant = Uuid::new_v4();

    // No worker pool is running, so neither message will ever be sent;
    // both still count against the window.
    enqueue
        .execute(EnqueueRequest {
            tenant_id: tenant,
            payload: payload(),
        })
        .await
        .unwrap();
    enqueue
        .execute(EnqueueRequest {
            tenant_id: tenant,
            payload: payload(),
        })
        .await
        .unwrap();

    let third = enqueue
        .execute(EnqueueRequest {
            tenant_id: tenant,
            payload: payload(),
        })
        .await;
    assert!(matches!(third, Err(EnqueueError::QuotaExceeded)));
}
