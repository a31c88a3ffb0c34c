use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::domain::{
    models::{Message, MessageClass, MessageStatus},
    repositories::{MessageStore, QuotaStore},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn create(&self, message: &Message) -> anyhow::Result<()> {
        let (status, reason) = status_to_fields(&message.status);
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, class, tenant_id, recipient, sender, subject, body,
                status, status_reason, attempts, provider_ref, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
        .bind(message.id)
        .bind(message.class.as_str())
        .bind(message.tenant_id)
        .bind(&message.recipient)
        .bind(&message.sender)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(status)
        .bind(reason)
        .bind(message.attempts as i32)
        .bind(&message.provider_ref)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let row = sqlx::query(
            r#"
            SELECT id, class, tenant_id, recipient, sender, subject, body,
                   status, status_reason, attempts, provider_ref, created_at, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }

    async fn mark_sent(&self, id: Uuid, provider_ref: &str) -> anyhow::Result<()> {
        // Guarded update: terminal records are never rewritten.
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'sent',
                status_reason = NULL,
                provider_ref = $2,
                updated_at = $3
            WHERE id = $1
              AND status = 'queued'
            "#,
        )
        .bind(id)
        .bind(provider_ref)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'failed',
                status_reason = $2,
                updated_at = $3
            WHERE id = $1
              AND status = 'queued'
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_attempt(&self, id: Uuid) -> anyhow::Result<u32> {
        let row = sqlx::query(
            r#"
            UPDATE messages
            SET attempts = attempts + 1,
                updated_at = $2
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i32, _>("attempts") as u32)
    }
}

#[derive(Clone)]
pub struct PostgresQuotaStore {
    pool: PgPool,
}

impl PostgresQuotaStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl QuotaStore for PostgresQuotaStore {
    async fn try_increment(
        &self,
        tenant_id: Uuid,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<bool> {
        // Single statement so check-and-increment is atomic under
        // concurrent admissions; no row comes back when the tenant is at
        // its limit and nothing is incremented. The insert arm carries
        // its own guard so a zero limit admits nothing even on the first
        // admission of a fresh window.
        let row = sqlx::query(
            r#"
            INSERT INTO tenant_quotas (tenant_id, window_start, count)
            SELECT $1, $2, 1
            WHERE 1 <= $3
            ON CONFLICT (tenant_id, window_start) DO UPDATE
            SET count = tenant_quotas.count + 1
            WHERE tenant_quotas.count < $3
            RETURNING count
            "#,
        )
        .bind(tenant_id)
        .bind(window_start)
        .bind(limit as i32)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

impl TryFrom<sqlx::postgres::PgRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: sqlx::postgres::PgRow) -> Result<Self, Self::Error> {
        let class_str: String = row.try_get("class")?;
        let class = MessageClass::from_str(&class_str)
            .ok_or_else(|| anyhow::anyhow!("unknown message class {class_str}"))?;
        let status_str: String = row.try_get("status")?;
        let reason: Option<String> = row.try_get("status_reason")?;
        let status = status_from_fields(&status_str, reason)?;

        Ok(Message {
            id: row.try_get("id")?,
            class,
            tenant_id: row.try_get("tenant_id")?,
            recipient: row.try_get("recipient")?,
            sender: row.try_get("sender")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            status,
            attempts: row.try_get::<i32, _>("attempts")? as u32,
            provider_ref: row.try_get("provider_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn status_to_fields(status: &MessageStatus) -> (&'static str, Option<String>) {
    match status {
        MessageStatus::Queued => ("queued", None),
        MessageStatus::Sent => ("sent", None),
        MessageStatus::Failed { reason } => ("failed", Some(reason.clone())),
    }
}

fn status_from_fields(status: &str, reason: Option<String>) -> anyhow::Result<MessageStatus> {
    Ok(match status {
        "queued" => MessageStatus::Queued,
        "sent" => MessageStatus::Sent,
        "failed" => MessageStatus::Failed {
            reason: reason.unwrap_or_else(|| "failed".to_string()),
        },
        other => anyhow::bail!("unknown message status {other}"),
    })
}
