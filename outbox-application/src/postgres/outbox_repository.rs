//! PostgreSQL outbox 仓储
//!
//! 表 `outbox_events` 与持久化形态一一对应，`(status, occurred_at)` 上建索引。
//!
use super::transaction::PgTx;
use crate::context::TxContext;
use crate::error::{AppError, AppResult};
use crate::outbox::{OutboxRepository, TransactionalOutboxRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_domain::domain_event::DomainEvent;
use outbox_domain::error::DomainError;
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};
use sqlx::FromRow;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use tracing::warn;

#[derive(FromRow)]
struct OutboxEventRow {
    id: String,
    aggregate_id: String,
    event_type: String,
    payload: Json<serde_json::Value>,
    occurred_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    status: String,
    retry_count: i32,
    last_error: Option<String>,
}

impl TryFrom<OutboxEventRow> for OutboxRecord {
    type Error = AppError;

    fn try_from(row: OutboxEventRow) -> AppResult<Self> {
        let status: OutboxStatus = row.status.parse()?;
        let retry_count = u32::try_from(row.retry_count).map_err(|_| {
            AppError::from(DomainError::invalid_value(format!(
                "negative retry_count {} for outbox record {}",
                row.retry_count, row.id
            )))
        })?;

        Ok(OutboxRecord::builder()
            .id(row.id)
            .aggregate_id(row.aggregate_id)
            .event_type(row.event_type)
            .payload(row.payload.0)
            .occurred_at(row.occurred_at)
            .maybe_published_at(row.published_at)
            .status(status)
            .retry_count(retry_count)
            .maybe_last_error(row.last_error)
            .build())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, aggregate_id, event_type, payload, occurred_at, \
     published_at, status, retry_count, last_error FROM outbox_events";

#[derive(Debug, Clone)]
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_events (
                id TEXT PRIMARY KEY,
                aggregate_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload JSONB NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                published_at TIMESTAMPTZ,
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING'
                    CHECK (status IN ('PENDING', 'PUBLISHED', 'FAILED')),
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_outbox_events_status_occurred
            ON outbox_events(status, occurred_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 将无法还原为记录的行直接置为 `FAILED`，使其不再占用批次
    async fn quarantine_undecodable(&self, id: &str, err: &AppError) -> AppResult<()> {
        warn!(event_id = id, error = %err, "quarantining undecodable outbox row");
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'FAILED', last_error = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(format!("undecodable outbox row: {err}"))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 读取单条记录（任意状态）
    pub async fn get(&self, id: &str) -> AppResult<Option<OutboxRecord>> {
        sqlx::query_as::<_, OutboxEventRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(OutboxRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn find_pending(&self, limit: usize) -> AppResult<Vec<OutboxRecord>> {
        let rows = sqlx::query_as::<_, OutboxEventRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'PENDING' ORDER BY occurred_at ASC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match OutboxRecord::try_from(row) {
                Ok(record) => pending.push(record),
                Err(err) => self.quarantine_undecodable(&id, &err).await?,
            }
        }
        Ok(pending)
    }

    async fn mark_processed(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PUBLISHED', published_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // 未更新：记录不存在，或已处于终态
        match self.get(id).await? {
            None => Err(AppError::NotFound(format!("outbox record {id}"))),
            Some(mut record) => {
                record.mark_published(Utc::now())?;
                Ok(())
            }
        }
    }

    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        max_retries: u32,
    ) -> AppResult<OutboxStatus> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OutboxEventRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("outbox record {id}")))?;

        let mut record = OutboxRecord::try_from(row)?;
        let status = record.record_failure(error_message, max_retries)?;

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = $2, retry_count = $3, last_error = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(record.retry_count() as i32)
        .bind(record.last_error())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(status)
    }
}

#[async_trait]
impl TransactionalOutboxRepository for PgOutboxRepository {
    type Tx = PgTx;

    async fn insert_many(&self, ctx: &TxContext<PgTx>, events: Vec<DomainEvent>) -> AppResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let records: Vec<OutboxRecord> = events.iter().map(OutboxRecord::from_event).collect();
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO outbox_events (id, aggregate_id, event_type, payload, occurred_at, status, retry_count) ",
        );
        query_builder.push_values(&records, |mut b, record| {
            b.push_bind(record.id());
            b.push_bind(record.aggregate_id());
            b.push_bind(record.event_type());
            b.push_bind(Json(record.payload()));
            b.push_bind(record.occurred_at());
            b.push_bind(record.status().as_str());
            b.push_bind(record.retry_count() as i32);
        });

        let mut tx = ctx.tx().lock().await?;
        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }
}
