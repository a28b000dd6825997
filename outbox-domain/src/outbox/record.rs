//! Outbox 记录（OutboxRecord）
//!
//! 领域事件在持久化层等待投递的形态，以及它的状态迁移规则：
//! - `Pending` 时 `published_at` 必为空；
//! - `Published` 时 `published_at` 已设置，`retry_count` 保持为最后一次失败时的值；
//! - `Failed` 时 `retry_count >= max_retries` 且 `last_error` 已设置；
//! - 终态（`Published`/`Failed`）不可再迁移。
//!
use super::OutboxStatus;
use crate::domain_event::{DomainEvent, EventPayload};
use crate::error::{DomainError, DomainResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxRecord {
    /// 记录标识，与来源事件的 id 相同
    id: String,
    /// 产生该事件的聚合标识
    aggregate_id: String,
    /// 事件类型名，用于查找处理器
    event_type: String,
    /// 事件载荷，原样存储
    payload: Value,
    /// 事件发生时间，也是投递顺序键
    occurred_at: DateTime<Utc>,
    /// 投递成功时间，仅在迁移到 `Published` 时设置一次
    published_at: Option<DateTime<Utc>>,
    #[builder(default = OutboxStatus::Pending)]
    status: OutboxStatus,
    #[builder(default)]
    retry_count: u32,
    last_error: Option<String>,
}

impl OutboxRecord {
    /// 由领域事件生成一条待投递记录
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            id: event.id().to_string(),
            aggregate_id: event.aggregate_id().to_string(),
            event_type: event.name().to_string(),
            payload: event.props().clone(),
            occurred_at: event.created_at(),
            published_at: None,
            status: OutboxStatus::Pending,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn status(&self) -> OutboxStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    /// 以强类型载荷查看事件内容；类型名不匹配时返回 `TypeMismatch`
    pub fn payload_as<P: EventPayload>(&self) -> DomainResult<P> {
        if self.event_type != P::NAME {
            return Err(DomainError::type_mismatch(P::NAME, self.event_type.clone()));
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// `Pending → Published`
    pub fn mark_published(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending("mark published")?;
        self.status = OutboxStatus::Published;
        self.published_at = Some(now);
        Ok(())
    }

    /// 记录一次投递失败：重试计数加一，达到 `max_retries` 即隔离为 `Failed`
    pub fn record_failure(
        &mut self,
        error_message: impl Into<String>,
        max_retries: u32,
    ) -> DomainResult<OutboxStatus> {
        self.ensure_pending("record failure")?;
        self.retry_count += 1;
        self.last_error = Some(error_message.into());
        if self.retry_count >= max_retries {
            self.status = OutboxStatus::Failed;
        }
        Ok(self.status)
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} outbox record {} in status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}
