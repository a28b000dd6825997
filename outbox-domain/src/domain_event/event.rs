use super::EventPayload;
use crate::error::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 类型擦除的领域事件
///
/// 仅存在于内存中：由聚合的业务操作产生并缓冲在聚合上，
/// 聚合写入成功后被一次性取出，并在同一工作单元内 1:1 转换为 `OutboxRecord`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: String,
    aggregate_id: String,
    name: String,
    created_at: DateTime<Utc>,
    props: Value,
}

impl DomainEvent {
    /// 以强类型载荷创建事件，`id` 为新的 UUID，`created_at` 为当前时间
    pub fn new<P: EventPayload>(aggregate_id: impl Into<String>, payload: &P) -> DomainResult<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            aggregate_id: aggregate_id.into(),
            name: P::NAME.to_string(),
            created_at: Utc::now(),
            props: serde_json::to_value(payload)?,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    /// 还原强类型载荷；事件名不匹配时返回 `TypeMismatch`
    pub fn decode<P: EventPayload>(&self) -> DomainResult<P> {
        if self.name != P::NAME {
            return Err(DomainError::type_mismatch(P::NAME, self.name.clone()));
        }
        Ok(serde_json::from_value(self.props.clone())?)
    }
}
