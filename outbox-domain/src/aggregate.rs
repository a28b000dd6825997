//! 聚合（Aggregate）抽象
//!
//! 聚合是一致性边界，其业务操作产生的领域事件先缓冲在聚合自身：
//! - `record_event` 追加事件（不持久化）；
//! - `pull_events` 一次性取出并清空缓冲，交由用例在同一工作单元内写入 outbox；
//! - 缓冲字段与 `Entity`/`Aggregate` 实现通常由 `#[aggregate]` 宏生成。
//!
use crate::domain_event::{DomainEvent, EventPayload};
use crate::entity::Entity;
use crate::error::DomainResult;

/// 聚合根接口
pub trait Aggregate: Entity {
    const TYPE: &'static str;

    /// 缓冲中尚未取出的事件
    fn pending_events(&self) -> &[DomainEvent];

    /// 缓冲的可变引用（供默认方法使用）
    fn pending_events_mut(&mut self) -> &mut Vec<DomainEvent>;

    /// 以当前聚合标识记录一条新事件
    fn record_event<P: EventPayload>(&mut self, payload: &P) -> DomainResult<&DomainEvent> {
        let event = DomainEvent::new(self.id().to_string(), payload)?;
        let buffer = self.pending_events_mut();
        buffer.push(event);
        Ok(&buffer[buffer.len() - 1])
    }

    /// 取出全部缓冲事件，缓冲随即清空
    fn pull_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(self.pending_events_mut())
    }

    fn has_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
