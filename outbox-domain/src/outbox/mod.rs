//! Outbox 领域模型
//!
//! 事件在持久化层等待投递的记录（`OutboxRecord`）及其状态（`OutboxStatus`）。
//! 仓储协议与投递循环位于应用层。

mod record;
mod status;

pub use record::OutboxRecord;
pub use status::OutboxStatus;
