//! 领域事件（Domain Event）
//!
//! - `EventPayload`：具体事件的强类型载荷；
//! - `DomainEvent`：类型擦除后的事件，由聚合缓冲、在同一工作单元内转为 Outbox 记录；
//! - `BusinessContext`：链路追踪、执行者等横切语境。

mod business_context;
mod event;
mod event_payload;

pub use business_context::BusinessContext;
pub use event::DomainEvent;
pub use event_payload::EventPayload;
