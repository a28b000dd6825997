//! 事务性 outbox 的应用层部分
//!
//! - `repository`：outbox 仓储协议（工作单元内写入 + 投递侧查询）
//! - `handler` / `registry`：事件处理器及按类型名的注册表
//! - `processor`：后台投递循环
//! - `facade`：组合根
//!
mod facade;
mod handler;
mod processor;
mod registry;
mod repository;

pub use facade::OutboxFacade;
pub use handler::{EventHandler, Typed, TypedEventHandler};
pub use processor::{OutboxProcessor, PollReport};
pub use registry::EventHandlerRegistry;
pub use repository::{OutboxRepository, TransactionalOutboxRepository};
