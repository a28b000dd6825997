//! 内存实现：文档存储、事务原语、强类型集合与 outbox 仓储
//!
//! 用于测试与演示，语义上对齐支持多文档事务的文档数据库。

mod collection;
mod outbox_repository;
mod store;

pub use collection::DocumentCollection;
pub use outbox_repository::InMemoryOutboxRepository;
pub use store::{FaultPoint, InMemoryDocumentStore, InMemoryTransaction, InMemoryTransactionManager};
