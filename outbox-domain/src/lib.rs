//! Outbox 领域层基础库（outbox-domain）
//!
//! 提供事务性 outbox 所需的领域构件：
//! - 实体（`entity`）与带事件缓冲的聚合（`aggregate`）
//! - 领域事件（`domain_event`）：强类型载荷与类型擦除的事件
//! - outbox 记录及其单向状态迁移（`outbox`）
//!
//! 本 crate 不依赖任何存储或异步运行时，工作单元、仓储协议与投递循环由 `outbox-application` 提供。
//!
//! 典型用法：
//! 1. 用 `#[aggregate]` 定义聚合、用 `#[domain_event]` 定义事件载荷；
//! 2. 在聚合的业务方法中调用 `record_event` 缓冲事件；
//! 3. 用例在工作单元内保存聚合后调用 `pull_events`，将事件写入 outbox。
//!
pub mod aggregate;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod outbox;

// 允许在本 crate 内部通过 ::outbox_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::outbox_domain 路径。
extern crate self as outbox_domain;
