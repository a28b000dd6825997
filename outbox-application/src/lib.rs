pub mod config;
pub mod context;
pub mod error;
pub mod inmemory;
pub mod outbox;
#[cfg(feature = "infra-sqlx")]
pub mod postgres;
pub mod unit_of_work;

pub use config::{OutboxConfig, UnitOfWorkConfig};
pub use outbox::{OutboxFacade, OutboxProcessor};
pub use unit_of_work::{TransactionManager, UnitOfWork};
