//! PostgreSQL 实现（特性 `infra-sqlx`）

mod outbox_repository;
mod transaction;

pub use outbox_repository::PgOutboxRepository;
pub use transaction::{PgTransactionManager, PgTx};
