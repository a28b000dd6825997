use crate::context::TxContext;
use crate::error::AppResult;
use async_trait::async_trait;
use outbox_domain::domain_event::DomainEvent;
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};

/// 投递循环一侧的 outbox 查询（在任何工作单元之外执行）
///
/// 每个操作在单条记录上独立原子；存储故障统一包装为 `AppError::Infra` 返回，
/// 仓储内部不做重试。
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// 取出至多 `limit` 条 `PENDING` 记录，按 `occurred_at` 升序
    ///
    /// 无法解码的待投递记录就地置为 `FAILED` 并跳过，不影响其余记录
    async fn find_pending(&self, limit: usize) -> AppResult<Vec<OutboxRecord>>;

    /// `PENDING → PUBLISHED`，`published_at = now`
    async fn mark_processed(&self, id: &str) -> AppResult<()>;

    /// 记录一次投递失败并返回迁移后的状态；记录不存在时返回 `AppError::NotFound`
    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        max_retries: u32,
    ) -> AppResult<OutboxStatus>;
}

/// 工作单元内的事务性写入
#[async_trait]
pub trait TransactionalOutboxRepository: OutboxRepository {
    type Tx: Clone + Send + Sync + 'static;

    /// 将已取出的领域事件转为 outbox 记录，并写入 `ctx` 上的活动事务；空列表不产生任何写入
    async fn insert_many(&self, ctx: &TxContext<Self::Tx>, events: Vec<DomainEvent>)
    -> AppResult<()>;
}
