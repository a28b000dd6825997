//! 工作单元（Unit of Work）
//!
//! 在一个原子事务内执行调用方提供的逻辑：
//! 1. 以配置的最大提交时长开启事务；
//! 2. 将事务句柄附加到上下文（`TxContext`）后调用 `work`；
//! 3. `work` 成功则提交，提交失败时返回该失败（丢弃业务结果）；
//! 4. `work` 返回错误或 panic 则回滚，回滚自身的错误只记录日志；
//! 5. 无论哪条路径，最后都释放事务。
//!
use crate::config::UnitOfWorkConfig;
use crate::context::{AppContext, TxContext};
use crate::error::{AppError, AppResult, panic_message};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, warn};

/// 存储侧事务原语
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// 活动事务句柄，嵌套写入通过 `TxContext::tx()` 取得
    type Tx: Clone + Send + Sync + 'static;

    /// 开启事务；`timeout` 为允许的最大提交时长，超出时提交失败
    async fn begin(&self, timeout: Duration) -> AppResult<Self::Tx>;

    async fn commit(&self, tx: &Self::Tx) -> AppResult<()>;

    async fn abort(&self, tx: &Self::Tx) -> AppResult<()>;

    /// 释放事务（会话）；未提交的写入一并丢弃
    async fn release(&self, tx: Self::Tx);
}

#[derive(Debug, Clone)]
pub struct UnitOfWork<M> {
    manager: M,
    config: UnitOfWorkConfig,
}

impl<M: TransactionManager> UnitOfWork<M> {
    pub fn new(manager: M, config: UnitOfWorkConfig) -> Self {
        Self { manager, config }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// 在单个事务内执行 `work`
    ///
    /// - 业务错误原样返回（事务已回滚）；
    /// - 提交失败返回 `AppError::Transaction { stage: "commit", .. }`；
    /// - `work` panic 返回 `AppError::Panicked`。
    pub async fn execute<T, F, Fut>(&self, ctx: &AppContext, work: F) -> AppResult<T>
    where
        F: FnOnce(TxContext<M::Tx>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let tx = self
            .manager
            .begin(self.config.transaction_timeout())
            .await
            .map_err(|err| at_stage("begin", err))?;

        let tx_ctx = ctx.clone().with_tx(tx.clone());
        let outcome = AssertUnwindSafe(async move { work(tx_ctx).await })
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => match self.manager.commit(&tx).await {
                Ok(()) => Ok(value),
                Err(err) => {
                    error!(error = %err, "unit of work commit failed");
                    Err(at_stage("commit", err))
                }
            },
            Ok(Err(err)) => {
                self.abort_quietly(&tx).await;
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "unit of work panicked, aborting transaction");
                self.abort_quietly(&tx).await;
                Err(AppError::Panicked { message })
            }
        };

        self.manager.release(tx).await;
        result
    }

    async fn abort_quietly(&self, tx: &M::Tx) {
        if let Err(err) = self.manager.abort(tx).await {
            error!(error = %err, "unit of work abort failed");
        }
    }
}

fn at_stage(stage: &'static str, err: AppError) -> AppError {
    match err {
        err @ AppError::Transaction { .. } => err,
        other => AppError::transaction(stage, other),
    }
}
