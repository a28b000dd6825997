use crate::error::{AppError, AppResult};
use crate::unit_of_work::TransactionManager;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgTransaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

/// Postgres 事务句柄
///
/// 克隆共享同一个事务；提交、回滚或释放后句柄失效。
#[derive(Clone)]
pub struct PgTx {
    inner: Arc<Mutex<Option<PgTransaction<'static>>>>,
    timeout: Duration,
}

impl std::fmt::Debug for PgTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTx").field("timeout", &self.timeout).finish()
    }
}

impl PgTx {
    /// 取得活动事务，用于在其上执行查询：`query.execute(&mut **guard)`
    pub async fn lock(&self) -> AppResult<MappedMutexGuard<'_, PgTransaction<'static>>> {
        MutexGuard::try_map(self.inner.lock().await, Option::as_mut)
            .map_err(|_| AppError::infra("postgres transaction is no longer active"))
    }

    async fn take(&self) -> Option<PgTransaction<'static>> {
        self.inner.lock().await.take()
    }
}

#[derive(Debug, Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    type Tx = PgTx;

    async fn begin(&self, timeout: Duration) -> AppResult<PgTx> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::transaction("begin", e))?;

        // SET 不支持参数绑定
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::transaction("begin", e))?;

        Ok(PgTx {
            inner: Arc::new(Mutex::new(Some(tx))),
            timeout,
        })
    }

    async fn commit(&self, tx: &PgTx) -> AppResult<()> {
        let Some(inner) = tx.take().await else {
            return Err(AppError::transaction("commit", "transaction is no longer active"));
        };

        match tokio::time::timeout(tx.timeout, inner.commit()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::transaction("commit", e)),
            Err(_) => Err(AppError::transaction(
                "commit",
                format!("commit exceeded {}ms", tx.timeout.as_millis()),
            )),
        }
    }

    async fn abort(&self, tx: &PgTx) -> AppResult<()> {
        match tx.take().await {
            Some(inner) => inner.rollback().await.map_err(AppError::from),
            None => Ok(()),
        }
    }

    async fn release(&self, tx: PgTx) {
        // 未结束的事务随连接归还连接池时回滚
        drop(tx.take().await);
    }
}
