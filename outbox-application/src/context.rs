use outbox_domain::domain_event::BusinessContext;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（用例、事件处理）所需的横切信息，例如：
/// - 业务语境（`BusinessContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等；
/// - 幂等键（`idempotency_key`）：用于在基础设施层实现请求幂等。
///
/// 典型用法：
/// ```rust
/// use outbox_application::context::AppContext;
/// use outbox_domain::domain_event::BusinessContext;
///
/// let ctx = AppContext {
///     biz: BusinessContext::builder()
///         .maybe_correlation_id(Some("cor-123".into()))
///         .maybe_actor_type(Some("user".into()))
///         .maybe_actor_id(Some("u-1".into()))
///         .build(),
///     idempotency_key: Some("idem-xyz".into()),
/// };
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、审计主体、操作因果）
    pub biz: BusinessContext,
    /// 幂等键（可选）：为空则由上层或基础设施决定是否参与幂等
    pub idempotency_key: Option<String>,
}

impl AppContext {
    pub fn new(biz: BusinessContext) -> Self {
        Self {
            biz,
            idempotency_key: None,
        }
    }

    /// 附加活动事务句柄，得到工作单元内使用的上下文
    pub fn with_tx<Tx>(self, tx: Tx) -> TxContext<Tx> {
        TxContext { app: self, tx }
    }
}

/// 工作单元内的上下文：调用方的 `AppContext` 加上活动事务句柄
///
/// 嵌套写入（聚合保存、`insert_many`）都应通过该上下文取得事务，
/// 以保证与同一工作单元内的其他写入原子提交。
#[derive(Clone, Debug)]
pub struct TxContext<Tx> {
    app: AppContext,
    tx: Tx,
}

impl<Tx> TxContext<Tx> {
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn tx(&self) -> &Tx {
        &self.tx
    }
}
