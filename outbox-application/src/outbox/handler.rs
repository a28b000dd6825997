//! 事件处理器（EventHandler）
//!
//! 投递循环按记录的 `event_type` 查找处理器并调用。
//! 处理器返回错误视为一次可重试的投递失败。
//!
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use outbox_domain::domain_event::EventPayload;
use outbox_domain::outbox::OutboxRecord;
use std::marker::PhantomData;

/// 处理类型擦除后的 outbox 记录
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志）
    fn handler_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, ctx: &AppContext, record: &OutboxRecord) -> AppResult<()>;
}

/// 处理某一具体事件载荷
#[async_trait]
pub trait TypedEventHandler<P: EventPayload + 'static>: Send + Sync {
    fn handler_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, ctx: &AppContext, payload: P, record: &OutboxRecord) -> AppResult<()>;
}

/// 将 `TypedEventHandler<P>` 适配为 `EventHandler`：先解码载荷，解码失败即处理失败
pub struct Typed<H, P> {
    inner: H,
    _payload: PhantomData<fn() -> P>,
}

impl<H, P> Typed<H, P> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            _payload: PhantomData,
        }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

#[async_trait]
impl<H, P> EventHandler for Typed<H, P>
where
    H: TypedEventHandler<P>,
    P: EventPayload + 'static,
{
    fn handler_name(&self) -> &str {
        self.inner.handler_name()
    }

    async fn handle(&self, ctx: &AppContext, record: &OutboxRecord) -> AppResult<()> {
        let payload = record.payload_as::<P>().map_err(AppError::from)?;
        self.inner.handle(ctx, payload, record).await
    }
}
