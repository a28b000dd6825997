use super::handler::{EventHandler, TypedEventHandler};
use super::processor::{OutboxProcessor, PollReport};
use super::registry::EventHandlerRegistry;
use super::repository::OutboxRepository;
use crate::config::OutboxConfig;
use crate::context::AppContext;
use crate::error::AppResult;
use outbox_domain::domain_event::EventPayload;
use std::sync::Arc;

/// Outbox 组合根：持有一个处理器注册表和一个投递循环
///
/// 应用只需构造它、注册处理器，并在启动/关闭时调用 `start`/`stop`。
pub struct OutboxFacade {
    registry: Arc<EventHandlerRegistry>,
    processor: OutboxProcessor,
}

impl OutboxFacade {
    pub fn new(
        ctx: AppContext,
        config: OutboxConfig,
        repository: Arc<dyn OutboxRepository>,
    ) -> AppResult<Self> {
        let config = config.validate()?;
        let registry = Arc::new(EventHandlerRegistry::new());
        let processor = OutboxProcessor::new(ctx, config, repository, registry.clone());
        Ok(Self {
            registry,
            processor,
        })
    }

    pub fn register_handler(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        self.registry.register(event_type, handler)
    }

    pub fn register_typed<P, H>(&self, handler: H) -> Option<Arc<dyn EventHandler>>
    where
        P: EventPayload + 'static,
        H: TypedEventHandler<P> + 'static,
    {
        self.registry.register_typed::<P, H>(handler)
    }

    pub fn registry(&self) -> &EventHandlerRegistry {
        &self.registry
    }

    pub fn start(&self) {
        self.processor.start();
    }

    pub async fn stop(&self) {
        self.processor.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }

    pub async fn poll_once(&self) -> AppResult<PollReport> {
        self.processor.poll_once().await
    }
}
