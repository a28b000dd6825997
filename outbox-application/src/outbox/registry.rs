use super::handler::{EventHandler, Typed, TypedEventHandler};
use dashmap::DashMap;
use outbox_domain::domain_event::EventPayload;
use std::sync::Arc;

/// 事件类型名 → 处理器 的内存映射
/// - 同一类型后注册者覆盖先注册者
/// - 不持久化，跨类型无顺序保证
#[derive(Default)]
pub struct EventHandlerRegistry {
    handlers: DashMap<String, Arc<dyn EventHandler>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，返回被覆盖的旧处理器（若有）
    pub fn register(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        self.handlers.insert(event_type.into(), handler)
    }

    /// 以 `P::NAME` 为键注册强类型处理器
    pub fn register_typed<P, H>(&self, handler: H) -> Option<Arc<dyn EventHandler>>
    where
        P: EventPayload + 'static,
        H: TypedEventHandler<P> + 'static,
    {
        self.register(P::NAME, Arc::new(Typed::<H, P>::new(handler)))
    }

    pub fn get_handler(&self, event_type: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(event_type).map(|h| h.value().clone())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 已注册的事件类型（按字典序）
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for EventHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
