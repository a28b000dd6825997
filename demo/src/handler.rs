use crate::prompt::PromptCreated;
use async_trait::async_trait;
use outbox_application::context::AppContext;
use outbox_application::error::AppResult;
use outbox_application::outbox::TypedEventHandler;
use outbox_domain::outbox::OutboxRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// 新提示词通知：演示中只记录日志并计数
#[derive(Clone, Default)]
pub struct PromptCreatedHandler {
    delivered: Arc<AtomicUsize>,
}

impl PromptCreatedHandler {
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedEventHandler<PromptCreated> for PromptCreatedHandler {
    async fn handle(
        &self,
        _ctx: &AppContext,
        payload: PromptCreated,
        record: &OutboxRecord,
    ) -> AppResult<()> {
        info!(
            event_id = record.id(),
            prompt_id = %payload.prompt_id,
            author_id = %payload.author_id,
            title = %payload.title,
            "new prompt published"
        );
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
