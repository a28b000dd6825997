use crate::prompt::Prompt;
use outbox_application::context::AppContext;
use outbox_application::error::AppResult;
use outbox_application::inmemory::{
    DocumentCollection, InMemoryOutboxRepository, InMemoryTransactionManager,
};
use outbox_application::outbox::TransactionalOutboxRepository;
use outbox_application::UnitOfWork;
use outbox_domain::aggregate::Aggregate;
use std::sync::Arc;
use tracing::info;

pub struct CreatePrompt {
    pub title: String,
    pub content: String,
    pub author_id: String,
}

/// 在一个工作单元内保存提示词并写入其事件
pub struct CreatePromptUseCase {
    unit_of_work: UnitOfWork<InMemoryTransactionManager>,
    prompts: DocumentCollection<Prompt>,
    outbox: Arc<InMemoryOutboxRepository>,
}

impl CreatePromptUseCase {
    pub fn new(
        unit_of_work: UnitOfWork<InMemoryTransactionManager>,
        prompts: DocumentCollection<Prompt>,
        outbox: Arc<InMemoryOutboxRepository>,
    ) -> Self {
        Self {
            unit_of_work,
            prompts,
            outbox,
        }
    }

    pub async fn execute(&self, ctx: &AppContext, cmd: CreatePrompt) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let prompt = Prompt::create(id.clone(), &cmd.title, &cmd.content, &cmd.author_id)?;
        let title = prompt.title().to_string();

        let prompts = self.prompts.clone();
        let outbox = self.outbox.clone();
        let prompt_id = id.clone();
        self.unit_of_work
            .execute(ctx, |tx| async move {
                let mut prompt = prompt;
                prompts.insert(&tx, &prompt_id, &prompt)?;
                outbox.insert_many(&tx, prompt.pull_events()).await
            })
            .await?;

        info!(prompt_id = %id, title = %title, "prompt created");
        Ok(id)
    }
}
