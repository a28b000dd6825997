mod handler;
mod prompt;
mod use_case;

use handler::PromptCreatedHandler;
use outbox_application::context::AppContext;
use outbox_application::inmemory::{
    DocumentCollection, InMemoryDocumentStore, InMemoryOutboxRepository,
    InMemoryTransactionManager,
};
use outbox_application::{OutboxConfig, OutboxFacade, UnitOfWork, UnitOfWorkConfig};
use outbox_domain::domain_event::BusinessContext;
use prompt::PromptCreated;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use use_case::{CreatePrompt, CreatePromptUseCase};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let outbox_config = OutboxConfig::from_env()?;
    let uow_config = UnitOfWorkConfig::from_env()?;

    let store = InMemoryDocumentStore::new();
    let outbox_repo = Arc::new(InMemoryOutboxRepository::new(store.clone()));
    let create_prompt = CreatePromptUseCase::new(
        UnitOfWork::new(InMemoryTransactionManager::new(store.clone()), uow_config),
        DocumentCollection::new(store.clone(), "prompts"),
        outbox_repo.clone(),
    );

    let outbox = OutboxFacade::new(
        AppContext::new(BusinessContext::system("outbox-processor")),
        outbox_config,
        outbox_repo.clone(),
    )?;
    let handler = PromptCreatedHandler::default();
    outbox.register_typed::<PromptCreated, _>(handler.clone());
    outbox.start();

    let ctx = AppContext::new(
        BusinessContext::builder()
            .maybe_actor_type(Some("user".into()))
            .maybe_actor_id(Some("u-42".into()))
            .build(),
    );
    let requests = [
        ("Rust error handling", "Explain thiserror vs anyhow with examples."),
        ("Async cancellation", "How does tokio::select! drop the losing branch?"),
        ("", "A prompt without a title is rejected."),
    ];
    let mut created = 0;
    for (title, content) in requests {
        let cmd = CreatePrompt {
            title: title.to_string(),
            content: content.to_string(),
            author_id: "u-42".to_string(),
        };
        match create_prompt.execute(&ctx, cmd).await {
            Ok(_) => created += 1,
            Err(err) => warn!(error = %err, "prompt rejected"),
        }
    }

    let wait = outbox_config.polling_interval() * 5;
    let delivered = tokio::time::timeout(wait, async {
        while handler.delivered() < created {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if delivered.is_err() {
        warn!(
            delivered = handler.delivered(),
            expected = created,
            "not every event was delivered in time"
        );
    }

    outbox.stop().await;
    info!(
        prompts = store.count("prompts"),
        delivered = handler.delivered(),
        "demo finished"
    );
    Ok(())
}
