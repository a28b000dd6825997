#![allow(dead_code)]

use async_trait::async_trait;
use outbox_application::context::AppContext;
use outbox_application::error::{AppError, AppResult};
use outbox_application::inmemory::{
    DocumentCollection, InMemoryDocumentStore, InMemoryOutboxRepository, InMemoryTransaction,
    InMemoryTransactionManager,
};
use outbox_application::outbox::{
    EventHandler, OutboxRepository, TransactionalOutboxRepository, TypedEventHandler,
};
use outbox_application::{UnitOfWork, UnitOfWorkConfig};
use outbox_domain::aggregate::Aggregate;
use outbox_domain::entity::Entity;
use outbox_domain::error::DomainResult;
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};
use outbox_macros::{aggregate, domain_event};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[aggregate(id = String, name = "note")]
#[derive(Debug, Clone)]
pub struct Note {
    pub text: String,
}

#[domain_event(name = "note.written")]
#[derive(Debug, Clone, PartialEq)]
pub struct NoteWritten {
    pub text: String,
}

impl Note {
    pub fn write(id: &str, text: &str) -> DomainResult<Self> {
        let mut note = Note::new(id.to_string());
        note.text = text.to_string();
        note.record_event(&NoteWritten {
            text: text.to_string(),
        })?;
        Ok(note)
    }
}

/// 一套共享同一存储的内存组件
pub struct Harness {
    pub store: InMemoryDocumentStore,
    pub uow: UnitOfWork<InMemoryTransactionManager>,
    pub notes: DocumentCollection<Note>,
    pub outbox: Arc<InMemoryOutboxRepository>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(UnitOfWorkConfig::default())
    }

    pub fn with_timeout(config: UnitOfWorkConfig) -> Self {
        let store = InMemoryDocumentStore::new();
        Self {
            uow: UnitOfWork::new(InMemoryTransactionManager::new(store.clone()), config),
            notes: DocumentCollection::new(store.clone(), "notes"),
            outbox: Arc::new(InMemoryOutboxRepository::new(store.clone())),
            store,
        }
    }

    /// 在一个工作单元内保存笔记并写入其事件
    pub async fn write_note(&self, id: &str, text: &str) -> AppResult<()> {
        let note = Note::write(id, text)?;
        let notes = self.notes.clone();
        let outbox = self.outbox.clone();
        self.uow
            .execute(&AppContext::default(), |tx| async move {
                let mut note = note;
                notes.insert(&tx, note.id(), &note)?;
                outbox.insert_many(&tx, note.pull_events()).await
            })
            .await
    }

    pub fn records(&self) -> Vec<OutboxRecord> {
        self.outbox.all().unwrap()
    }

    pub fn record(&self, id: &str) -> OutboxRecord {
        self.outbox.get(id).unwrap().unwrap()
    }
}

/// 统计 `find_pending` 调用次数的仓储包装
pub struct CountingRepository {
    pub inner: Arc<InMemoryOutboxRepository>,
    pub finds: AtomicUsize,
}

impl CountingRepository {
    pub fn new(inner: Arc<InMemoryOutboxRepository>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            finds: AtomicUsize::new(0),
        })
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutboxRepository for CountingRepository {
    async fn find_pending(&self, limit: usize) -> AppResult<Vec<OutboxRecord>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_pending(limit).await
    }

    async fn mark_processed(&self, id: &str) -> AppResult<()> {
        self.inner.mark_processed(id).await
    }

    async fn mark_failed(&self, id: &str, msg: &str, max: u32) -> AppResult<OutboxStatus> {
        self.inner.mark_failed(id, msg, max).await
    }
}

/// 记录收到的笔记内容；`fail` 为真时返回业务错误
#[derive(Default)]
pub struct NoteSpy {
    pub seen: Mutex<Vec<String>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

#[async_trait]
impl TypedEventHandler<NoteWritten> for Arc<NoteSpy> {
    fn handler_name(&self) -> &str {
        "note-spy"
    }

    async fn handle(
        &self,
        _ctx: &AppContext,
        payload: NoteWritten,
        _record: &OutboxRecord,
    ) -> AppResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.seen.lock().unwrap().push(payload.text);
        if self.fail {
            return Err(AppError::Validation("note rejected".into()));
        }
        Ok(())
    }
}

/// 总是成功的无类型处理器
pub struct Accept;

#[async_trait]
impl EventHandler for Accept {
    async fn handle(&self, _ctx: &AppContext, _record: &OutboxRecord) -> AppResult<()> {
        Ok(())
    }
}

pub type NoteTx = InMemoryTransaction;
