use super::store::{InMemoryDocumentStore, InMemoryTransaction};
use crate::context::TxContext;
use crate::error::{AppError, AppResult};
use crate::outbox::{OutboxRepository, TransactionalOutboxRepository};
use async_trait::async_trait;
use chrono::Utc;
use outbox_domain::domain_event::DomainEvent;
use outbox_domain::error::DomainError;
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};
use serde_json::{Value, json};
use tracing::warn;

/// 基于内存文档存储的 outbox 仓储，文档为驼峰命名的持久化形态
#[derive(Debug, Clone)]
pub struct InMemoryOutboxRepository {
    store: InMemoryDocumentStore,
    collection: String,
}

impl InMemoryOutboxRepository {
    pub const DEFAULT_COLLECTION: &'static str = "outbox";

    pub fn new(store: InMemoryDocumentStore) -> Self {
        Self::with_collection(store, Self::DEFAULT_COLLECTION)
    }

    pub fn with_collection(store: InMemoryDocumentStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// 读取单条记录（任意状态）
    pub fn get(&self, id: &str) -> AppResult<Option<OutboxRecord>> {
        self.store.find(&self.collection, id)?.map(decode).transpose()
    }

    /// 读取全部记录，按 `occurred_at` 升序
    pub fn all(&self) -> AppResult<Vec<OutboxRecord>> {
        let mut records = self
            .store
            .documents(&self.collection)?
            .into_iter()
            .map(|(_, doc)| decode(doc))
            .collect::<AppResult<Vec<_>>>()?;
        records.sort_by_key(OutboxRecord::occurred_at);
        Ok(records)
    }

    /// 将无法解码的待投递文档直接置为 `FAILED`，使其不再占用批次
    fn quarantine_undecodable(&self, id: &str, doc: &Value, err: &AppError) -> AppResult<()> {
        let status = doc.get("status").and_then(Value::as_str);
        if status.is_some_and(|s| s != OutboxStatus::Pending.as_str()) {
            return Ok(());
        }
        warn!(
            event_id = id,
            collection = %self.collection,
            error = %err,
            "quarantining undecodable outbox document"
        );
        let last_error = format!("undecodable outbox document: {err}");
        self.store.update(&self.collection, id, |doc| {
            match doc {
                Value::Object(fields) => {
                    fields.insert("status".into(), OutboxStatus::Failed.as_str().into());
                    fields.insert("lastError".into(), last_error.into());
                }
                other => {
                    *other = json!({
                        "id": id,
                        "status": OutboxStatus::Failed.as_str(),
                        "lastError": last_error,
                    });
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    fn modify<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut OutboxRecord) -> Result<R, DomainError>,
    ) -> AppResult<R> {
        self.store
            .update(&self.collection, id, |doc| {
                let mut record = decode(doc.clone())?;
                let out = f(&mut record)?;
                *doc = encode(&record)?;
                Ok(out)
            })?
            .ok_or_else(|| AppError::NotFound(format!("outbox record {id}")))
    }
}

fn decode(value: Value) -> AppResult<OutboxRecord> {
    Ok(serde_json::from_value(value).map_err(DomainError::from)?)
}

fn encode(record: &OutboxRecord) -> AppResult<Value> {
    Ok(serde_json::to_value(record).map_err(DomainError::from)?)
}

#[async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn find_pending(&self, limit: usize) -> AppResult<Vec<OutboxRecord>> {
        let mut pending = Vec::new();
        for (id, doc) in self.store.documents(&self.collection)? {
            match decode(doc.clone()) {
                Ok(record) if record.is_pending() => pending.push(record),
                Ok(_) => {}
                Err(err) => self.quarantine_undecodable(&id, &doc, &err)?,
            }
        }
        pending.sort_by_key(OutboxRecord::occurred_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(&self, id: &str) -> AppResult<()> {
        self.modify(id, |record| record.mark_published(Utc::now()))
    }

    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        max_retries: u32,
    ) -> AppResult<OutboxStatus> {
        self.modify(id, |record| record.record_failure(error_message, max_retries))
    }
}

#[async_trait]
impl TransactionalOutboxRepository for InMemoryOutboxRepository {
    type Tx = InMemoryTransaction;

    async fn insert_many(
        &self,
        ctx: &TxContext<InMemoryTransaction>,
        events: Vec<DomainEvent>,
    ) -> AppResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        for event in &events {
            let record = OutboxRecord::from_event(event);
            self.store
                .insert(ctx.tx(), &self.collection, record.id(), encode(&record)?)?;
        }
        Ok(())
    }
}
