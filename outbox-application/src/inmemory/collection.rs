use super::store::{InMemoryDocumentStore, InMemoryTransaction};
use crate::context::TxContext;
use crate::error::AppResult;
use outbox_domain::error::DomainError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// 集合的强类型视图：写入走工作单元事务，读取只看已提交数据
pub struct DocumentCollection<T> {
    store: InMemoryDocumentStore,
    name: String,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
            _doc: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> DocumentCollection<T> {
    pub fn new(store: InMemoryDocumentStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            _doc: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, ctx: &TxContext<InMemoryTransaction>, id: &str, doc: &T) -> AppResult<()> {
        let value = serde_json::to_value(doc).map_err(DomainError::from)?;
        self.store.insert(ctx.tx(), &self.name, id, value)
    }

    pub fn find(&self, id: &str) -> AppResult<Option<T>> {
        self.store
            .find(&self.name, id)?
            .map(|value| serde_json::from_value(value).map_err(|e| DomainError::from(e).into()))
            .transpose()
    }

    pub fn count(&self) -> usize {
        self.store.count(&self.name)
    }
}
