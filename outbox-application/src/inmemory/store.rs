//! 内存文档存储（InMemoryDocumentStore）
//!
//! - 命名集合，集合内为按 id 索引的 JSON 文档；克隆共享同一份数据；
//! - 事务内写入先暂存，提交时整体生效（任一文档 id 冲突则整体失败）；
//! - 回滚丢弃暂存写入；超过开启时给定的时长后提交失败；
//! - 记录未释放的事务数，并支持一次性故障注入（`fail_next`）。
//!
use crate::error::{AppError, AppResult};
use crate::unit_of_work::TransactionManager;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// 可注入故障的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    Commit,
    Abort,
    /// 事务内写入
    Insert,
    /// 读取（单条或整个集合）
    Find,
    /// 事务外的单文档更新
    Update,
}

/// 事务句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryTransaction {
    id: u64,
}

impl InMemoryTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<String, BTreeMap<String, Value>>,
    transactions: HashMap<u64, TxState>,
    next_tx: u64,
    faults: Vec<FaultPoint>,
}

#[derive(Debug)]
struct TxState {
    staged: Vec<StagedInsert>,
    deadline: Instant,
    timeout: Duration,
    active: bool,
}

#[derive(Debug)]
struct StagedInsert {
    collection: String,
    id: String,
    document: Value,
}

impl StoreState {
    fn trip(&mut self, point: FaultPoint) -> AppResult<()> {
        match self.faults.iter().position(|p| *p == point) {
            Some(idx) => {
                self.faults.remove(idx);
                Err(AppError::infra(format!("injected fault at {point:?}")))
            }
            None => Ok(()),
        }
    }

    fn active_tx(&mut self, tx: &InMemoryTransaction) -> AppResult<&mut TxState> {
        match self.transactions.get_mut(&tx.id) {
            Some(state) if state.active => Ok(state),
            _ => Err(AppError::infra(format!("transaction {} is not active", tx.id))),
        }
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 让下一次到达 `point` 的操作失败（一次性）
    pub fn fail_next(&self, point: FaultPoint) {
        self.lock().faults.push(point);
    }

    /// 已开启但尚未释放的事务数
    pub fn open_transactions(&self) -> usize {
        self.lock().transactions.len()
    }

    /// 集合中已提交的文档数
    pub fn count(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn begin(&self, timeout: Duration) -> AppResult<InMemoryTransaction> {
        let mut state = self.lock();
        state.trip(FaultPoint::Begin)?;
        state.next_tx += 1;
        let id = state.next_tx;
        state.transactions.insert(
            id,
            TxState {
                staged: Vec::new(),
                deadline: Instant::now() + timeout,
                timeout,
                active: true,
            },
        );
        Ok(InMemoryTransaction { id })
    }

    /// 在事务内暂存一次写入，提交前对其他读者不可见
    pub fn insert(
        &self,
        tx: &InMemoryTransaction,
        collection: &str,
        id: impl Into<String>,
        document: Value,
    ) -> AppResult<()> {
        let mut state = self.lock();
        state.trip(FaultPoint::Insert)?;
        state.active_tx(tx)?.staged.push(StagedInsert {
            collection: collection.to_string(),
            id: id.into(),
            document,
        });
        Ok(())
    }

    pub fn commit(&self, tx: &InMemoryTransaction) -> AppResult<()> {
        let mut state = self.lock();
        state.trip(FaultPoint::Commit)?;
        let tx_state = state.active_tx(tx)?;
        tx_state.active = false;
        let staged = std::mem::take(&mut tx_state.staged);

        if Instant::now() > tx_state.deadline {
            return Err(AppError::transaction(
                "commit",
                format!(
                    "transaction {} exceeded its {}ms limit",
                    tx.id,
                    tx_state.timeout.as_millis()
                ),
            ));
        }

        let mut seen = HashSet::new();
        for write in &staged {
            let exists = state
                .collections
                .get(&write.collection)
                .is_some_and(|docs| docs.contains_key(&write.id));
            if exists || !seen.insert((write.collection.as_str(), write.id.as_str())) {
                return Err(AppError::infra(format!(
                    "duplicate id {} in collection {}",
                    write.id, write.collection
                )));
            }
        }

        for write in staged {
            state
                .collections
                .entry(write.collection)
                .or_default()
                .insert(write.id, write.document);
        }
        Ok(())
    }

    pub fn abort(&self, tx: &InMemoryTransaction) -> AppResult<()> {
        let mut state = self.lock();
        state.trip(FaultPoint::Abort)?;
        let tx_state = state.active_tx(tx)?;
        tx_state.active = false;
        tx_state.staged.clear();
        Ok(())
    }

    /// 释放事务；未提交的写入一并丢弃
    pub fn release(&self, tx: &InMemoryTransaction) {
        self.lock().transactions.remove(&tx.id);
    }

    pub fn find(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let mut state = self.lock();
        state.trip(FaultPoint::Find)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    /// 集合内全部已提交文档，连同其键
    pub fn documents(&self, collection: &str) -> AppResult<Vec<(String, Value)>> {
        let mut state = self.lock();
        state.trip(FaultPoint::Find)?;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default())
    }

    /// 在锁内对单个文档做读-改-写；文档不存在返回 `Ok(None)`，`f` 失败时文档保持不变
    pub fn update<R>(
        &self,
        collection: &str,
        id: &str,
        f: impl FnOnce(&mut Value) -> AppResult<R>,
    ) -> AppResult<Option<R>> {
        let mut state = self.lock();
        state.trip(FaultPoint::Update)?;
        let Some(current) = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(None);
        };

        let mut draft = current.clone();
        let out = f(&mut draft)?;
        *current = draft;
        Ok(Some(out))
    }
}

/// 基于 `InMemoryDocumentStore` 的事务原语
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionManager {
    store: InMemoryDocumentStore,
}

impl InMemoryTransactionManager {
    pub fn new(store: InMemoryDocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryDocumentStore {
        &self.store
    }
}

#[async_trait]
impl TransactionManager for InMemoryTransactionManager {
    type Tx = InMemoryTransaction;

    async fn begin(&self, timeout: Duration) -> AppResult<InMemoryTransaction> {
        self.store.begin(timeout)
    }

    async fn commit(&self, tx: &InMemoryTransaction) -> AppResult<()> {
        self.store.commit(tx)
    }

    async fn abort(&self, tx: &InMemoryTransaction) -> AppResult<()> {
        self.store.abort(tx)
    }

    async fn release(&self, tx: InMemoryTransaction) {
        self.store.release(&tx);
    }
}
