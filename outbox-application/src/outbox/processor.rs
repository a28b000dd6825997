//! 投递循环（OutboxProcessor）
//!
//! 单个后台任务按固定间隔轮询 `PENDING` 记录，逐条（顺序）交给处理器并记录结果：
//! - 成功 → `mark_processed`；失败只记日志，不重跑处理器；
//! - 无处理器 / 处理器返回错误 / 处理器 panic → `mark_failed`，计一次重试；
//! - 拉取失败视为瞬时故障，跳过本轮。
//!
//! 状态：`Stopped → Running → Stopped`。重复 `start` 只告警；`stop` 取消下一次轮询并
//! 等待进行中的一轮结束（排空，而非中断）。
//!
use super::handler::EventHandler;
use super::registry::EventHandlerRegistry;
use super::repository::OutboxRepository;
use crate::config::OutboxConfig;
use crate::context::AppContext;
use crate::error::{AppError, AppResult, panic_message};
use futures_util::FutureExt;
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 一轮轮询的结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// 本轮取出的记录数
    pub fetched: usize,
    pub published: usize,
    /// 失败后仍为 `PENDING`
    pub retried: usize,
    /// 失败后被隔离为 `FAILED`
    pub quarantined: usize,
    /// `mark_processed` / `mark_failed` 自身失败的次数
    pub mark_errors: usize,
}

impl PollReport {
    /// 实际处理（成功或失败）的记录数
    pub fn handled(&self) -> usize {
        self.published + self.retried + self.quarantined + self.mark_errors
    }
}

pub struct OutboxProcessor {
    inner: Arc<Inner>,
    running_loop: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    ctx: AppContext,
    config: OutboxConfig,
    repository: Arc<dyn OutboxRepository>,
    registry: Arc<EventHandlerRegistry>,
    running: AtomicBool,
    // 同一时刻至多一轮在执行（后台循环与 poll_once 共用）
    cycle: tokio::sync::Mutex<()>,
}

impl OutboxProcessor {
    pub fn new(
        ctx: AppContext,
        config: OutboxConfig,
        repository: Arc<dyn OutboxRepository>,
        registry: Arc<EventHandlerRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                config,
                repository,
                registry,
                running: AtomicBool::new(false),
                cycle: tokio::sync::Mutex::new(()),
            }),
            running_loop: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// 启动后台轮询；首轮在一个轮询间隔之后执行
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn start(&self) {
        let mut slot = self
            .running_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("outbox processor is already running");
            return;
        }

        self.inner.running.store(true, Ordering::SeqCst);
        let token = CancellationToken::new();
        let task = tokio::spawn(Inner::run(self.inner.clone(), token.clone()));
        *slot = Some(RunningLoop { token, task });

        info!(
            polling_interval_ms = self.inner.config.polling_interval_ms,
            batch_size = self.inner.config.batch_size,
            max_retries = self.inner.config.max_retries,
            "outbox processor started"
        );
    }

    /// 停止后台轮询，并等待进行中的一轮处理完毕后返回
    pub async fn stop(&self) {
        let running = {
            let mut slot = self
                .running_loop
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.inner.running.store(false, Ordering::SeqCst);
            slot.take()
        };

        let Some(RunningLoop { token, task }) = running else {
            return;
        };

        token.cancel();
        if let Err(err) = task.await {
            error!(error = %err, "outbox processor task ended abnormally");
        }
        info!("outbox processor stopped");
    }

    /// 立即执行一轮（不会在批次中途中断）
    pub async fn poll_once(&self) -> AppResult<PollReport> {
        self.inner.cycle(None).await
    }
}

impl Drop for OutboxProcessor {
    fn drop(&mut self) {
        if let Some(running) = self
            .running_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            running.token.cancel();
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, token: CancellationToken) {
        let interval = self.config.polling_interval();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = time::sleep(interval) => {}
            }
            // 拉取失败已在 cycle 内记录，下一轮重试
            let _ = self.cycle(Some(&token)).await;
        }
    }

    /// 一轮轮询；`interrupt` 被取消时在两条记录之间提前结束
    async fn cycle(&self, interrupt: Option<&CancellationToken>) -> AppResult<PollReport> {
        let _guard = self.cycle.lock().await;
        let mut report = PollReport::default();

        let records = match self.repository.find_pending(self.config.batch_size).await {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "failed to fetch pending outbox records");
                return Err(err);
            }
        };
        report.fetched = records.len();
        if records.is_empty() {
            return Ok(report);
        }
        debug!(count = records.len(), "processing outbox batch");

        for record in &records {
            if interrupt.is_some_and(CancellationToken::is_cancelled) {
                debug!(
                    remaining = report.fetched - report.handled(),
                    "outbox processor stopping, leaving rest of batch pending"
                );
                break;
            }
            self.process(record, &mut report).await;
        }

        Ok(report)
    }

    async fn process(&self, record: &OutboxRecord, report: &mut PollReport) {
        let Some(handler) = self.registry.get_handler(record.event_type()) else {
            warn!(
                event_id = record.id(),
                event_type = record.event_type(),
                "no handler registered for outbox event"
            );
            let message = format!("no handler registered for event type {}", record.event_type());
            self.fail(record, &message, report).await;
            return;
        };

        match self.invoke(handler.as_ref(), record).await {
            Ok(()) => match self.repository.mark_processed(record.id()).await {
                Ok(()) => {
                    report.published += 1;
                    debug!(
                        event_id = record.id(),
                        event_type = record.event_type(),
                        handler = handler.handler_name(),
                        "outbox event published"
                    );
                }
                Err(err) => {
                    report.mark_errors += 1;
                    error!(
                        event_id = record.id(),
                        event_type = record.event_type(),
                        error = %err,
                        "failed to mark outbox event processed"
                    );
                }
            },
            Err(err) => {
                warn!(
                    event_id = record.id(),
                    event_type = record.event_type(),
                    retry_count = record.retry_count(),
                    error = %err,
                    "outbox event handler failed"
                );
                self.fail(record, &err.to_string(), report).await;
            }
        }
    }

    /// 处理器的错误与 panic 统一包装为 `AppError::Handler`，`lastError` 因而带上处理器名称
    async fn invoke(&self, handler: &dyn EventHandler, record: &OutboxRecord) -> AppResult<()> {
        let reason = match AssertUnwindSafe(handler.handle(&self.ctx, record))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        Err(AppError::handler(handler.handler_name(), reason))
    }

    async fn fail(&self, record: &OutboxRecord, message: &str, report: &mut PollReport) {
        match self
            .repository
            .mark_failed(record.id(), message, self.config.max_retries)
            .await
        {
            Ok(OutboxStatus::Failed) => {
                report.quarantined += 1;
                warn!(
                    event_id = record.id(),
                    event_type = record.event_type(),
                    retry_count = record.retry_count() + 1,
                    error = message,
                    "outbox event quarantined after exhausting retries"
                );
            }
            Ok(_) => {
                report.retried += 1;
                debug!(
                    event_id = record.id(),
                    retry_count = record.retry_count() + 1,
                    "outbox event left pending for retry"
                );
            }
            Err(err) => {
                report.mark_errors += 1;
                error!(
                    event_id = record.id(),
                    event_type = record.event_type(),
                    error = %err,
                    "failed to mark outbox event failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// 内存中的最小仓储实现，记录调用次数
    #[derive(Default)]
    struct SpyRepository {
        records: Mutex<HashMap<String, OutboxRecord>>,
        find_calls: AtomicUsize,
    }

    impl SpyRepository {
        fn with(records: Vec<OutboxRecord>) -> Arc<Self> {
            let repo = Self::default();
            {
                let mut map = repo.records.lock().unwrap();
                for r in records {
                    map.insert(r.id().to_string(), r);
                }
            }
            Arc::new(repo)
        }

        fn get(&self, id: &str) -> OutboxRecord {
            self.records.lock().unwrap()[id].clone()
        }
    }

    #[async_trait]
    impl OutboxRepository for SpyRepository {
        async fn find_pending(&self, limit: usize) -> AppResult<Vec<OutboxRecord>> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            let mut pending: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.is_pending())
                .cloned()
                .collect();
            pending.sort_by_key(|r| r.occurred_at());
            pending.truncate(limit);
            Ok(pending)
        }

        async fn mark_processed(&self, id: &str) -> AppResult<()> {
            let mut map = self.records.lock().unwrap();
            let record = map.get_mut(id).ok_or_else(|| AppError::NotFound(id.into()))?;
            record.mark_published(Utc::now())?;
            Ok(())
        }

        async fn mark_failed(&self, id: &str, msg: &str, max: u32) -> AppResult<OutboxStatus> {
            let mut map = self.records.lock().unwrap();
            let record = map.get_mut(id).ok_or_else(|| AppError::NotFound(id.into()))?;
            Ok(record.record_failure(msg, max)?)
        }
    }

    struct Outcome(Result<(), &'static str>);

    #[async_trait]
    impl EventHandler for Outcome {
        fn handler_name(&self) -> &str {
            "outcome"
        }

        async fn handle(&self, _ctx: &AppContext, _record: &OutboxRecord) -> AppResult<()> {
            self.0.map_err(|m| AppError::Validation(m.to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        fn handler_name(&self) -> &str {
            "panicking"
        }

        async fn handle(&self, _ctx: &AppContext, _record: &OutboxRecord) -> AppResult<()> {
            panic!("handler exploded")
        }
    }

    fn record(id: &str, event_type: &str, age_secs: i64) -> OutboxRecord {
        OutboxRecord::builder()
            .id(id.into())
            .aggregate_id("agg".into())
            .event_type(event_type.into())
            .payload(serde_json::json!({}))
            .occurred_at(Utc::now() - ChronoDuration::seconds(age_secs))
            .build()
    }

    fn processor(
        repo: Arc<SpyRepository>,
        registry: Arc<EventHandlerRegistry>,
        config: OutboxConfig,
    ) -> OutboxProcessor {
        OutboxProcessor::new(AppContext::default(), config, repo, registry)
    }

    #[tokio::test]
    async fn poll_once_reports_each_outcome() {
        let repo = SpyRepository::with(vec![
            record("ok", "Ok", 4),
            record("bad", "Bad", 3),
            record("orphan", "Orphan", 2),
            record("boom", "Boom", 1),
        ]);
        let registry = Arc::new(EventHandlerRegistry::new());
        registry.register("Ok", Arc::new(Outcome(Ok(()))));
        registry.register("Bad", Arc::new(Outcome(Err("nope"))));
        registry.register("Boom", Arc::new(Panicking));

        let p = processor(repo.clone(), registry, OutboxConfig::default());
        let report = p.poll_once().await.unwrap();

        assert_eq!(
            report,
            PollReport {
                fetched: 4,
                published: 1,
                retried: 3,
                quarantined: 0,
                mark_errors: 0,
            }
        );
        assert_eq!(repo.get("ok").status(), OutboxStatus::Published);
        assert_eq!(
            repo.get("bad").last_error(),
            Some("event handler error: handler=outcome, reason=validation: nope")
        );
        assert!(repo.get("orphan").last_error().unwrap().contains("no handler registered"));
        assert_eq!(
            repo.get("boom").last_error(),
            Some("event handler error: handler=panicking, reason=panicked: handler exploded")
        );
    }

    #[tokio::test]
    async fn zero_max_retries_quarantines_immediately() {
        let repo = SpyRepository::with(vec![record("orphan", "Orphan", 1)]);
        let config = OutboxConfig::builder().max_retries(0).build().unwrap();
        let p = processor(repo.clone(), Arc::new(EventHandlerRegistry::new()), config);

        let report = p.poll_once().await.unwrap();
        assert_eq!(report.quarantined, 1);
        assert_eq!(repo.get("orphan").status(), OutboxStatus::Failed);
        assert_eq!(repo.get("orphan").retry_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_halts_polling() {
        let repo = SpyRepository::with(vec![]);
        let config = OutboxConfig::builder().polling_interval_ms(100).build().unwrap();
        let p = processor(repo.clone(), Arc::new(EventHandlerRegistry::new()), config);

        p.start();
        p.start();
        assert!(p.is_running());

        time::sleep(Duration::from_millis(350)).await;
        p.stop().await;
        assert!(!p.is_running());

        let polls = repo.find_calls.load(Ordering::SeqCst);
        assert_eq!(polls, 3);

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), polls);

        // 已停止时再次 stop 为空操作
        p.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_waits_one_interval() {
        let repo = SpyRepository::with(vec![]);
        let p = processor(repo.clone(), Arc::new(EventHandlerRegistry::new()), OutboxConfig::default());

        p.start();
        time::sleep(Duration::from_millis(999)).await;
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 1);
        p.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_start_and_stop_keep_flag_and_loop_in_sync() {
        let repo = SpyRepository::with(vec![]);
        let p = Arc::new(processor(
            repo,
            Arc::new(EventHandlerRegistry::new()),
            OutboxConfig::default(),
        ));

        for _ in 0..200 {
            let starter = {
                let p = p.clone();
                tokio::spawn(async move { p.start() })
            };
            let stopper = {
                let p = p.clone();
                tokio::spawn(async move { p.stop().await })
            };
            starter.await.unwrap();
            stopper.await.unwrap();

            let has_loop = p.running_loop.lock().unwrap().is_some();
            assert_eq!(p.is_running(), has_loop);
        }
        p.stop().await;
        assert!(!p.is_running());
    }
}
