//! 批量草稿调度 - 编排层
//!
//! ## 职责
//!
//! 1. **分批**：按 `batch_size` 把草稿列表切成若干批
//! 2. **并发**：每份草稿一个标签页、一个 tokio 任务，用 Semaphore 限制同时打开的标签页
//! 3. **逐批等待**：本批全部结束后才开始下一批
//! 4. **剩余计数**：开始前与每批结束后发布剩余草稿数
//! 5. **关闭标签页**：草稿结束立即关闭，关闭操作串行并间隔停顿
//! 6. **取消**：进行中的草稿记为已取消并关闭标签页，不再开始新批次
//!
//! 单份草稿的失败（包括任务 panic）不会影响同批的其他草稿。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::browser::{BrowserContext, PageDriver};
use crate::config::Config;
use crate::error::BatchError;
use crate::models::{DraftHandle, DraftJobState, DraftOutcome};
use crate::services::StatusHandle;
use crate::utils::logging::{log_batch_complete, log_batch_start, log_drafts_loaded};
use crate::workflow::{DraftCtx, DraftFlow};

const WORKER_ID: &str = "scheduler";

/// 分批计划
#[derive(Debug, Clone)]
pub struct BatchPlan {
    groups: Vec<Vec<DraftHandle>>,
    total: usize,
}

impl BatchPlan {
    pub fn new(drafts: Vec<DraftHandle>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let total = drafts.len();
        let groups = drafts
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self { groups, total }
    }

    pub fn groups(&self) -> &[Vec<DraftHandle>] {
        &self.groups
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// 整次调度的结果
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    /// 按发现顺序排列
    pub outcomes: Vec<DraftJobState>,
    /// 实际启动的各批大小
    pub group_sizes: Vec<usize>,
    pub completed: usize,
    pub failed: usize,
    pub partial: usize,
    pub aborted: usize,
}

impl BatchSummary {
    fn record(&mut self, state: DraftJobState) {
        match state.outcome {
            DraftOutcome::Completed => self.completed += 1,
            DraftOutcome::Partial => self.partial += 1,
            DraftOutcome::Aborted => self.aborted += 1,
            DraftOutcome::Failed | DraftOutcome::Pending | DraftOutcome::InProgress => {
                self.failed += 1
            }
        }
        self.outcomes.push(state);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// 批量调度器
pub struct BatchScheduler {
    flow: Arc<DraftFlow>,
    status: StatusHandle,
    batch_size: usize,
    tab_close_settle: Duration,
    cancel: CancellationToken,
}

impl BatchScheduler {
    pub fn new(config: &Config, flow: Arc<DraftFlow>, cancel: CancellationToken) -> Self {
        Self {
            status: flow.status().clone(),
            flow,
            batch_size: config.batch_size.max(1),
            tab_close_settle: config.timings.tab_close_settle(),
            cancel,
        }
    }

    /// 处理所有草稿
    pub async fn run<C: BrowserContext>(&self, context: &C, drafts: Vec<DraftHandle>) -> BatchSummary {
        let plan = BatchPlan::new(drafts, self.batch_size);
        let total_batches = plan.groups().len();
        let mut remaining = plan.total();
        let mut summary = BatchSummary::default();

        self.status.set_remaining(remaining).await;
        log_drafts_loaded(plan.total(), self.batch_size);

        let semaphore = Arc::new(Semaphore::new(self.batch_size));
        let close_gate = Arc::new(Mutex::new(()));

        for (batch_idx, group) in plan.groups().iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("⏹️ 运行已取消，剩余 {} 份草稿不再处理", remaining);
                for handle in plan.groups()[batch_idx..].iter().flatten() {
                    summary.record(DraftJobState::finished(
                        handle.clone(),
                        DraftOutcome::Aborted,
                        Some("运行已取消".to_string()),
                    ));
                }
                break;
            }

            let batch_num = batch_idx + 1;
            let first = group.first().map(|h| h.index).unwrap_or_default();
            let last = group.last().map(|h| h.index).unwrap_or_default();
            log_batch_start(batch_num, total_batches, first, last, plan.total());
            self.status
                .publish(
                    WORKER_ID,
                    format!("第 {}/{} 批: 草稿 {}-{}", batch_num, total_batches, first, last),
                )
                .await;

            let mut batch = BatchSummary::default();
            let mut handles = Vec::new();

            for handle in group {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        batch.record(self.failed_before_start(handle, e.to_string()));
                        continue;
                    }
                };

                let page = match context.new_page().await {
                    Ok(page) => page,
                    Err(e) => {
                        error!("[草稿 {}] ❌ 无法打开标签页: {}", handle.index, e);
                        batch.record(self.failed_before_start(handle, e.to_string()));
                        continue;
                    }
                };

                let page = Arc::new(page);
                let flow = self.flow.clone();
                let status = self.status.clone();
                let cancel = self.cancel.clone();
                let gate = close_gate.clone();
                let settle = self.tab_close_settle;
                let handle = handle.clone();
                let task_handle = handle.clone();
                let task_page = page.clone();

                let task = tokio::spawn(async move {
                    let _permit = permit;
                    let ctx = DraftCtx::new(task_handle.clone());

                    let state = tokio::select! {
                        state = flow.advance_draft(&*task_page, &ctx) => state,
                        _ = cancel.cancelled() => {
                            warn!("{} ⏹️ 已取消", ctx);
                            status.publish(&ctx.worker_id, "已取消").await;
                            DraftJobState::finished(
                                task_handle,
                                DraftOutcome::Aborted,
                                Some("运行已取消".to_string()),
                            )
                        }
                    };

                    close_tab(&*task_page, &gate, settle, &ctx).await;
                    state
                });
                handles.push((handle, page, task));
            }

            // 等待本批所有任务完成
            for (handle, page, task) in handles {
                match task.await {
                    Ok(state) => batch.record(state),
                    Err(e) => {
                        error!("[草稿 {}] 任务执行失败: {}", handle.index, e);
                        // 任务没能自己关闭标签页
                        let ctx = DraftCtx::new(handle.clone());
                        close_tab(&*page, &close_gate, self.tab_close_settle, &ctx).await;
                        let reason = BatchError::TaskAborted {
                            draft_index: handle.index,
                            reason: e.to_string(),
                        };
                        batch.record(DraftJobState::finished(
                            handle,
                            DraftOutcome::Failed,
                            Some(reason.to_string()),
                        ));
                    }
                }
            }

            remaining = remaining.saturating_sub(group.len());
            self.status.set_remaining(remaining).await;
            log_batch_complete(batch_num, batch.completed, batch.total());

            summary.group_sizes.push(group.len());
            summary.completed += batch.completed;
            summary.failed += batch.failed;
            summary.partial += batch.partial;
            summary.aborted += batch.aborted;
            summary.outcomes.extend(batch.outcomes);
        }

        summary
            .outcomes
            .sort_by_key(|state| state.handle.index);
        summary
    }

    fn failed_before_start(&self, handle: &DraftHandle, reason: String) -> DraftJobState {
        let error = BatchError::TabUnavailable {
            draft_index: handle.index,
            reason,
        };
        DraftJobState::finished(handle.clone(), DraftOutcome::Failed, Some(error.to_string()))
    }
}

/// 串行关闭标签页，每次关闭后停顿
async fn close_tab(page: &dyn PageDriver, gate: &Mutex<()>, settle: Duration, ctx: &DraftCtx) {
    let _guard = gate.lock().await;
    if let Err(e) = page.close().await {
        warn!("{} 关闭标签页失败: {}", ctx, e);
    }
    sleep(settle).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeContext;
    use crate::config::Timings;
    use crate::services::status::{StatusChannel, DEFAULT_CAPACITY};
    use crate::services::DiagnosticSink;
    use crate::workflow::sections::editor;

    fn drafts(n: usize) -> Vec<DraftHandle> {
        (1..=n)
            .map(|i| DraftHandle::new(format!("https://apps.trac.jobs/application/{}/form", 1000 + i), i))
            .collect()
    }

    fn scheduler(config: &Config, dir: &std::path::Path, cancel: CancellationToken) -> (BatchScheduler, StatusHandle) {
        let (status, _task) = StatusChannel::spawn(DEFAULT_CAPACITY, true);
        let flow = DraftFlow::new(config, status.clone(), Arc::new(DiagnosticSink::new(dir)));
        (BatchScheduler::new(config, Arc::new(flow), cancel), status)
    }

    fn test_config() -> Config {
        Config {
            timings: Timings::instant(),
            ..Config::default()
        }
    }

    #[test]
    fn test_plan_partitions_in_order() {
        let plan = BatchPlan::new(drafts(12), 5);
        assert_eq!(plan.group_sizes(), vec![5, 5, 2]);
        assert_eq!(plan.groups()[1][0].index, 6);

        assert_eq!(BatchPlan::new(drafts(10), 5).group_sizes(), vec![5, 5]);
        assert!(BatchPlan::new(Vec::new(), 5).groups().is_empty());
        assert_eq!(BatchPlan::new(drafts(3), 0).group_sizes(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_twelve_drafts_in_groups_of_five() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let (scheduler, status) = scheduler(&config, dir.path(), CancellationToken::new());
        let context = FakeContext::new();

        let summary = scheduler.run(&context, drafts(12)).await;
        status.flush().await;

        assert_eq!(summary.group_sizes, vec![5, 5, 2]);
        assert_eq!(summary.completed, 12);
        assert_eq!(summary.total(), 12);
        assert_eq!(status.snapshot().remaining_trail(), vec![12, 7, 2, 0]);

        let gauge = context.gauge();
        assert!(gauge.peak() <= 5);
        assert_eq!(gauge.open(), 0);
        assert!(context.pages().iter().all(|p| p.is_closed()));

        let indexes: Vec<usize> = summary.outcomes.iter().map(|s| s.handle.index).collect();
        assert_eq!(indexes, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let (scheduler, _status) = scheduler(&config, dir.path(), CancellationToken::new());
        let context = FakeContext::with_setup(|index, page| {
            if index == 1 {
                page.hide(&editor("persdetails"));
            }
        });

        let summary = scheduler.run(&context, drafts(3)).await;
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outcomes[1].outcome, DraftOutcome::Failed);
        assert!(context.pages().iter().all(|p| p.is_closed()));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_opens_no_tabs() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (scheduler, _status) = scheduler(&config, dir.path(), cancel);
        let context = FakeContext::new();

        let summary = scheduler.run(&context, drafts(7)).await;
        assert_eq!(summary.aborted, 7);
        assert!(summary.group_sizes.is_empty());
        assert!(context.pages().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_aborts_and_closes_tabs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            timings: Timings {
                draft_open_settle_ms: 30_000,
                ..Timings::instant()
            },
            batch_size: 2,
            ..Config::default()
        };
        let cancel = CancellationToken::new();
        let (scheduler, status) = scheduler(&config, dir.path(), cancel.clone());
        let context = FakeContext::new();

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let summary = scheduler.run(&context, drafts(5)).await;
        canceller.await.unwrap();
        status.flush().await;

        assert_eq!(summary.aborted, 5);
        assert_eq!(summary.group_sizes, vec![2]);
        assert_eq!(context.pages().len(), 2);
        assert_eq!(context.gauge().open(), 0);
        assert_eq!(status.snapshot().entries["draft-1"], "已取消");
    }
}
