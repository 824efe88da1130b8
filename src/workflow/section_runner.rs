//! 分区执行器 - 流程层
//!
//! 按标记逐步执行一个分区。某一步失败时刷新页面、停顿，
//! 然后从失败的标记继续，直到达到最大尝试次数。

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::config::Timings;
use crate::error::{AppResult, SectionError};
use crate::models::{SectionReport, SectionStatus};
use crate::services::StatusHandle;
use crate::workflow::markers::Marker;

/// 执行步骤所需的环境
pub struct StepEnv<'a> {
    pub page: &'a dyn PageDriver,
    pub timings: &'a Timings,
    pub status: &'a StatusHandle,
    pub worker_id: &'a str,
}

impl StepEnv<'_> {
    /// 发布当前任务的状态
    pub async fn report(&self, message: impl Into<String>) {
        self.status.publish(self.worker_id, message).await;
    }
}

/// 一个分区的步骤协议
///
/// `perform` 每次只执行一个标记对应的页面操作。
#[async_trait]
pub trait SectionProtocol: Send {
    type Marker: Marker;

    fn key(&self) -> &str;

    async fn perform(&mut self, env: &StepEnv<'_>, marker: Self::Marker) -> AppResult<()>;
}

/// 分区进度（恢复游标）
#[derive(Debug, Clone)]
pub struct SectionProgress<M> {
    pub key: String,
    pub marker: M,
    pub attempts: u32,
    pub status: SectionStatus,
}

impl<M: Marker> SectionProgress<M> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            marker: M::START,
            attempts: 0,
            status: SectionStatus::Pending,
        }
    }

    pub fn into_report(self) -> SectionReport {
        SectionReport {
            key: self.key,
            status: self.status,
            attempts: self.attempts,
            last_marker: self.marker.to_string(),
        }
    }
}

/// 执行分区直到完成或尝试次数耗尽
pub async fn run_section<S: SectionProtocol>(
    section: &mut S,
    env: &StepEnv<'_>,
    progress: &mut SectionProgress<S::Marker>,
    max_attempts: u32,
) -> AppResult<()> {
    let max_attempts = max_attempts.max(1);

    loop {
        progress.attempts += 1;
        debug!(
            "[{}] 分区 {} 第 {}/{} 次尝试，从 {} 开始",
            env.worker_id, progress.key, progress.attempts, max_attempts, progress.marker
        );

        let error = match drive(section, env, progress).await {
            Ok(()) => {
                progress.status = SectionStatus::Completed;
                info!("[{}] ✓ 分区 {} 完成", env.worker_id, progress.key);
                env.report(format!("分区 {} 完成", progress.key)).await;
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(
            "[{}] ⚠️ 分区 {} 在 {} 失败 (第 {}/{} 次): {}",
            env.worker_id, progress.key, progress.marker, progress.attempts, max_attempts, error
        );
        env.report(format!(
            "分区 {} 在 {} 失败 (第 {}/{} 次): {}",
            progress.key, progress.marker, progress.attempts, max_attempts, error
        ))
        .await;

        // 每次失败后都刷新，让下一个分区面对干净的页面
        if let Err(e) = env.page.reload().await {
            warn!("[{}] 刷新页面失败: {}", env.worker_id, e);
        }
        sleep(env.timings.retry_settle()).await;

        if progress.attempts >= max_attempts || !error.is_retryable() {
            progress.status = SectionStatus::Failed;
            return Err(SectionError::AttemptsExhausted {
                section: progress.key.clone(),
                marker: progress.marker.to_string(),
                attempts: progress.attempts,
                reason: error.to_string(),
            }
            .into());
        }
    }
}

/// 从当前标记走到 COMPLETE，每完成一步推进一次游标
async fn drive<S: SectionProtocol>(
    section: &mut S,
    env: &StepEnv<'_>,
    progress: &mut SectionProgress<S::Marker>,
) -> AppResult<()> {
    while !progress.marker.is_complete() {
        section.perform(env, progress.marker).await?;
        progress.marker = progress.marker.next();
    }
    Ok(())
}
