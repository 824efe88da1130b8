//! 应用生命周期 - 编排层
//!
//! 1. **初始化**：写日志表头、连接或启动浏览器
//! 2. **运行**：状态通道 → 登录 → 发现草稿 → 批量调度 → 统计
//! 3. **清理**：由本程序启动的浏览器在结束时关闭

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::{self, BrowserContext, BrowserMode, PageDriver};
use crate::config::Config;
use crate::infrastructure::ChromiumContext;
use crate::models::{Credentials, DraftHandle};
use crate::orchestrator::batch_processor::{BatchScheduler, BatchSummary};
use crate::services::status::{spawn_console_observer, DEFAULT_CAPACITY};
use crate::services::{
    CredentialPrompt, DiagnosticSink, DraftDiscovery, LlmDocumentGenerator, NonInteractivePrompt,
    SessionManager, StatusChannel, StatusHandle, TerminalPrompt,
};
use crate::utils::logging::{
    append_outcomes, init_log_file, log_startup, print_final_stats, FinalStats,
};
use crate::workflow::DraftFlow;

/// 一次运行的结果
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// 登录后实际使用的账号
    pub identifier: String,
    pub drafts_found: usize,
    pub summary: BatchSummary,
}

/// 应用主结构
pub struct App {
    config: Config,
    context: ChromiumContext,
    handler: JoinHandle<()>,
    mode: BrowserMode,
    diagnostics: Arc<DiagnosticSink>,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, cancel: CancellationToken) -> Result<Self> {
        init_log_file(&config.output_log_file).context("无法初始化日志文件")?;
        log_startup(&config);

        let (browser, handler, mode) = browser::open_browser(&config)
            .await
            .context("无法连接或启动浏览器")?;
        info!("✓ 浏览器已就绪 ({:?})", mode);

        let context = ChromiumContext::new(browser, config.headless);
        let diagnostics = Arc::new(DiagnosticSink::new(&config.diagnostics_dir));

        Ok(Self {
            config,
            context,
            handler,
            mode,
            diagnostics,
            cancel,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunOutcome> {
        let (status, aggregator) =
            StatusChannel::spawn(DEFAULT_CAPACITY, self.config.status_history);
        let observer_cancel = self.cancel.child_token();
        let observer = spawn_console_observer(
            status.clone(),
            self.config.status_poll_interval(),
            observer_cancel.clone(),
        );

        let result = self.run_with_status(&status).await;

        status.flush().await;
        observer_cancel.cancel();
        let _ = observer.await;
        drop(status);
        let _ = aggregator.await;

        result
    }

    async fn run_with_status(&self, status: &StatusHandle) -> Result<RunOutcome> {
        let credentials = self.config.credentials().context("缺少登录凭据")?;

        // 登录与发现共用一个标签页
        let page = self
            .context
            .new_page()
            .await
            .context("无法打开登录标签页")?;

        let prompt: Arc<dyn CredentialPrompt> = if self.config.interactive_prompt {
            Arc::new(TerminalPrompt::stdin())
        } else {
            Arc::new(NonInteractivePrompt)
        };
        let session = SessionManager::new(
            &self.config,
            status.clone(),
            self.diagnostics.clone(),
            prompt,
        );
        let discovery = DraftDiscovery::new(&self.config, status.clone(), self.diagnostics.clone());
        let identifier = credentials.identifier.clone();
        let login =
            login_and_discover(&page, &session, &discovery, credentials, &self.cancel).await?;
        let Some((credentials, drafts)) = login else {
            warn!("⏹️ 登录或草稿发现阶段已取消");
            return Ok(RunOutcome {
                identifier,
                drafts_found: 0,
                summary: BatchSummary::default(),
            });
        };

        let drafts_found = drafts.len();
        if drafts.is_empty() {
            warn!("⚠️ 没有找到待处理的草稿，程序结束");
            return Ok(RunOutcome {
                identifier: credentials.identifier,
                drafts_found,
                summary: BatchSummary::default(),
            });
        }

        let mut flow = DraftFlow::new(&self.config, status.clone(), self.diagnostics.clone());
        if let Some(generator) =
            LlmDocumentGenerator::from_config(&self.config).context("无法初始化文档生成")?
        {
            flow = flow.with_generator(Arc::new(generator));
        }

        let scheduler = BatchScheduler::new(&self.config, Arc::new(flow), self.cancel.clone());
        let summary = scheduler.run(&self.context, drafts).await;

        append_outcomes(&self.config.output_log_file, &summary.outcomes)
            .context("无法写入处理结果")?;
        print_final_stats(
            &FinalStats {
                completed: summary.completed,
                partial: summary.partial,
                failed: summary.failed,
                aborted: summary.aborted,
                total: summary.total(),
            },
            &self.config.output_log_file,
        );

        Ok(RunOutcome {
            identifier: credentials.identifier,
            drafts_found,
            summary,
        })
    }

    /// 清理资源
    pub async fn shutdown(self) {
        if self.mode == BrowserMode::Launched {
            let mut browser = self.context.into_browser();
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler.abort();
        info!("👋 已退出");
    }
}

/// 在同一个标签页上登录并列出草稿
///
/// 标签页在任何结果下都会关闭；收到取消信号时返回 `Ok(None)`。
async fn login_and_discover(
    page: &dyn PageDriver,
    session: &SessionManager,
    discovery: &DraftDiscovery,
    credentials: Credentials,
    cancel: &CancellationToken,
) -> Result<Option<(Credentials, Vec<DraftHandle>)>> {
    let result: Result<Option<(Credentials, Vec<DraftHandle>)>> = tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        result = async {
            let credentials = session
                .authenticate(page, credentials)
                .await
                .into_result()
                .context("登录失败")?;
            let drafts = discovery.list_drafts(page).await;
            Ok::<_, anyhow::Error>(Some((credentials, drafts)))
        } => result,
    };

    if let Err(e) = page.close().await {
        warn!("关闭登录标签页失败: {}", e);
    }
    result
}
