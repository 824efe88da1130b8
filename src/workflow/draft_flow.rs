//! 草稿处理流程 - 流程层
//!
//! 核心职责：定义"一份草稿"的完整处理流程
//!
//! 流程顺序：
//! 1. 打开草稿 → 停顿 → 滚动到底部
//! 2. 按目录依次执行各分区（必需分区失败即停止）
//! 3. 到达 supportinginfo 边界
//! 4. 可选：根据职位描述生成支持性文档

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::PageDriver;
use crate::config::{Config, FailurePolicy, Timings};
use crate::error::{AppError, AppResult, SectionError};
use crate::models::{
    DraftJobState, DraftOutcome, SectionCatalogue, SectionDescriptor, SectionKind, SectionReport,
};
use crate::services::job_description::{write_supporting_document, DocumentGenerator};
use crate::services::{DiagnosticSink, StatusHandle};
use crate::utils::logging::truncate_text;
use crate::workflow::draft_ctx::DraftCtx;
use crate::workflow::section_runner::{run_section, SectionProgress, SectionProtocol, StepEnv};
use crate::workflow::sections::{
    EqualOpportunitiesSection, GenericSection, JobDescriptionSection, PersonalDetailsSection,
    ReferencesSection,
};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// 草稿处理流程
///
/// - 编排一份草稿的所有分区
/// - 不持有任何页面资源，页面由调用方传入
/// - 只修改自己创建的 `DraftJobState`
pub struct DraftFlow {
    catalogue: SectionCatalogue,
    timings: Timings,
    section_max_attempts: u32,
    policy: FailurePolicy,
    status: StatusHandle,
    diagnostics: Arc<DiagnosticSink>,
    generator: Option<Arc<dyn DocumentGenerator>>,
    output_dir: PathBuf,
}

impl DraftFlow {
    pub fn new(config: &Config, status: StatusHandle, diagnostics: Arc<DiagnosticSink>) -> Self {
        Self {
            catalogue: SectionCatalogue::from_settings(&config.sections),
            timings: config.timings.clone(),
            section_max_attempts: config.section_max_attempts,
            policy: config.failure_policy,
            status,
            diagnostics,
            generator: None,
            output_dir: PathBuf::from(&config.output_dir),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn catalogue(&self) -> &SectionCatalogue {
        &self.catalogue
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    /// 处理一份草稿，结果写在返回的状态里
    pub async fn advance_draft(&self, page: &dyn PageDriver, ctx: &DraftCtx) -> DraftJobState {
        let mut state = DraftJobState::new(ctx.handle.clone());
        state.outcome = DraftOutcome::InProgress;

        info!("{} ➡️ 开始处理: {}", ctx, ctx.handle.url);
        self.report(ctx, "打开草稿").await;

        if let Err(e) = self.open(page, ctx).await {
            error!("{} ❌ 无法打开草稿: {}", ctx, e);
            self.report(ctx, format!("无法打开草稿: {}", e)).await;
            self.capture_failure(page, ctx).await;
            state.outcome = DraftOutcome::Failed;
            state.error = Some(e.to_string());
            return state;
        }

        let env = StepEnv {
            page,
            timings: &self.timings,
            status: &self.status,
            worker_id: &ctx.worker_id,
        };

        let mut failure: Option<AppError> = None;
        let mut remaining = self.catalogue.sections.iter();

        for descriptor in remaining.by_ref() {
            let (report, result, description) = self.run_descriptor(descriptor, &env).await;
            state.sections.push(report);
            if let Some(text) = description {
                info!("{} 📄 职位描述: {}", ctx, truncate_text(&text, 60));
                state.job_description = Some(text);
            }

            if let Err(e) = result {
                if descriptor.required {
                    error!("{} ❌ 必需分区 {} 失败: {}", ctx, descriptor.key, e);
                    failure = Some(e);
                    break;
                }
                warn!("{} ⚠️ 分区 {} 失败，继续处理: {}", ctx, descriptor.key, e);
            }
        }
        state
            .sections
            .extend(remaining.map(|d| SectionReport::skipped(d.key.clone())));

        match failure {
            Some(e) => {
                state.outcome = match self.policy {
                    FailurePolicy::PartialCredit if state.completed_sections() > 0 => {
                        DraftOutcome::Partial
                    }
                    _ => DraftOutcome::Failed,
                };
                state.error = Some(e.to_string());
                self.report(ctx, format!("{}: {}", state.outcome, e)).await;
                self.capture_failure(page, ctx).await;
            }
            None => {
                state.outcome = DraftOutcome::Completed;
                info!(
                    "{} ✅ 已到达 {}，停止处理",
                    ctx, self.catalogue.boundary
                );
                self.report(ctx, format!("已到达 {}", self.catalogue.boundary))
                    .await;
            }
        }

        self.write_document(ctx, &state).await;
        state
    }

    async fn open(&self, page: &dyn PageDriver, ctx: &DraftCtx) -> AppResult<()> {
        page.goto(&ctx.handle.url).await.map_err(|e| {
            AppError::from(SectionError::DraftUnavailable {
                url: ctx.handle.url.clone(),
                reason: e.to_string(),
            })
        })?;
        sleep(self.timings.draft_open_settle()).await;
        if let Err(e) = page.evaluate(SCROLL_TO_BOTTOM).await {
            warn!("{} 滚动页面失败: {}", ctx, e);
        }
        Ok(())
    }

    /// 按分区类型选择步骤协议
    async fn run_descriptor(
        &self,
        descriptor: &SectionDescriptor,
        env: &StepEnv<'_>,
    ) -> (SectionReport, AppResult<()>, Option<String>) {
        let key = descriptor.key.clone();
        match &descriptor.kind {
            SectionKind::JobDescription => {
                let mut section = JobDescriptionSection::new(key);
                let (report, result) = self.run_typed(&mut section, env).await;
                (report, result, section.into_text())
            }
            SectionKind::PersonalDetails => {
                let (report, result) = self
                    .run_typed(&mut PersonalDetailsSection::new(key), env)
                    .await;
                (report, result, None)
            }
            SectionKind::References => {
                let (report, result) = self.run_typed(&mut ReferencesSection::new(key), env).await;
                (report, result, None)
            }
            SectionKind::EqualOpportunities => {
                let (report, result) = self
                    .run_typed(&mut EqualOpportunitiesSection::new(key), env)
                    .await;
                (report, result, None)
            }
            SectionKind::Generic {
                max_advances,
                reveals_hidden,
            } => {
                let mut section = GenericSection::new(key, *max_advances, *reveals_hidden);
                let (report, result) = self.run_typed(&mut section, env).await;
                (report, result, None)
            }
        }
    }

    async fn run_typed<S: SectionProtocol>(
        &self,
        section: &mut S,
        env: &StepEnv<'_>,
    ) -> (SectionReport, AppResult<()>) {
        let mut progress = SectionProgress::<S::Marker>::new(section.key().to_string());
        let result = run_section(section, env, &mut progress, self.section_max_attempts).await;
        (progress.into_report(), result)
    }

    async fn capture_failure(&self, page: &dyn PageDriver, ctx: &DraftCtx) {
        self.diagnostics
            .capture(page, &format!("draft_{}", ctx.index()), &ctx.handle.id)
            .await;
    }

    /// 有职位描述且启用生成时写入支持性文档
    async fn write_document(&self, ctx: &DraftCtx, state: &DraftJobState) {
        let (Some(generator), Some(description)) = (&self.generator, &state.job_description)
        else {
            return;
        };

        self.report(ctx, "生成支持性文档").await;
        let text = generator.generate(description).await;
        match write_supporting_document(&self.output_dir, &ctx.handle.id, &text) {
            Ok(path) => info!("{} 📝 支持性文档已写入: {}", ctx, path.display()),
            Err(e) => warn!("{} ⚠️ 写入支持性文档失败: {}", ctx, e),
        }
    }

    async fn report(&self, ctx: &DraftCtx, message: impl Into<String>) {
        self.status.publish(&ctx.worker_id, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;
    use crate::browser::Locator;
    use crate::models::{DraftHandle, SectionStatus};
    use crate::services::status::{StatusChannel, DEFAULT_CAPACITY};
    use crate::workflow::sections::editor;
    use async_trait::async_trait;

    const URL: &str = "https://apps.trac.jobs/application/555/form";

    fn flow(config: &Config, dir: &std::path::Path) -> DraftFlow {
        let (status, _task) = StatusChannel::spawn(DEFAULT_CAPACITY, false);
        DraftFlow::new(config, status, Arc::new(DiagnosticSink::new(dir.join("diag"))))
    }

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            timings: Timings::instant(),
            output_dir: dir.join("out").display().to_string(),
            ..Config::default()
        }
    }

    fn ctx() -> DraftCtx {
        DraftCtx::new(DraftHandle::new(URL, 1))
    }

    struct EchoGenerator;

    #[async_trait]
    impl DocumentGenerator for EchoGenerator {
        async fn generate(&self, job_description: &str) -> String {
            format!("supporting: {}", job_description)
        }
    }

    #[tokio::test]
    async fn test_all_sections_complete() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&test_config(dir.path()), dir.path());
        let page = FakePage::new();

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Completed);
        assert_eq!(state.sections.len(), flow.catalogue().keys().len());
        assert!(state
            .sections
            .iter()
            .all(|s| s.status == SectionStatus::Completed));
        assert_eq!(page.actions()[0], format!("goto {}", URL));
        assert_eq!(page.actions()[1], "evaluate");
        // 只有 gaps 之后刷新一次
        assert_eq!(page.reload_count(), 1);
        assert!(page.screenshots().is_empty());
    }

    #[tokio::test]
    async fn test_required_failure_stops_walk() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&test_config(dir.path()), dir.path());
        let page = FakePage::new();
        page.hide(&editor("references"));

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Failed);
        assert!(state.error.is_some());

        let references = state.section("references").unwrap();
        assert_eq!(references.status, SectionStatus::Failed);
        assert_eq!(references.attempts, 2);
        assert_eq!(references.last_marker, "OpenEditor");

        for key in ["equalops", "genedu", "gaps"] {
            let report = state.section(key).unwrap();
            assert_eq!(report.status, SectionStatus::Skipped);
            assert_eq!(report.attempts, 0);
        }
        assert_eq!(page.count_action(&format!("click {}", editor("equalops"))), 0);
        assert_eq!(page.count_action(&format!("click {}", editor("genedu"))), 0);

        let shots = page.screenshots();
        assert_eq!(shots.len(), 1);
        assert!(shots[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("draft_1_555_"));
    }

    #[tokio::test]
    async fn test_partial_credit_policy() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            failure_policy: FailurePolicy::PartialCredit,
            ..test_config(dir.path())
        };
        let flow = flow(&config, dir.path());
        let page = FakePage::new();
        page.hide(&editor("equalops"));

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Partial);
        assert_eq!(state.completed_sections(), 3);
    }

    #[tokio::test]
    async fn test_partial_credit_without_progress_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            failure_policy: FailurePolicy::PartialCredit,
            ..test_config(dir.path())
        };
        let flow = flow(&config, dir.path());
        let page = FakePage::new();
        page.fail_always("click", &Locator::button("About this job"));
        page.hide(&editor("persdetails"));

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Failed);
    }

    #[tokio::test]
    async fn test_optional_section_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&test_config(dir.path()), dir.path());
        let page = FakePage::new();
        page.fail_always("click", &Locator::button("About this job"));

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Completed);
        assert_eq!(
            state.section("job-description").map(|s| s.status),
            Some(SectionStatus::Failed)
        );
        assert_eq!(
            state.section("persdetails").map(|s| s.status),
            Some(SectionStatus::Completed)
        );
        assert!(state.job_description.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_draft_fails_without_sections() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&test_config(dir.path()), dir.path());
        let page = FakePage::new();
        page.fail_goto(URL);

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.outcome, DraftOutcome::Failed);
        assert!(state.sections.is_empty());
        assert_eq!(page.screenshots().len(), 1);
    }

    #[tokio::test]
    async fn test_supporting_document_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let flow = flow(&config, dir.path()).with_generator(Arc::new(EchoGenerator));
        let page = FakePage::new();
        page.set_text(
            &Locator::css("#VacancyDetailsModal > div > div > div.modal-body > div"),
            "Band 5 nurse",
        );

        let state = flow.advance_draft(&page, &ctx()).await;
        assert_eq!(state.job_description.as_deref(), Some("Band 5 nurse"));
        let written =
            std::fs::read_to_string(dir.path().join("out").join("supporting_555.txt")).unwrap();
        assert_eq!(written, "supporting: Band 5 nurse");
    }

    #[tokio::test]
    async fn test_supporting_document_written_for_non_numeric_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let flow = flow(&config, dir.path()).with_generator(Arc::new(EchoGenerator));
        let page = FakePage::new();
        page.set_text(
            &Locator::css("#VacancyDetailsModal > div > div > div.modal-body > div"),
            "Band 5",
        );
        let ctx = DraftCtx::new(DraftHandle::new(
            "https://apps.trac.jobs/application/draft-abc",
            1,
        ));

        let state = flow.advance_draft(&page, &ctx).await;
        assert_eq!(state.outcome, DraftOutcome::Completed);
        let files: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "supporting: Band 5");
    }
}
