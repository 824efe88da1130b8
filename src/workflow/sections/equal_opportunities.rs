//! 平等机会问卷分区

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::Locator;
use crate::error::AppResult;
use crate::workflow::markers::EqualOpportunitiesMarker;
use crate::workflow::section_runner::{SectionProtocol, StepEnv};
use crate::workflow::sections::{close_button, editor, save, save_and_next, wait_and_click};

const SOURCE_LABEL: &str = "Please state where you first";
const SOURCE_VALUE: &str = "HJUK";
const DECLARATION: &str = "I agree to the above";

pub struct EqualOpportunitiesSection {
    key: String,
}

impl EqualOpportunitiesSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl SectionProtocol for EqualOpportunitiesSection {
    type Marker = EqualOpportunitiesMarker;

    fn key(&self) -> &str {
        &self.key
    }

    async fn perform(&mut self, env: &StepEnv<'_>, marker: EqualOpportunitiesMarker) -> AppResult<()> {
        let page = env.page;
        match marker {
            EqualOpportunitiesMarker::OpenEditor => {
                env.report("[平等机会] 打开编辑").await;
                wait_and_click(env, &editor(&self.key), env.timings.selector()).await
            }
            EqualOpportunitiesMarker::AdvanceIntro => {
                // 编辑器异步加载，按钮出现前不能点击
                let button = save_and_next();
                wait_and_click(env, &button, env.timings.advance_button()).await?;
                sleep(env.timings.advance_settle()).await;
                wait_and_click(env, &button, env.timings.advance_button()).await
            }
            EqualOpportunitiesMarker::SelectSource => {
                let source = Locator::label(SOURCE_LABEL);
                if page.selected_value(&source).await?.as_deref() == Some(SOURCE_VALUE) {
                    debug!("[{}] 来源已选择 {}", env.worker_id, SOURCE_VALUE);
                    return Ok(());
                }
                page.select_option(&source, SOURCE_VALUE).await
            }
            EqualOpportunitiesMarker::AdvanceSource => {
                wait_and_click(env, &save_and_next(), env.timings.advance_button()).await
            }
            EqualOpportunitiesMarker::Declaration => {
                let declaration = Locator::label(DECLARATION);
                if !page.is_checked(&declaration).await? {
                    page.check(&declaration).await?;
                }
                Ok(())
            }
            EqualOpportunitiesMarker::FinalSave => {
                wait_and_click(env, &save(), env.timings.selector()).await
            }
            EqualOpportunitiesMarker::CloseModal => {
                // 弹窗不一定出现
                let close = close_button();
                if page.wait_for(&close, env.timings.toast()).await.is_ok() {
                    if let Err(e) = page.click(&close).await {
                        debug!("[{}] 关闭弹窗失败: {}", env.worker_id, e);
                    }
                }
                Ok(())
            }
            EqualOpportunitiesMarker::Complete => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::section_runner::{run_section, SectionProgress};
    use crate::workflow::sections::testing::Harness;

    async fn run(harness: &Harness) -> (AppResult<()>, SectionProgress<EqualOpportunitiesMarker>) {
        let mut section = EqualOpportunitiesSection::new("equalops");
        let mut progress = SectionProgress::new("equalops");
        let result = run_section(&mut section, &harness.env(), &mut progress, 2).await;
        (result, progress)
    }

    #[tokio::test]
    async fn test_full_protocol() {
        let harness = Harness::new();
        harness
            .page
            .set_options(&Locator::label(SOURCE_LABEL), &["", "NHSJ", SOURCE_VALUE]);

        let (result, _) = run(&harness).await;
        result.unwrap();

        let page = &harness.page;
        assert_eq!(page.count_action(&format!("click {}", save_and_next())), 3);
        assert_eq!(
            page.count_action(&format!("select {}=HJUK", Locator::label(SOURCE_LABEL))),
            1
        );
        assert_eq!(
            page.count_action(&format!("check {}", Locator::label(DECLARATION))),
            1
        );
        assert_eq!(page.count_action(&format!("click {}", save())), 1);
        assert_eq!(page.count_action(&format!("click {}", close_button())), 1);
    }

    #[tokio::test]
    async fn test_existing_answers_are_kept() {
        let harness = Harness::new();
        harness.page.set_element(
            &Locator::label(SOURCE_LABEL),
            crate::browser::fake::FakeElement {
                selected: Some(SOURCE_VALUE.to_string()),
                ..Default::default()
            },
        );
        harness.page.set_checked(&Locator::label(DECLARATION), true);

        let (result, _) = run(&harness).await;
        result.unwrap();
        let actions = harness.page.actions();
        assert!(!actions.iter().any(|a| a.starts_with("select ")));
        assert!(!actions.iter().any(|a| a.starts_with("check ")));
    }

    #[tokio::test]
    async fn test_missing_close_button_is_fine() {
        let harness = Harness::new();
        harness.page.hide(&close_button());

        let (result, progress) = run(&harness).await;
        result.unwrap();
        assert_eq!(progress.attempts, 1);
    }

    #[tokio::test]
    async fn test_late_advance_button_is_waited_for() {
        let harness = Harness::new();
        harness.page.appear_on_wait(&save_and_next());

        let (result, progress) = run(&harness).await;
        result.unwrap();
        assert_eq!(progress.attempts, 1);
        assert_eq!(harness.page.reload_count(), 0);
        assert_eq!(
            harness
                .page
                .count_action(&format!("click {}", save_and_next())),
            3
        );
    }

    #[tokio::test]
    async fn test_missing_source_option_retries_from_select() {
        let harness = Harness::new();
        harness
            .page
            .set_options(&Locator::label(SOURCE_LABEL), &["", "NHSJ"]);

        let (result, progress) = run(&harness).await;
        assert!(result.is_err());
        assert_eq!(progress.marker, EqualOpportunitiesMarker::SelectSource);
        assert_eq!(progress.attempts, 2);
        // 介绍页只推进过一次
        assert_eq!(
            harness
                .page
                .count_action(&format!("click {}", save_and_next())),
            2
        );
    }
}
