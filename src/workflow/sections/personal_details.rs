//! 个人信息分区

use async_trait::async_trait;
use tracing::debug;

use crate::browser::Locator;
use crate::error::AppResult;
use crate::workflow::markers::PersonalDetailsMarker;
use crate::workflow::section_runner::{SectionProtocol, StepEnv};
use crate::workflow::sections::{
    complete_control, dismiss_toast, editor, save, save_and_next, wait_and_click,
};

const FULL_TIME: &str = r"#EditAppFieldset\.personal-preferredemployment_Fulltime";
const RECORD_QUESTIONS: &str = "#EditAppFieldset_crbquestions > div.fieldset-fields select";
const NO: &str = "N";

pub struct PersonalDetailsSection {
    key: String,
}

impl PersonalDetailsSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl SectionProtocol for PersonalDetailsSection {
    type Marker = PersonalDetailsMarker;

    fn key(&self) -> &str {
        &self.key
    }

    async fn perform(&mut self, env: &StepEnv<'_>, marker: PersonalDetailsMarker) -> AppResult<()> {
        let page = env.page;
        match marker {
            PersonalDetailsMarker::OpenEditor => {
                env.report("[个人信息] 打开编辑").await;
                wait_and_click(env, &editor(&self.key), env.timings.selector()).await
            }
            PersonalDetailsMarker::PreferredEmployment => {
                let checkbox = Locator::css(FULL_TIME);
                page.wait_for(&checkbox, env.timings.selector()).await?;
                if page.is_visible(&checkbox).await? && !page.is_checked(&checkbox).await? {
                    page.check(&checkbox).await?;
                }
                Ok(())
            }
            PersonalDetailsMarker::SaveAndNext => {
                let button = save_and_next();
                wait_and_click(env, &button, env.timings.advance_button()).await?;
                wait_and_click(env, &button, env.timings.advance_button()).await
            }
            PersonalDetailsMarker::RecordQuestions => {
                env.report("[个人信息] 填写记录问题").await;
                let selects = Locator::css(RECORD_QUESTIONS);
                page.wait_for(&selects, env.timings.selector()).await?;
                let count = page.count(&selects).await?;
                for i in 0..count {
                    let select = selects.nth(i);
                    let options = page.option_values(&select).await?;
                    if options.iter().any(|o| o == NO) {
                        page.select_option(&select, NO).await?;
                    } else {
                        debug!("[{}] 第 {} 个问题没有 N 选项", env.worker_id, i + 1);
                    }
                }
                Ok(())
            }
            PersonalDetailsMarker::FinalSave => {
                wait_and_click(env, &save(), env.timings.selector()).await?;
                dismiss_toast(env).await;
                Ok(())
            }
            PersonalDetailsMarker::MarkComplete => {
                let control = complete_control("PersDetails");
                wait_and_click(env, &control, env.timings.selector()).await
            }
            PersonalDetailsMarker::Complete => Ok(()),
        }
    }
}
