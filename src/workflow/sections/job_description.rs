//! "About this job" 弹窗：读取职位描述

use async_trait::async_trait;

use crate::browser::Locator;
use crate::error::AppResult;
use crate::workflow::markers::JobDescriptionMarker;
use crate::workflow::section_runner::{SectionProtocol, StepEnv};
use crate::workflow::sections::wait_and_click;

const MODAL_BODY: &str = "#VacancyDetailsModal .modal-body";
const DESCRIPTION: &str = "#VacancyDetailsModal > div > div > div.modal-body > div";
const MODAL_CLOSE: &str = "#VacancyDetailsModal > div > div > div.modal-header > button";

pub struct JobDescriptionSection {
    key: String,
    text: Option<String>,
}

impl JobDescriptionSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: None,
        }
    }

    /// 读取到的描述（空文本视为没有）
    pub fn into_text(self) -> Option<String> {
        self.text.filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl SectionProtocol for JobDescriptionSection {
    type Marker = JobDescriptionMarker;

    fn key(&self) -> &str {
        &self.key
    }

    async fn perform(&mut self, env: &StepEnv<'_>, marker: JobDescriptionMarker) -> AppResult<()> {
        match marker {
            JobDescriptionMarker::OpenModal => {
                env.report("打开职位描述").await;
                let about = Locator::button("About this job");
                wait_and_click(env, &about, env.timings.selector()).await?;
                env.page
                    .wait_for(&Locator::css(MODAL_BODY), env.timings.selector())
                    .await
            }
            JobDescriptionMarker::Read => {
                let text = env.page.inner_text(&Locator::css(DESCRIPTION)).await?;
                self.text = Some(text.trim().to_string());
                Ok(())
            }
            JobDescriptionMarker::Close => {
                wait_and_click(env, &Locator::css(MODAL_CLOSE), env.timings.selector()).await
            }
            JobDescriptionMarker::Complete => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::section_runner::{run_section, SectionProgress};
    use crate::workflow::sections::testing::Harness;

    #[tokio::test]
    async fn test_reads_and_closes_modal() {
        let harness = Harness::new();
        harness
            .page
            .set_text(&Locator::css(DESCRIPTION), "  Staff nurse, band 5  ");
        let mut section = JobDescriptionSection::new("job-description");
        let mut progress = SectionProgress::new("job-description");

        run_section(&mut section, &harness.env(), &mut progress, 2)
            .await
            .unwrap();
        assert_eq!(section.into_text().as_deref(), Some("Staff nurse, band 5"));
        assert_eq!(
            harness
                .page
                .count_action(&format!("click {}", Locator::css(MODAL_CLOSE))),
            1
        );
    }

    #[tokio::test]
    async fn test_late_close_button_is_waited_for() {
        let harness = Harness::new();
        harness.page.appear_on_wait(&Locator::css(MODAL_CLOSE));
        let mut section = JobDescriptionSection::new("job-description");
        let mut progress = SectionProgress::new("job-description");

        run_section(&mut section, &harness.env(), &mut progress, 1)
            .await
            .unwrap();
        assert_eq!(progress.attempts, 1);
        assert_eq!(harness.page.reload_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_description_is_none() {
        let harness = Harness::new();
        let mut section = JobDescriptionSection::new("job-description");
        let mut progress = SectionProgress::new("job-description");

        run_section(&mut section, &harness.env(), &mut progress, 1)
            .await
            .unwrap();
        assert!(section.into_text().is_none());
    }
}
