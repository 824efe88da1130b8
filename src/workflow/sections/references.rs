//! 推荐人分区

use async_trait::async_trait;

use crate::browser::Locator;
use crate::error::AppResult;
use crate::workflow::markers::ReferencesMarker;
use crate::workflow::section_runner::{SectionProtocol, StepEnv};
use crate::workflow::sections::{complete_control, dismiss_toast, editor, wait_and_click};

const CARD: &str = "#AppForm_Section_References > div.card-body";
const SUBMIT: &str = r"#EditAppFieldset\.Submit";

pub struct ReferencesSection {
    key: String,
}

impl ReferencesSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl SectionProtocol for ReferencesSection {
    type Marker = ReferencesMarker;

    fn key(&self) -> &str {
        &self.key
    }

    async fn perform(&mut self, env: &StepEnv<'_>, marker: ReferencesMarker) -> AppResult<()> {
        let timeout = env.timings.selector();
        match marker {
            ReferencesMarker::ExpandCard => {
                env.report("[推荐人] 展开").await;
                wait_and_click(env, &Locator::css(CARD), timeout).await
            }
            ReferencesMarker::OpenEditor => wait_and_click(env, &editor(&self.key), timeout).await,
            ReferencesMarker::Submit => {
                wait_and_click(env, &Locator::css(SUBMIT), timeout).await?;
                dismiss_toast(env).await;
                Ok(())
            }
            ReferencesMarker::MarkComplete => {
                wait_and_click(env, &complete_control("References"), timeout).await
            }
            ReferencesMarker::Complete => Ok(()),
        }
    }
}
