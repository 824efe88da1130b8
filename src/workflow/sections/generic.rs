//! 通用分区：打开编辑器后连续点击 "Save & next"，直到按钮消失

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::workflow::markers::GenericMarker;
use crate::workflow::section_runner::{SectionProtocol, StepEnv};
use crate::workflow::sections::{editor, save_and_next};

pub struct GenericSection {
    key: String,
    max_advances: usize,
    reveals_hidden: bool,
    /// 最近一次推进点击的次数
    advances: usize,
}

impl GenericSection {
    pub fn new(key: impl Into<String>, max_advances: usize, reveals_hidden: bool) -> Self {
        Self {
            key: key.into(),
            max_advances,
            reveals_hidden,
            advances: 0,
        }
    }

    pub fn advances(&self) -> usize {
        self.advances
    }
}

#[async_trait]
impl SectionProtocol for GenericSection {
    type Marker = GenericMarker;

    fn key(&self) -> &str {
        &self.key
    }

    async fn perform(&mut self, env: &StepEnv<'_>, marker: GenericMarker) -> AppResult<()> {
        let page = env.page;
        match marker {
            GenericMarker::OpenEditor => {
                env.report(format!("[{}] 打开编辑", self.key)).await;
                let entry = editor(&self.key);
                page.wait_for(&entry, env.timings.section_editor()).await?;
                page.click(&entry).await?;
                sleep(env.timings.advance_settle()).await;
                Ok(())
            }
            GenericMarker::Advance => {
                let button = save_and_next();
                self.advances = 0;
                while self.advances < self.max_advances {
                    if page.count(&button).await? == 0 || !page.is_visible(&button).await? {
                        break;
                    }
                    if let Err(e) = page.click(&button).await {
                        debug!("[{}] {} 停止推进: {}", env.worker_id, self.key, e);
                        break;
                    }
                    self.advances += 1;
                    sleep(env.timings.advance_settle()).await;
                }
                debug!(
                    "[{}] {} 点击 Save & next {} 次",
                    env.worker_id, self.key, self.advances
                );
                Ok(())
            }
            GenericMarker::Reveal => {
                if self.reveals_hidden {
                    info!("[{}] 🔄 刷新页面以显示后续分区", env.worker_id);
                    page.reload().await?;
                    sleep(env.timings.draft_open_settle()).await;
                }
                Ok(())
            }
            GenericMarker::Complete => Ok(()),
        }
    }
}
