//! 各分区的步骤协议
//!
//! 选择器来自目标站点的表单结构，各分区共用的按钮和提示条处理放在这里。

pub mod equal_opportunities;
pub mod generic;
pub mod job_description;
pub mod personal_details;
pub mod references;

pub use equal_opportunities::EqualOpportunitiesSection;
pub use generic::GenericSection;
pub use job_description::JobDescriptionSection;
pub use personal_details::PersonalDetailsSection;
pub use references::ReferencesSection;

use std::time::Duration;

use tracing::debug;

use crate::browser::Locator;
use crate::error::AppResult;
use crate::workflow::section_runner::StepEnv;

const TOAST_DISMISS: &str = "button[data-bs-dismiss='toast']";

/// 分区的编辑入口
pub fn editor(key: &str) -> Locator {
    Locator::css(format!(r"#blk_6806_ApplicationForm\.Edit_Fieldset_{}", key))
}

/// 分区的"标记完成"控件
pub fn complete_control(name: &str) -> Locator {
    Locator::css(format!(r"#blk_6806_ApplicationForm\.Complete_Section_{}", name))
}

pub fn save_and_next() -> Locator {
    Locator::button_exact("Save & next")
}

pub fn save() -> Locator {
    Locator::button_exact("Save")
}

pub fn close_button() -> Locator {
    Locator::button_exact("Close")
}

/// 等待元素出现后点击
pub async fn wait_and_click(env: &StepEnv<'_>, locator: &Locator, timeout: Duration) -> AppResult<()> {
    env.page.wait_for(locator, timeout).await?;
    env.page.click(locator).await
}

/// 关闭保存后的提示条，没有提示条不算错误
pub async fn dismiss_toast(env: &StepEnv<'_>) {
    let toast = Locator::css(TOAST_DISMISS);
    if env.page.wait_for(&toast, env.timings.toast()).await.is_err() {
        debug!("[{}] 没有提示条", env.worker_id);
        return;
    }
    match env.page.click(&close_button()).await {
        Ok(()) => debug!("[{}] 已关闭提示条", env.worker_id),
        Err(e) => debug!("[{}] 关闭提示条失败: {}", env.worker_id, e),
    }
}
