//! 浏览器能力接口
//!
//! 上层流程只依赖这里定义的 `PageDriver` / `BrowserContext`，
//! 不直接接触 chromiumoxide。

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};

use crate::error::{AppError, AppResult, UiError};

/// 轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// CSS 选择器
    Css { selector: String },
    /// CSS 选择器 + 文本包含过滤
    CssWithText { selector: String, text: String },
    /// ARIA 角色 + 可访问名称
    Role {
        role: String,
        name: String,
        exact: bool,
    },
    /// 表单标签文本
    Label { text: String },
    /// 第 index 个匹配项
    Nth { inner: Box<Locator>, index: usize },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn css_with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::CssWithText {
            selector: selector.into(),
            text: text.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>, exact: bool) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.into(),
            exact,
        }
    }

    /// 按钮（名称包含匹配）
    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name, false)
    }

    /// 按钮（名称精确匹配）
    pub fn button_exact(name: impl Into<String>) -> Self {
        Self::role("button", name, true)
    }

    pub fn link_exact(name: impl Into<String>) -> Self {
        Self::role("link", name, true)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Locator::Label { text: text.into() }
    }

    pub fn nth(&self, index: usize) -> Self {
        Locator::Nth {
            inner: Box::new(self.clone()),
            index,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "css({})", selector),
            Locator::CssWithText { selector, text } => {
                write!(f, "css({}):has-text({})", selector, text)
            }
            Locator::Role { role, name, exact } => {
                if *exact {
                    write!(f, "{}[name=\"{}\"]", role, name)
                } else {
                    write!(f, "{}[name~=\"{}\"]", role, name)
                }
            }
            Locator::Label { text } => write!(f, "label({})", text),
            Locator::Nth { inner, index } => write!(f, "{}>>nth={}", inner, index),
        }
    }
}

/// 单个标签页的操作能力
///
/// 所有等待都有上限，超时转换为 `UiError`，由分区重试逻辑处理。
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> AppResult<()>;

    async fn current_url(&self) -> AppResult<String>;

    async fn reload(&self) -> AppResult<()>;

    /// 匹配元素数量（含不可见元素）
    async fn count(&self, locator: &Locator) -> AppResult<usize>;

    async fn is_visible(&self, locator: &Locator) -> AppResult<bool>;

    async fn is_checked(&self, locator: &Locator) -> AppResult<bool>;

    /// 点击元素；元素尚未出现时在有限时间内等待
    async fn click(&self, locator: &Locator) -> AppResult<()>;

    /// 勾选复选框，已勾选时不做任何操作
    async fn check(&self, locator: &Locator) -> AppResult<()>;

    async fn fill(&self, locator: &Locator, text: &str) -> AppResult<()>;

    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()>;

    async fn option_values(&self, locator: &Locator) -> AppResult<Vec<String>>;

    async fn selected_value(&self, locator: &Locator) -> AppResult<Option<String>>;

    async fn inner_text(&self, locator: &Locator) -> AppResult<String>;

    /// 所有匹配元素的属性值（缺失的属性被跳过）
    async fn attribute_all(&self, locator: &Locator, name: &str) -> AppResult<Vec<String>>;

    async fn evaluate(&self, script: &str) -> AppResult<JsonValue>;

    async fn screenshot(&self, path: &Path) -> AppResult<()>;

    /// 导出当前会话状态（cookies）
    async fn storage_state(&self) -> AppResult<JsonValue>;

    async fn close(&self) -> AppResult<()>;

    /// 等待元素可见
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> AppResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(locator).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout(locator, timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 等待元素出现在文档中，不要求有尺寸
    async fn wait_for_present(&self, locator: &Locator, timeout: Duration) -> AppResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count(locator).await.unwrap_or(0) > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout(locator, timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 等待 URL 以指定前缀开头
    async fn wait_for_url(&self, prefix: &str, timeout: Duration) -> AppResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.current_url().await.unwrap_or_default();
            if url.starts_with(prefix) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(UiError::NavigationTimeout {
                    expected: prefix.to_string(),
                    actual: url,
                    waited: timeout,
                }
                .into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// 浏览器上下文：负责开新标签页
#[async_trait]
pub trait BrowserContext: Send + Sync {
    type Page: PageDriver + 'static;

    async fn new_page(&self) -> AppResult<Self::Page>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("#a").to_string(), "css(#a)");
        assert_eq!(
            Locator::button_exact("Save").to_string(),
            "button[name=\"Save\"]"
        );
        assert_eq!(
            Locator::css("select").nth(2).to_string(),
            "css(select)>>nth=2"
        );
    }

    #[test]
    fn test_locator_serializes_with_kind_tag() {
        let json = serde_json::to_value(Locator::button("Save & next")).unwrap();
        assert_eq!(json["kind"], "role");
        assert_eq!(json["role"], "button");
        assert_eq!(json["name"], "Save & next");
        assert_eq!(json["exact"], false);

        let nested = serde_json::to_value(Locator::css("select").nth(1)).unwrap();
        assert_eq!(nested["kind"], "nth");
        assert_eq!(nested["inner"]["kind"], "css");
        assert_eq!(nested["index"], 1);
    }
}
