//! chromiumoxide 适配层
//!
//! 把 `PageDriver` / `BrowserContext` 落到真实的 Chrome 标签页上。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Browser;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::browser::{BrowserContext, Locator, PageDriver};
use crate::error::{AppResult, BrowserError};
use crate::infrastructure::JsExecutor;

/// 隐藏 webdriver 标记，新文档加载前注入
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', {
    get: () => undefined
});
"#;

/// 点击前等待元素出现的上限
const CLICK_WAIT: Duration = Duration::from_secs(5);

/// 基于 chromiumoxide 的标签页
pub struct ChromiumPage {
    executor: JsExecutor,
}

impl ChromiumPage {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.executor.page().goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.executor.page().url().await?.unwrap_or_default())
    }

    async fn reload(&self) -> AppResult<()> {
        self.executor.page().reload().await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> AppResult<usize> {
        self.executor
            .on_locator(locator, "return { ok: true, value: els.length };")
            .await
    }

    async fn is_visible(&self, locator: &Locator) -> AppResult<bool> {
        self.executor
            .on_locator(locator, "return { ok: true, value: !!el && __visible(el) };")
            .await
    }

    async fn is_checked(&self, locator: &Locator) -> AppResult<bool> {
        self.executor
            .on_locator(
                locator,
                r#"
                const control = __control(el);
                if (!control) return { ok: false, error: 'not_found' };
                return { ok: true, value: !!control.checked };
                "#,
            )
            .await
    }

    /// 先等待元素可见（最多 `CLICK_WAIT`），再滚动并点击
    async fn click(&self, locator: &Locator) -> AppResult<()> {
        self.wait_for(locator, CLICK_WAIT).await?;
        let _: bool = self
            .executor
            .on_locator(
                locator,
                r#"
                if (!el) return { ok: false, error: 'not_found' };
                el.scrollIntoView({ block: 'center' });
                el.click();
                return { ok: true, value: true };
                "#,
            )
            .await?;
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> AppResult<()> {
        let _: bool = self
            .executor
            .on_locator(
                locator,
                r#"
                const control = __control(el);
                if (!control) return { ok: false, error: 'not_found' };
                if (!control.checked) {
                    (el.tagName === 'LABEL' ? el : control).click();
                }
                return { ok: true, value: !!control.checked };
                "#,
            )
            .await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> AppResult<()> {
        let body = format!(
            r#"
            const control = __control(el);
            if (!control) return {{ ok: false, error: 'not_found' }};
            const proto = Object.getPrototypeOf(control);
            const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
            control.focus();
            setter.call(control, {});
            control.dispatchEvent(new Event('input', {{ bubbles: true }}));
            control.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true, value: true }};
            "#,
            serde_json::to_string(text)?
        );
        let _: bool = self.executor.on_locator(locator, &body).await?;
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()> {
        let body = format!(
            r#"
            const control = __control(el);
            if (!control || control.tagName !== 'SELECT') return {{ ok: false, error: 'not_found' }};
            const wanted = {value};
            if (!Array.from(control.options).some((o) => o.value === wanted)) {{
                return {{ ok: false, error: 'option_missing:' + wanted }};
            }}
            control.value = wanted;
            control.dispatchEvent(new Event('input', {{ bubbles: true }}));
            control.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true, value: true }};
            "#,
            value = serde_json::to_string(value)?
        );
        let _: bool = self.executor.on_locator(locator, &body).await?;
        Ok(())
    }

    async fn option_values(&self, locator: &Locator) -> AppResult<Vec<String>> {
        self.executor
            .on_locator(
                locator,
                r#"
                const control = __control(el);
                if (!control || control.tagName !== 'SELECT') return { ok: false, error: 'not_found' };
                return { ok: true, value: Array.from(control.options).map((o) => o.value) };
                "#,
            )
            .await
    }

    async fn selected_value(&self, locator: &Locator) -> AppResult<Option<String>> {
        let value: String = self
            .executor
            .on_locator(
                locator,
                r#"
                const control = __control(el);
                if (!control) return { ok: false, error: 'not_found' };
                return { ok: true, value: control.value || '' };
                "#,
            )
            .await?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    async fn inner_text(&self, locator: &Locator) -> AppResult<String> {
        self.executor
            .on_locator(
                locator,
                r#"
                if (!el) return { ok: false, error: 'not_found' };
                return { ok: true, value: el.innerText || '' };
                "#,
            )
            .await
    }

    async fn attribute_all(&self, locator: &Locator, name: &str) -> AppResult<Vec<String>> {
        let body = format!(
            r#"
            const name = {};
            return {{ ok: true, value: els.map((e) => e.getAttribute(name)).filter((v) => v !== null) }};
            "#,
            serde_json::to_string(name)?
        );
        self.executor.on_locator(locator, &body).await
    }

    async fn evaluate(&self, script: &str) -> AppResult<JsonValue> {
        self.executor.eval(script).await
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.executor
            .page()
            .save_screenshot(params, path)
            .await
            .map_err(|e| BrowserError::ScreenshotFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn storage_state(&self) -> AppResult<JsonValue> {
        let cookies = self.executor.page().get_cookies().await?;
        Ok(json!({ "cookies": serde_json::to_value(cookies)? }))
    }

    async fn close(&self) -> AppResult<()> {
        self.executor.page().clone().close().await?;
        Ok(())
    }
}

/// 基于 chromiumoxide 的浏览器上下文
pub struct ChromiumContext {
    browser: Browser,
    stealth: bool,
}

impl ChromiumContext {
    pub fn new(browser: Browser, stealth: bool) -> Self {
        Self { browser, stealth }
    }

    /// 取回浏览器句柄（用于关闭）
    pub fn into_browser(self) -> Browser {
        self.browser
    }
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    type Page = ChromiumPage;

    async fn new_page(&self) -> AppResult<ChromiumPage> {
        let page = self.browser.new_page("about:blank").await?;
        if self.stealth {
            page.evaluate_on_new_document(STEALTH_SCRIPT).await?;
        }
        Ok(ChromiumPage::new(JsExecutor::new(page)))
    }
}
