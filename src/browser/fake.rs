//! 测试用的脚本化页面
//!
//! 未登记的元素默认可见、未勾选、数量为 1，
//! 测试只需要登记与默认值不同的元素和需要失败的操作。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};

use super::driver::{BrowserContext, Locator, PageDriver};
use crate::error::{AppError, AppResult, UiError};

/// 页面元素状态
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub visible: bool,
    pub checked: bool,
    pub count: usize,
    pub text: String,
    pub options: Vec<String>,
    pub selected: Option<String>,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            visible: true,
            checked: false,
            count: 1,
            text: String::new(),
            options: Vec::new(),
            selected: None,
        }
    }
}

#[derive(Default)]
struct FakeState {
    url: String,
    elements: HashMap<String, FakeElement>,
    listings: HashMap<String, Vec<String>>,
    failures: HashMap<String, usize>,
    navigations: HashMap<String, String>,
    failing_urls: HashSet<String>,
    delayed: HashSet<String>,
    actions: Vec<String>,
    screenshots: Vec<PathBuf>,
    reloads: usize,
    closed: bool,
    gauge: Option<Arc<TabGauge>>,
}

impl FakeState {
    fn element(&self, locator: &Locator) -> FakeElement {
        if let Some(el) = self.elements.get(&locator.to_string()) {
            return el.clone();
        }
        if let Locator::Nth { inner, .. } = locator {
            return self.element(inner);
        }
        FakeElement::default()
    }

    fn element_mut(&mut self, locator: &Locator) -> &mut FakeElement {
        let fallback = self.element(locator);
        self.elements.entry(locator.to_string()).or_insert(fallback)
    }

    /// 消耗一次预设失败
    fn take_failure(&mut self, action: &str, locator: &Locator) -> AppResult<()> {
        let key = format!("{} {}", action, locator);
        if let Some(remaining) = self.failures.get_mut(&key) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(AppError::timeout(locator, Duration::ZERO));
            }
        }
        Ok(())
    }
}

/// 同时打开的标签页计数
#[derive(Debug, Default)]
pub struct TabGauge {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl TabGauge {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// 脚本化页面
#[derive(Clone, Default)]
pub struct FakePage {
    inner: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_element(&self, locator: &Locator, element: FakeElement) {
        self.inner.lock().elements.insert(locator.to_string(), element);
    }

    /// 元素不存在
    pub fn hide(&self, locator: &Locator) {
        let mut state = self.inner.lock();
        let el = state.element_mut(locator);
        el.visible = false;
        el.count = 0;
    }

    /// 元素起初不存在，在下一次 `wait_for` 期间出现
    pub fn appear_on_wait(&self, locator: &Locator) {
        self.hide(locator);
        self.inner.lock().delayed.insert(locator.to_string());
    }

    pub fn set_checked(&self, locator: &Locator, checked: bool) {
        self.inner.lock().element_mut(locator).checked = checked;
    }

    pub fn set_count(&self, locator: &Locator, count: usize) {
        self.inner.lock().element_mut(locator).count = count;
    }

    pub fn set_text(&self, locator: &Locator, text: &str) {
        self.inner.lock().element_mut(locator).text = text.to_string();
    }

    pub fn set_options(&self, locator: &Locator, options: &[&str]) {
        self.inner.lock().element_mut(locator).options =
            options.iter().map(|o| o.to_string()).collect();
    }

    /// 让 `action locator` 失败 times 次
    pub fn fail_times(&self, action: &str, locator: &Locator, times: usize) {
        self.inner
            .lock()
            .failures
            .insert(format!("{} {}", action, locator), times);
    }

    pub fn fail_always(&self, action: &str, locator: &Locator) {
        self.fail_times(action, locator, usize::MAX);
    }

    /// 点击后跳转
    pub fn navigate_on_click(&self, locator: &Locator, url: &str) {
        self.inner
            .lock()
            .navigations
            .insert(locator.to_string(), url.to_string());
    }

    /// 某个 URL 下返回的链接列表
    pub fn with_listing(&self, url: &str, hrefs: &[&str]) {
        self.inner.lock().listings.insert(
            url.to_string(),
            hrefs.iter().map(|h| h.to_string()).collect(),
        );
    }

    pub fn fail_goto(&self, url: &str) {
        self.inner.lock().failing_urls.insert(url.to_string());
    }

    pub fn actions(&self) -> Vec<String> {
        self.inner.lock().actions.clone()
    }

    /// 某条操作出现的次数
    pub fn count_action(&self, action: &str) -> usize {
        self.inner
            .lock()
            .actions
            .iter()
            .filter(|a| a.as_str() == action)
            .count()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.inner.lock().screenshots.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.inner.lock().reloads
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn url(&self) -> String {
        self.inner.lock().url.clone()
    }

    fn record(&self, action: String) {
        self.inner.lock().actions.push(action);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        self.record(format!("goto {}", url));
        let mut state = self.inner.lock();
        if state.failing_urls.contains(url) {
            return Err(AppError::script(format!("navigation to {} failed", url)));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.inner.lock().url.clone())
    }

    async fn reload(&self) -> AppResult<()> {
        self.record("reload".to_string());
        self.inner.lock().reloads += 1;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> AppResult<usize> {
        Ok(self.inner.lock().element(locator).count)
    }

    async fn is_visible(&self, locator: &Locator) -> AppResult<bool> {
        Ok(self.inner.lock().element(locator).visible)
    }

    async fn is_checked(&self, locator: &Locator) -> AppResult<bool> {
        Ok(self.inner.lock().element(locator).checked)
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        self.record(format!("click {}", locator));
        let mut state = self.inner.lock();
        state.take_failure("click", locator)?;
        if !state.element(locator).visible {
            return Err(AppError::not_found(locator));
        }
        if let Some(url) = state.navigations.get(&locator.to_string()).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> AppResult<()> {
        self.record(format!("check {}", locator));
        let mut state = self.inner.lock();
        state.take_failure("check", locator)?;
        state.element_mut(locator).checked = true;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> AppResult<()> {
        self.record(format!("fill {}={}", locator, text));
        let mut state = self.inner.lock();
        state.take_failure("fill", locator)?;
        state.element_mut(locator).text = text.to_string();
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.record(format!("select {}={}", locator, value));
        let mut state = self.inner.lock();
        state.take_failure("select", locator)?;
        let el = state.element_mut(locator);
        if !el.options.is_empty() && !el.options.iter().any(|o| o == value) {
            return Err(UiError::OptionMissing {
                locator: locator.to_string(),
                value: value.to_string(),
            }
            .into());
        }
        el.selected = Some(value.to_string());
        Ok(())
    }

    async fn option_values(&self, locator: &Locator) -> AppResult<Vec<String>> {
        Ok(self.inner.lock().element(locator).options)
    }

    async fn selected_value(&self, locator: &Locator) -> AppResult<Option<String>> {
        Ok(self.inner.lock().element(locator).selected)
    }

    async fn inner_text(&self, locator: &Locator) -> AppResult<String> {
        let mut state = self.inner.lock();
        state.take_failure("text", locator)?;
        Ok(state.element(locator).text)
    }

    async fn attribute_all(&self, locator: &Locator, _name: &str) -> AppResult<Vec<String>> {
        let mut state = self.inner.lock();
        state.take_failure("attribute", locator)?;
        Ok(state.listings.get(&state.url).cloned().unwrap_or_default())
    }

    async fn evaluate(&self, _script: &str) -> AppResult<JsonValue> {
        self.record("evaluate".to_string());
        Ok(JsonValue::Null)
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        self.inner.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn storage_state(&self) -> AppResult<JsonValue> {
        Ok(json!({ "cookies": [] }))
    }

    async fn close(&self) -> AppResult<()> {
        self.record("close".to_string());
        let mut state = self.inner.lock();
        if !state.closed {
            state.closed = true;
            if let Some(gauge) = &state.gauge {
                gauge.closed();
            }
        }
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> AppResult<()> {
        let mut state = self.inner.lock();
        state.take_failure("wait", locator)?;
        if state.delayed.remove(&locator.to_string()) {
            let el = state.element_mut(locator);
            el.visible = true;
            el.count = 1;
        }
        if state.element(locator).visible {
            Ok(())
        } else {
            Err(AppError::timeout(locator, timeout))
        }
    }

    async fn wait_for_url(&self, prefix: &str, timeout: Duration) -> AppResult<()> {
        let url = self.inner.lock().url.clone();
        if url.starts_with(prefix) {
            Ok(())
        } else {
            Err(UiError::NavigationTimeout {
                expected: prefix.to_string(),
                actual: url,
                waited: timeout,
            }
            .into())
        }
    }
}

type PageSetup = Arc<dyn Fn(usize, &FakePage) + Send + Sync>;

/// 脚本化浏览器上下文
#[derive(Clone)]
pub struct FakeContext {
    pages: Arc<Mutex<Vec<FakePage>>>,
    setup: Option<PageSetup>,
    gauge: Arc<TabGauge>,
}

impl FakeContext {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(Vec::new())),
            setup: None,
            gauge: Arc::new(TabGauge::default()),
        }
    }

    /// 每打开一个标签页调用一次（参数为从 0 开始的序号）
    pub fn with_setup(setup: impl Fn(usize, &FakePage) + Send + Sync + 'static) -> Self {
        Self {
            setup: Some(Arc::new(setup)),
            ..Self::new()
        }
    }

    pub fn pages(&self) -> Vec<FakePage> {
        self.pages.lock().clone()
    }

    pub fn gauge(&self) -> Arc<TabGauge> {
        self.gauge.clone()
    }
}

impl Default for FakeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserContext for FakeContext {
    type Page = FakePage;

    async fn new_page(&self) -> AppResult<FakePage> {
        let page = FakePage::new();
        page.inner.lock().gauge = Some(self.gauge.clone());
        self.gauge.opened();

        let index = {
            let mut pages = self.pages.lock();
            pages.push(page.clone());
            pages.len() - 1
        };
        if let Some(setup) = &self.setup {
            setup(index, &page);
        }
        Ok(page)
    }
}
