//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力。
//! 定位器在页面内由注入的脚本解析，结果统一包装为 `{ ok, value, error }`。

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::browser::Locator;
use crate::error::{AppError, AppResult, UiError};

/// 页面内的定位器解析函数
///
/// 角色/文本/标签定位只考虑可见元素；CSS 定位返回全部匹配。
const RESOLVER: &str = r#"
const __norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const __visible = (el) => !!(el && (el.offsetWidth || el.offsetHeight || el.getClientRects().length));
const __role = (el) => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'input' && ['button', 'submit', 'reset'].includes(type)) return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (tag === 'input' && type === 'checkbox') return 'checkbox';
    if (tag === 'select') return 'combobox';
    return null;
};
const __name = (el) => __norm(el.getAttribute('aria-label') || el.innerText || el.value || el.title || '');
const __control = (el) => {
    if (!el) return null;
    if (['INPUT', 'SELECT', 'TEXTAREA'].includes(el.tagName)) return el;
    if (el.tagName === 'LABEL' && el.control) return el.control;
    const label = el.closest('label');
    if (label && label.control) return label.control;
    return el.querySelector('input, select, textarea');
};
const __resolve = (loc) => {
    switch (loc.kind) {
        case 'css':
            return Array.from(document.querySelectorAll(loc.selector));
        case 'css_with_text':
            return Array.from(document.querySelectorAll(loc.selector))
                .filter((el) => __norm(el.textContent).includes(loc.text));
        case 'role': {
            const wanted = loc.name.toLowerCase();
            return Array.from(document.querySelectorAll('*'))
                .filter((el) => __role(el) === loc.role && __visible(el))
                .filter((el) => loc.exact
                    ? __name(el) === loc.name
                    : __name(el).toLowerCase().includes(wanted));
        }
        case 'label':
            return Array.from(document.querySelectorAll('label'))
                .filter((el) => __norm(el.textContent).includes(loc.text))
                .map((el) => __control(el))
                .filter((el) => !!el);
        case 'nth': {
            const all = __resolve(loc.inner);
            return all[loc.index] ? [all[loc.index]] : [];
        }
        default:
            return [];
    }
};
"#;

/// 脚本返回值
#[derive(Debug, Deserialize)]
struct ScriptReply<T> {
    ok: bool,
    value: Option<T>,
    error: Option<String>,
}

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 把定位器和动作拼成页面脚本
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 对定位到的元素执行一段脚本
    ///
    /// `body` 中可以使用 `els`（全部匹配元素）和 `el`（首个可见匹配，没有则为首个匹配）。
    /// `body` 必须返回 `{ ok, value?, error? }`。
    pub async fn on_locator<T: DeserializeOwned>(
        &self,
        locator: &Locator,
        body: &str,
    ) -> AppResult<T> {
        let locator_json = serde_json::to_string(locator)?;
        let js_code = format!(
            r#"
            (() => {{
                {resolver}
                const els = __resolve({locator_json});
                const el = els.find(__visible) || els[0] || null;
                try {{
                    {body}
                }} catch (error) {{
                    return {{ ok: false, error: String(error && error.message || error) }};
                }}
            }})()
            "#,
            resolver = RESOLVER,
            locator_json = locator_json,
            body = body,
        );

        let reply: ScriptReply<T> = self.eval_as(js_code).await?;
        if reply.ok {
            reply
                .value
                .ok_or_else(|| AppError::script(format!("{} 的脚本没有返回值", locator)))
        } else {
            Err(map_script_error(locator, reply.error.unwrap_or_default()))
        }
    }
}

/// 把脚本错误码转换为错误类型
fn map_script_error(locator: &Locator, error: String) -> AppError {
    if error == "not_found" {
        AppError::not_found(locator)
    } else if let Some(value) = error.strip_prefix("option_missing:") {
        UiError::OptionMissing {
            locator: locator.to_string(),
            value: value.to_string(),
        }
        .into()
    } else {
        AppError::script(format!("{}: {}", locator, error))
    }
}
