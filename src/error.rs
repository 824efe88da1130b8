use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 分类与失败的处理范围一一对应：
/// 步骤（TransientUi）→ 分区（Section）→ 草稿 → 批次（Batch）→ 整次运行
#[derive(Debug, Error)]
pub enum AppError {
    /// 页面交互失败（可重试）
    #[error("页面交互失败: {0}")]
    TransientUi(#[from] UiError),
    /// 登录失败
    #[error("登录失败: {0}")]
    Authentication(#[from] AuthError),
    /// 草稿列表获取失败（整次运行终止）
    #[error("草稿列表获取失败: {0}")]
    Discovery(#[from] DiscoveryError),
    /// 表单分区失败（仅影响当前草稿）
    #[error("表单分区失败: {0}")]
    Section(#[from] SectionError),
    /// 批次调度错误
    #[error("批次调度错误: {0}")]
    Batch(#[from] BatchError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 写入输出文件失败
    #[error("写入文件失败 ({path}): {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
    /// 运行被外部取消
    #[error("运行已取消")]
    Cancelled,
}

impl AppError {
    /// 是否属于可以通过重试恢复的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientUi(_) | AppError::Browser(_))
    }
}

/// 页面交互错误
#[derive(Debug, Error)]
pub enum UiError {
    /// 等待元素超时
    #[error("等待 {locator} 超时 ({waited:?})")]
    Timeout { locator: String, waited: Duration },
    /// 等待 URL 超时
    #[error("等待跳转到 {expected} 超时 ({waited:?})，当前 URL: {actual}")]
    NavigationTimeout {
        expected: String,
        actual: String,
        waited: Duration,
    },
    /// 元素不存在
    #[error("未找到元素: {locator}")]
    ElementNotFound { locator: String },
    /// 下拉框缺少选项
    #[error("下拉框 {locator} 中没有选项 {value}")]
    OptionMissing { locator: String, value: String },
    /// 页面脚本执行失败
    #[error("执行脚本失败: {reason}")]
    ScriptFailed { reason: String },
}

/// 登录错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 页面提示凭据无效
    #[error("第 {attempt} 次尝试被拒绝: {reason}")]
    Rejected { attempt: u32, reason: String },
    /// 尝试次数耗尽
    #[error("已尝试 {attempts} 次，全部失败")]
    AttemptsExhausted { attempts: u32 },
    /// 用户取消重新输入
    #[error("用户在第 {attempt} 次尝试后取消")]
    Cancelled { attempt: u32 },
}

/// 草稿列表错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 某一页加载或解析失败
    #[error("第 {page} 页加载失败: {reason}")]
    PageFailed { page: usize, reason: String },
    /// 无法打开申请列表
    #[error("无法打开申请列表: {reason}")]
    ListingUnavailable { reason: String },
}

/// 表单分区错误
#[derive(Debug, Error)]
pub enum SectionError {
    /// 重试次数耗尽
    #[error("分区 {section} 在 {marker} 处失败 (已尝试 {attempts} 次): {reason}")]
    AttemptsExhausted {
        section: String,
        marker: String,
        attempts: u32,
        reason: String,
    },
    /// 草稿页面无法打开
    #[error("无法打开草稿 {url}: {reason}")]
    DraftUnavailable { url: String, reason: String },
}

/// 批次调度错误
#[derive(Debug, Error)]
pub enum BatchError {
    /// 草稿任务异常退出
    #[error("草稿 {draft_index} 的任务异常退出: {reason}")]
    TaskAborted { draft_index: usize, reason: String },
    /// 无法为草稿打开新标签页
    #[error("无法为草稿 {draft_index} 打开标签页: {reason}")]
    TabUnavailable { draft_index: usize, reason: String },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 ({endpoint}): {source}")]
    ConnectionFailed {
        endpoint: String,
        source: chromiumoxide::error::CdpError,
    },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// CDP 协议错误
    #[error("CDP 错误: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    /// 截图失败
    #[error("截图保存失败 ({path}): {reason}")]
    ScreenshotFailed { path: String, reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// 配置文件格式错误
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
    /// 缺少登录凭据
    #[error("缺少登录凭据 (DRAFT_EMAIL / DRAFT_PASSWORD)")]
    MissingCredentials,
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::TransientUi(UiError::ScriptFailed {
            reason: err.to_string(),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建等待超时错误
    pub fn timeout(locator: impl ToString, waited: Duration) -> Self {
        AppError::TransientUi(UiError::Timeout {
            locator: locator.to_string(),
            waited,
        })
    }

    /// 创建元素不存在错误
    pub fn not_found(locator: impl ToString) -> Self {
        AppError::TransientUi(UiError::ElementNotFound {
            locator: locator.to_string(),
        })
    }

    /// 创建文件写入错误
    pub fn output(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Output {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// 创建脚本失败错误
    pub fn script(reason: impl Into<String>) -> Self {
        AppError::TransientUi(UiError::ScriptFailed {
            reason: reason.into(),
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
