use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::models::Credentials;

/// 分区失败后草稿结果的统计方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 任何必需分区失败，整份草稿记为失败
    FailStop,
    /// 已完成部分分区时记为部分完成
    PartialCredit,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_stop" | "failstop" => Ok(FailurePolicy::FailStop),
            "partial_credit" | "partialcredit" | "partial" => Ok(FailurePolicy::PartialCredit),
            other => Err(format!("未知的失败策略: {}", other)),
        }
    }
}

/// 等待与停顿时间（毫秒）
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Cookie 横幅等待
    pub cookie_banner_ms: u64,
    /// 登录表单出现
    pub login_form_ms: u64,
    /// 登录后跳转
    pub login_verify_ms: u64,
    /// 列表页结果容器
    pub listing_ms: u64,
    /// 普通元素等待
    pub selector_ms: u64,
    /// 通用分区编辑入口
    pub section_editor_ms: u64,
    /// "Save & next" 按钮
    pub advance_button_ms: u64,
    /// 提示条出现
    pub toast_ms: u64,
    /// 打开草稿后的停顿
    pub draft_open_settle_ms: u64,
    /// 切换筛选条件后的停顿
    pub filter_settle_ms: u64,
    /// 分区重试前刷新后的停顿
    pub retry_settle_ms: u64,
    /// 连续点击 "Save & next" 的间隔
    pub advance_settle_ms: u64,
    /// 关闭标签页之间的间隔
    pub tab_close_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            cookie_banner_ms: 3_000,
            login_form_ms: 8_000,
            login_verify_ms: 10_000,
            listing_ms: 5_000,
            selector_ms: 5_000,
            section_editor_ms: 6_000,
            advance_button_ms: 10_000,
            toast_ms: 3_000,
            draft_open_settle_ms: 2_000,
            filter_settle_ms: 2_000,
            retry_settle_ms: 2_000,
            advance_settle_ms: 1_000,
            tab_close_settle_ms: 500,
        }
    }
}

impl Timings {
    /// 所有停顿为零（等待时间保留），用于测试
    pub fn instant() -> Self {
        Self {
            draft_open_settle_ms: 0,
            filter_settle_ms: 0,
            retry_settle_ms: 0,
            advance_settle_ms: 0,
            tab_close_settle_ms: 0,
            ..Self::default()
        }
    }

    pub fn cookie_banner(&self) -> Duration {
        Duration::from_millis(self.cookie_banner_ms)
    }

    pub fn login_form(&self) -> Duration {
        Duration::from_millis(self.login_form_ms)
    }

    pub fn login_verify(&self) -> Duration {
        Duration::from_millis(self.login_verify_ms)
    }

    pub fn listing(&self) -> Duration {
        Duration::from_millis(self.listing_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    pub fn section_editor(&self) -> Duration {
        Duration::from_millis(self.section_editor_ms)
    }

    pub fn advance_button(&self) -> Duration {
        Duration::from_millis(self.advance_button_ms)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn draft_open_settle(&self) -> Duration {
        Duration::from_millis(self.draft_open_settle_ms)
    }

    pub fn filter_settle(&self) -> Duration {
        Duration::from_millis(self.filter_settle_ms)
    }

    pub fn retry_settle(&self) -> Duration {
        Duration::from_millis(self.retry_settle_ms)
    }

    pub fn advance_settle(&self) -> Duration {
        Duration::from_millis(self.advance_settle_ms)
    }

    pub fn tab_close_settle(&self) -> Duration {
        Duration::from_millis(self.tab_close_settle_ms)
    }
}

/// 通用分区目录的覆盖项
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SectionSettings {
    /// 四个详细分区之后依次处理的分区 key
    pub generic_sections: Vec<String>,
    /// 处理完后需要刷新页面以显示后续分区的 key
    pub reveal_after: String,
    /// 终止边界（不处理）
    pub boundary: String,
    /// 每个通用分区最多点击 "Save & next" 的次数
    pub max_advances: usize,
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self {
            generic_sections: [
                "genedu",
                "gentraining",
                "profmembership",
                "nhsservice",
                "emphistory",
                "gaps",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            reveal_after: "gaps".to_string(),
            boundary: "supportinginfo".to_string(),
            max_advances: 5,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 站点根地址
    pub base_url: String,
    /// 登录成功后的页面地址前缀
    pub dashboard_url: String,
    /// 草稿列表分页地址（末尾拼接页码）
    pub listing_url_template: String,
    /// 登录邮箱
    pub email: String,
    /// 登录密码
    pub password: String,
    /// 每批同时处理的草稿数量
    pub batch_size: usize,
    /// 列表每页条数
    pub page_size: usize,
    /// 最多翻页数
    pub max_pages: usize,
    /// 登录最多尝试次数
    pub max_login_attempts: u32,
    /// 每个分区最多尝试次数
    pub section_max_attempts: u32,
    /// 浏览器调试端口（设置后连接已有浏览器，否则启动新浏览器）
    pub browser_debug_port: Option<u16>,
    /// 启动新浏览器时是否无头
    pub headless: bool,
    /// 浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 截图与诊断目录
    pub diagnostics_dir: String,
    /// 生成文档的输出目录
    pub output_dir: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 登录后保存会话状态的路径
    pub storage_state_path: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 分区失败时的统计策略
    pub failure_policy: FailurePolicy,
    /// 是否保留全部状态历史
    pub status_history: bool,
    /// 状态输出间隔（毫秒）
    pub status_poll_interval_ms: u64,
    /// 登录失败时是否在终端提示重新输入
    pub interactive_prompt: bool,
    // --- 文档生成配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 简历文本文件
    pub resume_path: Option<String>,
    /// 提示词模板文件（包含 {resume} 和 {job_description} 占位符）
    pub prompt_template_path: Option<String>,
    pub timings: Timings,
    pub sections: SectionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://apps.trac.jobs".to_string(),
            dashboard_url: "https://apps.trac.jobs/dashboard".to_string(),
            listing_url_template: "https://apps.trac.jobs/applicationlist?Text=&Status%5B%5D=Draft&Submit=Search&_srt=lastupdateforcandidate&_sd=d&_pg=".to_string(),
            email: String::new(),
            password: String::new(),
            batch_size: 5,
            page_size: 10,
            max_pages: 200,
            max_login_attempts: 3,
            section_max_attempts: 2,
            browser_debug_port: None,
            headless: false,
            chrome_executable: None,
            diagnostics_dir: "diagnostics".to_string(),
            output_dir: "output".to_string(),
            output_log_file: "output.txt".to_string(),
            storage_state_path: None,
            verbose_logging: false,
            failure_policy: FailurePolicy::FailStop,
            status_history: false,
            status_poll_interval_ms: 1_000,
            interactive_prompt: true,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-pro".to_string(),
            resume_path: None,
            prompt_template_path: None,
            timings: Timings::default(),
            sections: SectionSettings::default(),
        }
    }
}

impl Config {
    /// 加载配置：可选的 TOML 文件，再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// 从 TOML 文件读取，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(config)
    }

    /// 仅使用默认值和环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().apply_env()
    }

    fn apply_env(self) -> AppResult<Self> {
        Ok(Self {
            base_url: env_string("DRAFT_BASE_URL", self.base_url),
            dashboard_url: env_string("DRAFT_DASHBOARD_URL", self.dashboard_url),
            listing_url_template: env_string("DRAFT_LISTING_URL", self.listing_url_template),
            email: env_string("DRAFT_EMAIL", self.email),
            password: env_string("DRAFT_PASSWORD", self.password),
            batch_size: env_parse("DRAFT_BATCH_SIZE", self.batch_size)?,
            page_size: env_parse("DRAFT_PAGE_SIZE", self.page_size)?,
            max_pages: env_parse("DRAFT_MAX_PAGES", self.max_pages)?,
            max_login_attempts: env_parse("MAX_LOGIN_ATTEMPTS", self.max_login_attempts)?,
            section_max_attempts: env_parse("SECTION_MAX_ATTEMPTS", self.section_max_attempts)?,
            browser_debug_port: match std::env::var("BROWSER_DEBUG_PORT") {
                Ok(v) => Some(parse_value("BROWSER_DEBUG_PORT", &v)?),
                Err(_) => self.browser_debug_port,
            },
            headless: env_parse("HEADLESS", self.headless)?,
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .or(self.chrome_executable),
            diagnostics_dir: env_string("DIAGNOSTICS_DIR", self.diagnostics_dir),
            output_dir: env_string("OUTPUT_DIR", self.output_dir),
            output_log_file: env_string("OUTPUT_LOG_FILE", self.output_log_file),
            storage_state_path: std::env::var("STORAGE_STATE_PATH")
                .ok()
                .or(self.storage_state_path),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging)?,
            failure_policy: env_parse("FAILURE_POLICY", self.failure_policy)?,
            status_history: env_parse("STATUS_HISTORY", self.status_history)?,
            status_poll_interval_ms: env_parse(
                "STATUS_POLL_INTERVAL_MS",
                self.status_poll_interval_ms,
            )?,
            interactive_prompt: env_parse("INTERACTIVE_PROMPT", self.interactive_prompt)?,
            llm_api_key: env_string("LLM_API_KEY", self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL", self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME", self.llm_model_name),
            resume_path: std::env::var("RESUME_PATH").ok().or(self.resume_path),
            prompt_template_path: std::env::var("PROMPT_TEMPLATE_PATH")
                .ok()
                .or(self.prompt_template_path),
            timings: self.timings,
            sections: self.sections,
        })
    }

    /// 登录凭据
    pub fn credentials(&self) -> AppResult<Credentials> {
        let credentials = Credentials::new(&self.email, &self.password);
        if credentials.is_complete() {
            Ok(credentials)
        } else {
            Err(ConfigError::MissingCredentials.into())
        }
    }

    /// 状态输出间隔
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms.max(1))
    }

    /// 是否启用文档生成
    pub fn document_generation_enabled(&self) -> bool {
        !self.llm_api_key.is_empty() && self.resume_path.is_some()
    }
}

fn env_string(var_name: &str, default: String) -> String {
    std::env::var(var_name).unwrap_or(default)
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> AppResult<T> {
    match std::env::var(var_name) {
        Ok(value) => parse_value(var_name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(var_name: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        }
        .into()
    })
}
