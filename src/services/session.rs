//! 登录会话 - 业务能力层
//!
//! 负责在一个标签页上完成登录：打开入口页、关闭 Cookie 横幅、
//! 填写凭据、确认跳转以及检查页面上的错误提示。
//! 失败后通过 `CredentialPrompt` 询问是否更换凭据。

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::browser::{Locator, PageDriver};
use crate::config::{Config, Timings};
use crate::error::{AppError, AppResult, AuthError, UiError};
use crate::models::Credentials;
use crate::services::credential_prompt::{CredentialPrompt, PromptResponse};
use crate::services::diagnostics::DiagnosticSink;
use crate::services::status::StatusHandle;

const EMAIL_FIELD: &str = "input[name='FrmCoreLogin-CandidateSignIn_Email']";
const PASSWORD_FIELD: &str = "input[name='FrmCoreLogin-CandidateSignIn_Password']";
const ERROR_INDICATOR: &str = ".error-message, .alert-danger";

/// 登录结果
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub success: bool,
    /// 最后一次使用的凭据
    pub credentials: Credentials,
    /// 实际尝试次数
    pub attempts: u32,
    /// 用户是否放弃
    pub cancelled: bool,
}

impl AuthResult {
    /// 转换为错误类型，成功时返回凭据
    pub fn into_result(self) -> AppResult<Credentials> {
        if self.success {
            Ok(self.credentials)
        } else if self.cancelled {
            Err(AuthError::Cancelled {
                attempt: self.attempts,
            }
            .into())
        } else {
            Err(AuthError::AttemptsExhausted {
                attempts: self.attempts,
            }
            .into())
        }
    }
}

/// 登录会话管理
pub struct SessionManager {
    entry_url: String,
    dashboard_url: String,
    max_attempts: u32,
    timings: Timings,
    storage_state_path: Option<PathBuf>,
    status: StatusHandle,
    diagnostics: Arc<DiagnosticSink>,
    prompt: Arc<dyn CredentialPrompt>,
    worker_id: String,
}

impl SessionManager {
    pub fn new(
        config: &Config,
        status: StatusHandle,
        diagnostics: Arc<DiagnosticSink>,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            entry_url: config.base_url.clone(),
            dashboard_url: config.dashboard_url.clone(),
            max_attempts: config.max_login_attempts.max(1),
            timings: config.timings.clone(),
            storage_state_path: config.storage_state_path.as_ref().map(PathBuf::from),
            status,
            diagnostics,
            prompt,
            worker_id: "session".to_string(),
        }
    }

    /// 登录，失败时按用户答复重试，最多 `max_attempts` 次
    pub async fn authenticate(
        &self,
        page: &dyn PageDriver,
        credentials: Credentials,
    ) -> AuthResult {
        let mut current = credentials;
        let mut attempt = 1;

        loop {
            match self.attempt_login(page, &current, attempt).await {
                Ok(()) => {
                    info!("[{}] ✅ 登录成功 (第 {} 次尝试)", self.worker_id, attempt);
                    self.status(format!("登录成功 (第 {} 次尝试)", attempt))
                        .await;
                    self.persist_storage_state(page).await;
                    return AuthResult {
                        success: true,
                        credentials: current,
                        attempts: attempt,
                        cancelled: false,
                    };
                }
                Err(e) => {
                    error!(
                        "[{}] ❌ 登录失败 (第 {}/{} 次): {}",
                        self.worker_id, attempt, self.max_attempts, e
                    );
                    self.status(format!(
                        "登录失败 (第 {}/{} 次): {}",
                        attempt, self.max_attempts, e
                    ))
                    .await;
                    self.diagnostics
                        .capture(
                            page,
                            "login_error",
                            &format!("{}_attempt_{}", self.worker_id, attempt),
                        )
                        .await;
                }
            }

            if attempt >= self.max_attempts {
                self.status("登录尝试次数已用完").await;
                return AuthResult {
                    success: false,
                    credentials: current,
                    attempts: attempt,
                    cancelled: false,
                };
            }

            self.status(format!(
                "等待新的凭据 (第 {}/{} 次)",
                attempt, self.max_attempts
            ))
            .await;
            match self.prompt.request(&self.worker_id, attempt, &current).await {
                PromptResponse::Replaced(replacement) => {
                    info!("[{}] 使用新凭据重试: {}", self.worker_id, replacement.identifier);
                    current = replacement;
                }
                PromptResponse::Unchanged => {
                    debug!("[{}] 使用原凭据重试", self.worker_id);
                }
                PromptResponse::Cancelled => {
                    warn!("[{}] 用户取消登录", self.worker_id);
                    self.status("用户取消重新登录").await;
                    return AuthResult {
                        success: false,
                        credentials: current,
                        attempts: attempt,
                        cancelled: true,
                    };
                }
            }
            attempt += 1;
        }
    }

    /// 单次登录尝试
    async fn attempt_login(
        &self,
        page: &dyn PageDriver,
        credentials: &Credentials,
        attempt: u32,
    ) -> AppResult<()> {
        self.status("正在打开登录页").await;
        page.goto(&self.entry_url).await?;
        self.accept_cookies(page).await;

        self.status("等待登录表单").await;
        let email = Locator::css(EMAIL_FIELD);
        page.wait_for(&email, self.timings.login_form()).await?;

        self.status("填写凭据").await;
        page.fill(&email, &credentials.identifier).await?;
        page.fill(&Locator::css(PASSWORD_FIELD), &credentials.secret)
            .await?;

        self.status("提交登录").await;
        page.click(&Locator::button("Sign in")).await?;

        self.status("确认登录").await;
        page.wait_for_url(&self.dashboard_url, self.timings.login_verify())
            .await?;

        // 跳转成功但页面仍可能提示凭据无效
        let indicator = Locator::css(ERROR_INDICATOR);
        if page.count(&indicator).await? > 0 {
            let text = page.inner_text(&indicator).await.unwrap_or_default();
            if text.to_lowercase().contains("invalid") {
                return Err(AuthError::Rejected {
                    attempt,
                    reason: text.trim().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// 关闭 Cookie 横幅，任何失败都不影响登录
    pub async fn accept_cookies(&self, page: &dyn PageDriver) {
        let banner = Locator::css_with_text("button", "Accept All");
        match page.wait_for(&banner, self.timings.cookie_banner()).await {
            Ok(()) => match page.click(&banner).await {
                Ok(()) => {
                    debug!("[{}] 🍪 已接受 Cookie", self.worker_id);
                    self.status("已接受 Cookie").await;
                }
                Err(e) => self.cookie_failure(page, e).await,
            },
            Err(AppError::TransientUi(UiError::Timeout { .. })) => {
                debug!("[{}] 没有 Cookie 横幅", self.worker_id);
                self.status("没有 Cookie 横幅").await;
            }
            Err(e) => self.cookie_failure(page, e).await,
        }
    }

    async fn cookie_failure(&self, page: &dyn PageDriver, e: AppError) {
        warn!("[{}] ⚠️ 处理 Cookie 横幅失败: {}", self.worker_id, e);
        self.status(format!("处理 Cookie 横幅失败: {}", e)).await;
        self.diagnostics
            .capture(page, "cookie_error", &self.worker_id)
            .await;
    }

    /// 保存会话状态（Cookie）
    async fn persist_storage_state(&self, page: &dyn PageDriver) {
        let Some(path) = &self.storage_state_path else {
            return;
        };

        let result = async {
            let state = page.storage_state().await?;
            let text = serde_json::to_string_pretty(&state)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| AppError::output(parent, e))?;
            }
            std::fs::write(path, text).map_err(|e| AppError::output(path, e))?;
            Ok::<(), AppError>(())
        }
        .await;

        match result {
            Ok(()) => info!("[{}] 💾 会话状态已保存: {}", self.worker_id, path.display()),
            Err(e) => warn!("[{}] ⚠️ 保存会话状态失败: {}", self.worker_id, e),
        }
    }

    async fn status(&self, message: impl Into<String>) {
        self.status.publish(&self.worker_id, message).await;
    }
}
