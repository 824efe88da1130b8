//! 凭据提示 - 业务能力层
//!
//! 登录失败后向用户询问新的凭据。

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::Credentials;

/// 用户的答复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    /// 使用新凭据重试
    Replaced(Credentials),
    /// 使用原凭据重试
    Unchanged,
    /// 放弃登录
    Cancelled,
}

#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// `attempt` 为刚刚失败的尝试序号（从 1 开始）
    async fn request(&self, worker_id: &str, attempt: u32, current: &Credentials)
        -> PromptResponse;
}

/// 非交互模式：总是使用原凭据重试
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompt;

#[async_trait]
impl CredentialPrompt for NonInteractivePrompt {
    async fn request(
        &self,
        worker_id: &str,
        attempt: u32,
        _current: &Credentials,
    ) -> PromptResponse {
        info!("[{}] 非交互模式，第 {} 次失败后使用原凭据重试", worker_id, attempt);
        PromptResponse::Unchanged
    }
}

/// 终端提示：依次读取邮箱和密码，任一项为空视为放弃
pub struct TerminalPrompt<R> {
    lines: Mutex<Lines<BufReader<R>>>,
}

impl TerminalPrompt<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin + Send> TerminalPrompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(reader).lines()),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> CredentialPrompt for TerminalPrompt<R> {
    async fn request(
        &self,
        worker_id: &str,
        attempt: u32,
        current: &Credentials,
    ) -> PromptResponse {
        let mut lines = self.lines.lock().await;

        println!(
            "\n[{}] 第 {} 次登录失败 ({})，请重新输入凭据（直接回车放弃）",
            worker_id, attempt, current.identifier
        );

        println!("邮箱:");
        let identifier = match lines.next_line().await {
            Ok(Some(line)) => line.trim().to_string(),
            Ok(None) => return PromptResponse::Cancelled,
            Err(e) => {
                warn!("读取终端输入失败: {}", e);
                return PromptResponse::Cancelled;
            }
        };
        if identifier.is_empty() {
            return PromptResponse::Cancelled;
        }

        println!("密码:");
        let secret = match lines.next_line().await {
            Ok(Some(line)) => line.trim_end_matches(['\r', '\n']).to_string(),
            Ok(None) => return PromptResponse::Cancelled,
            Err(e) => {
                warn!("读取终端输入失败: {}", e);
                return PromptResponse::Cancelled;
            }
        };
        if secret.is_empty() {
            return PromptResponse::Cancelled;
        }

        let replacement = Credentials::new(identifier, secret);
        if &replacement == current {
            PromptResponse::Unchanged
        } else {
            PromptResponse::Replaced(replacement)
        }
    }
}
