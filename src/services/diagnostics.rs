//! 诊断记录服务 - 业务能力层
//!
//! 只负责"截图 + 写 diagnostics.log"能力，不关心流程。
//! 截图失败只记录日志，不会影响调用方。

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::browser::PageDriver;
use crate::error::{AppError, AppResult};

/// 诊断记录服务
pub struct DiagnosticSink {
    dir: PathBuf,
    log_path: PathBuf,
}

impl DiagnosticSink {
    /// 在指定目录下写入截图与 diagnostics.log
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let log_path = dir.join("diagnostics.log");
        Self { dir, log_path }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// 截图文件名：`<name>_<context>_<时间戳>.png`
    pub fn file_name(name: &str, context: &str) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let context = sanitize(context);
        if context.is_empty() {
            format!("{}_{}.png", name, timestamp)
        } else {
            format!("{}_{}_{}.png", name, context, timestamp)
        }
    }

    /// 截图并追加一条诊断记录
    ///
    /// 返回截图路径，失败时返回 `None`
    pub async fn capture(
        &self,
        page: &dyn PageDriver,
        name: &str,
        context: &str,
    ) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("无法创建诊断目录 {}: {}", self.dir.display(), e);
            return None;
        }

        let path = self.dir.join(Self::file_name(name, context));
        match page.screenshot(&path).await {
            Ok(()) => {
                debug!("📸 诊断截图: {}", path.display());
                let url = page.current_url().await.unwrap_or_default();
                if let Err(e) = self.append(&format!("{} | {} | {}", name, url, path.display())) {
                    warn!("写入诊断日志失败: {}", e);
                }
                Some(path)
            }
            Err(e) => {
                warn!("诊断截图失败 ({}): {}", path.display(), e);
                None
            }
        }
    }

    /// 追加一行诊断记录
    pub fn append(&self, line: &str) -> AppResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| AppError::output(&self.dir, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AppError::output(&self.log_path, e))?;

        let entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            line
        );
        file.write_all(entry.as_bytes())
            .map_err(|e| AppError::output(&self.log_path, e))?;
        Ok(())
    }
}

/// 文件名中只保留字母、数字、`-` 和 `_`
pub(crate) fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;

    #[test]
    fn test_file_name_layout() {
        let name = DiagnosticSink::file_name("login_error", "session_attempt_2");
        assert!(name.starts_with("login_error_session_attempt_2_"));
        assert!(name.ends_with(".png"));

        let name = DiagnosticSink::file_name("drafts_error", "");
        assert!(name.starts_with("drafts_error_2"));
    }

    #[test]
    fn test_context_is_sanitized() {
        assert_eq!(sanitize("draft 3/123"), "draft_3_123");
    }

    #[tokio::test]
    async fn test_capture_records_screenshot_and_log_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path().join("diag"));
        let page = FakePage::new();

        let path = sink.capture(&page, "draft_1", "42").await.unwrap();
        assert_eq!(page.screenshots(), vec![path.clone()]);
        assert!(path.starts_with(sink.dir()));

        let log = fs::read_to_string(sink.log_path()).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("draft_1"));
    }
}
