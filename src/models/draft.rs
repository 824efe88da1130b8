use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;

/// 申请 URL 中的数字编号
fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/(\d+)(?:[/?#]|$)").expect("合法的正则表达式"))
}

/// 草稿句柄（以 URL 唯一标识）
#[derive(Debug, Clone, Serialize)]
pub struct DraftHandle {
    /// 完整 URL
    pub url: String,
    /// URL 中的申请编号，没有时为 URL 本身
    pub id: String,
    /// 发现顺序（从 1 开始，用于日志与截图命名）
    pub index: usize,
    pub discovered_at: DateTime<Local>,
}

impl DraftHandle {
    pub fn new(url: impl Into<String>, index: usize) -> Self {
        let url = url.into();
        let id = id_pattern()
            .captures_iter(&url)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| url.clone());
        Self {
            url,
            id,
            index,
            discovered_at: Local::now(),
        }
    }
}

impl PartialEq for DraftHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for DraftHandle {}

/// 草稿处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DraftOutcome {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// 部分分区完成（仅在部分计分策略下出现）
    Partial,
    /// 被外部取消
    Aborted,
}

impl fmt::Display for DraftOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DraftOutcome::Pending => "等待中",
            DraftOutcome::InProgress => "处理中",
            DraftOutcome::Completed => "已完成",
            DraftOutcome::Failed => "失败",
            DraftOutcome::Partial => "部分完成",
            DraftOutcome::Aborted => "已取消",
        };
        f.write_str(text)
    }
}

/// 分区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionStatus {
    Pending,
    Completed,
    Failed,
    /// 前面的必需分区失败，未执行
    Skipped,
}

/// 单个分区的处理记录
#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub key: String,
    pub status: SectionStatus,
    pub attempts: u32,
    /// 最后停留的步骤
    pub last_marker: String,
}

impl SectionReport {
    pub fn skipped(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: SectionStatus::Skipped,
            attempts: 0,
            last_marker: String::new(),
        }
    }
}

/// 单份草稿的处理状态，只由处理它的任务持有
#[derive(Debug, Clone, Serialize)]
pub struct DraftJobState {
    pub handle: DraftHandle,
    pub sections: Vec<SectionReport>,
    pub outcome: DraftOutcome,
    /// 提取到的职位描述
    pub job_description: Option<String>,
    /// 最后一次错误
    pub error: Option<String>,
}

impl DraftJobState {
    pub fn new(handle: DraftHandle) -> Self {
        Self {
            handle,
            sections: Vec::new(),
            outcome: DraftOutcome::Pending,
            job_description: None,
            error: None,
        }
    }

    /// 以指定结果结束
    pub fn finished(handle: DraftHandle, outcome: DraftOutcome, error: Option<String>) -> Self {
        Self {
            outcome,
            error,
            ..Self::new(handle)
        }
    }

    pub fn completed_sections(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.status == SectionStatus::Completed)
            .count()
    }

    pub fn section(&self, key: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.key == key)
    }
}
