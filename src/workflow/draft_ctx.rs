//! 草稿处理上下文
//!
//! 封装"我正在处理第几份草稿"这一信息

use std::fmt::Display;

use crate::models::DraftHandle;

/// 草稿处理上下文
#[derive(Debug, Clone)]
pub struct DraftCtx {
    pub handle: DraftHandle,

    /// 状态通道中的任务名
    pub worker_id: String,
}

impl DraftCtx {
    pub fn new(handle: DraftHandle) -> Self {
        let worker_id = format!("draft-{}", handle.index);
        Self { handle, worker_id }
    }

    pub fn index(&self) -> usize {
        self.handle.index
    }
}

impl Display for DraftCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[草稿 {} ID#{}]", self.handle.index, self.handle.id)
    }
}
