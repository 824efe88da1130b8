//! 状态通道 - 业务能力层
//!
//! 所有任务通过有界队列把状态发给唯一的汇总任务，
//! 汇总任务持有 `worker_id → 最新消息` 的映射，并通过 watch 通道发布快照。
//! 读取方（终端观察者）按自己的节奏读取快照。

use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 队列容量
pub const DEFAULT_CAPACITY: usize = 256;

/// 历史记录中的一条事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Message {
        seq: u64,
        worker_id: String,
        message: String,
    },
    Remaining {
        seq: u64,
        remaining: usize,
    },
}

/// 状态快照
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// 按首次出现顺序排列的最新消息
    pub entries: IndexMap<String, String>,
    /// 剩余草稿数
    pub remaining: Option<usize>,
    /// 全部历史（仅在开启历史记录时填充）
    pub history: Vec<StatusEvent>,
    /// 已处理的事件数
    pub seq: u64,
}

impl StatusSnapshot {
    /// 历史中所有剩余数的变化
    pub fn remaining_trail(&self) -> Vec<usize> {
        self.history
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Remaining { remaining, .. } => Some(*remaining),
                StatusEvent::Message { .. } => None,
            })
            .collect()
    }

    /// 渲染为多行文本
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(worker, message)| format!("{}: {}", worker, message))
            .collect();
        if let Some(remaining) = self.remaining {
            lines.push(format!("剩余草稿: {}", remaining));
        }
        lines.join("\n")
    }
}

enum Command {
    Publish { worker_id: String, message: String },
    Remaining(usize),
    Flush(oneshot::Sender<()>),
}

/// 状态发布句柄（可克隆，每个任务持有一份）
#[derive(Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<StatusSnapshot>,
}

impl StatusHandle {
    /// 更新某个任务的最新状态
    pub async fn publish(&self, worker_id: impl Into<String>, message: impl Into<String>) {
        let worker_id = worker_id.into();
        let message = message.into();
        debug!("[{}] {}", worker_id, message);
        // 汇总任务已结束时丢弃
        let _ = self.tx.send(Command::Publish { worker_id, message }).await;
    }

    /// 更新剩余草稿数
    pub async fn set_remaining(&self, remaining: usize) {
        let _ = self.tx.send(Command::Remaining(remaining)).await;
    }

    /// 等待此前发送的所有事件被汇总
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.borrow().clone()
    }
}

/// 状态通道
pub struct StatusChannel;

impl StatusChannel {
    /// 启动汇总任务
    ///
    /// 所有 `StatusHandle` 被丢弃后汇总任务退出。
    pub fn spawn(capacity: usize, retain_history: bool) -> (StatusHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(StatusSnapshot::default());
        let task = tokio::spawn(aggregate(rx, snapshot_tx, retain_history));
        (
            StatusHandle {
                tx,
                snapshot: snapshot_rx,
            },
            task,
        )
    }
}

/// 汇总循环：一次取空队列，再发布一次快照
async fn aggregate(
    mut rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<StatusSnapshot>,
    retain_history: bool,
) {
    let mut state = StatusSnapshot::default();

    while let Some(first) = rx.recv().await {
        let mut waiters = Vec::new();
        let mut next = Some(first);

        while let Some(command) = next {
            match command {
                Command::Publish { worker_id, message } => {
                    state.seq += 1;
                    if retain_history {
                        state.history.push(StatusEvent::Message {
                            seq: state.seq,
                            worker_id: worker_id.clone(),
                            message: message.clone(),
                        });
                    }
                    state.entries.insert(worker_id, message);
                }
                Command::Remaining(remaining) => {
                    state.seq += 1;
                    if retain_history {
                        state.history.push(StatusEvent::Remaining {
                            seq: state.seq,
                            remaining,
                        });
                    }
                    state.remaining = Some(remaining);
                }
                Command::Flush(reply) => waiters.push(reply),
            }
            next = rx.try_recv().ok();
        }

        snapshot_tx.send_replace(state.clone());
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

/// 终端观察者：按固定间隔输出有变化的快照
pub fn spawn_console_observer(
    handle: StatusHandle,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rendered: IndexMap<String, String> = IndexMap::new();
        let mut last_remaining = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = handle.snapshot();
            for (worker, message) in &snapshot.entries {
                if rendered.get(worker) != Some(message) {
                    info!("📡 {}: {}", worker, message);
                    rendered.insert(worker.clone(), message.clone());
                }
            }
            if snapshot.remaining != last_remaining {
                if let Some(remaining) = snapshot.remaining {
                    info!("📋 剩余草稿: {}", remaining);
                }
                last_remaining = snapshot.remaining;
            }
        }
    })
}
