//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 连接或启动浏览器，持有浏览器资源
//! - 启动状态通道与终端观察者
//! - 登录、发现草稿、交给调度器、输出统计
//!
//! ### `batch_processor` - 批量草稿调度器
//! - 按批切分草稿列表，每批完成后再开始下一批
//! - 每份草稿一个标签页，用 Semaphore 控制并发
//! - 发布剩余草稿数，处理取消
//!
//! ## 层次关系
//!
//! ```text
//! app (登录 → 发现 → 调度)
//!     ↓
//! batch_processor (处理 Vec<DraftHandle>)
//!     ↓
//! workflow::DraftFlow (处理单份草稿的所有分区)
//!     ↓
//! services (能力层：session / discovery / status / diagnostics)
//!     ↓
//! infrastructure (基础设施：ChromiumPage)
//! ```

pub mod app;
pub mod batch_processor;

pub use app::{App, RunOutcome};
pub use batch_processor::{BatchPlan, BatchScheduler, BatchSummary};
