//! # Draft Autofill
//!
//! 批量推进求职网站上的申请草稿：登录、发现草稿、逐个分区填写并保存
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 页面能力接口 `PageDriver` / `BrowserContext`，连接或启动浏览器
//! - `infrastructure/` - 基于 chromiumoxide 的实现，`JsExecutor` 解析定位器
//!
//! ### ② 业务能力层（Services）
//! - `SessionManager` - 登录、Cookie 弹窗、凭据重试
//! - `DraftDiscovery` - 分页收集草稿链接
//! - `StatusChannel` - 状态汇总（消息传递，无共享锁）
//! - `DiagnosticSink` - 失败截图与诊断日志
//! - `DocumentGenerator` - 根据职位描述生成支持性文档
//!
//! ### ③ 流程层（Workflow）
//! - `markers` - 每个分区的进度标记与转移表
//! - `section_runner` - 从标记处恢复的分区重试
//! - `DraftFlow` - 按分区目录推进一份草稿
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用生命周期
//! - `orchestrator/batch_processor` - 分批并发调度
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserContext, Locator, PageDriver};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ChromiumContext, ChromiumPage};
pub use models::{DraftHandle, DraftJobState, DraftOutcome};
pub use orchestrator::{App, BatchScheduler, BatchSummary, RunOutcome};
pub use workflow::{DraftCtx, DraftFlow};
