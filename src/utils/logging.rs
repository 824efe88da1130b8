/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::DraftJobState;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("draft_autofill={},warn", default_level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件，写入表头
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n草稿处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| AppError::output(log_file_path, e))
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 草稿批量处理模式");
    info!("🌐 站点: {}", config.base_url);
    info!("📊 每批草稿数: {}", config.batch_size);
    info!("🔁 分区最多尝试: {} 次", config.section_max_attempts);
    info!("{}", "=".repeat(60));
}

/// 记录草稿发现结果
pub fn log_drafts_loaded(total: usize, batch_size: usize) {
    info!("✓ 找到 {} 份待处理的草稿", total);
    info!("📋 将以每批 {} 份的方式处理", batch_size);
    info!("💡 每批完成后再开始下一批\n");
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始草稿序号
/// - `end`: 结束草稿序号
/// - `total`: 草稿总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批草稿: {}-{} / 共 {} 份", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
    info!("{}", "─".repeat(60));
}

/// 最终统计
#[derive(Debug, Default, Clone, Copy)]
pub struct FinalStats {
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
    pub aborted: usize,
    pub total: usize,
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &FinalStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成: {}/{}", stats.completed, stats.total);
    if stats.partial > 0 {
        info!("🟡 部分完成: {}", stats.partial);
    }
    info!("❌ 失败: {}", stats.failed);
    if stats.aborted > 0 {
        info!("⏹️ 已取消: {}", stats.aborted);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 把每份草稿的结果追加到日志文件，每份一行
pub fn append_outcomes(log_file_path: &str, outcomes: &[DraftJobState]) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| AppError::output(log_file_path, e))?;

    for state in outcomes {
        let sections = state
            .sections
            .iter()
            .map(|s| format!("{}={:?}", s.key, s.status))
            .collect::<Vec<_>>()
            .join(", ");
        let line = format!(
            "[草稿 {}] ID#{} {:?} | {}{}\n",
            state.handle.index,
            state.handle.id,
            state.outcome,
            sections,
            state
                .error
                .as_deref()
                .map(|e| format!(" | {}", e))
                .unwrap_or_default()
        );
        file.write_all(line.as_bytes())
            .map_err(|e| AppError::output(log_file_path, e))?;
    }
    Ok(())
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
