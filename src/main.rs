use std::path::PathBuf;

use anyhow::Result;
use draft_autofill::utils::logging;
use draft_autofill::{App, Config};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（可选的 TOML 路径作为第一个参数）
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // Ctrl-C 取消当前运行
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到 Ctrl-C，正在取消...");
            signal.cancel();
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config, cancel).await?;
    let result = app.run().await;
    app.shutdown().await;

    let outcome = result?;
    info!(
        "账号 {}: 发现 {} 份草稿，完成 {} 份",
        outcome.identifier, outcome.drafts_found, outcome.summary.completed
    );
    Ok(())
}
