pub mod connection;
pub mod driver;
#[cfg(test)]
pub mod fake;
pub mod headless;

pub use connection::connect_to_browser;
pub use driver::{BrowserContext, Locator, PageDriver};
pub use headless::launch_browser;

use chromiumoxide::Browser;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::AppResult;

/// 浏览器来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserMode {
    /// 连接用户已打开的浏览器，结束时不关闭
    Attached,
    /// 由本程序启动，结束时关闭
    Launched,
}

/// 按配置连接或启动浏览器
pub async fn open_browser(config: &Config) -> AppResult<(Browser, JoinHandle<()>, BrowserMode)> {
    match config.browser_debug_port {
        Some(port) => {
            let (browser, handle) = connect_to_browser(port).await?;
            Ok((browser, handle, BrowserMode::Attached))
        }
        None => {
            let (browser, handle) =
                launch_browser(config.headless, config.chrome_executable.as_deref()).await?;
            Ok((browser, handle, BrowserMode::Launched))
        }
    }
}
