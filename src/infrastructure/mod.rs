pub mod chromium_page;
pub mod js_executor;

pub use chromium_page::{ChromiumContext, ChromiumPage};
pub use js_executor::JsExecutor;
