//! 草稿发现 - 业务能力层
//!
//! 打开申请列表并筛选草稿，逐页收集 "Complete your application" 链接。
//! 某页链接数少于每页条数即为最后一页。

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::{Locator, PageDriver};
use crate::config::{Config, Timings};
use crate::error::{AppError, AppResult, DiscoveryError};
use crate::models::DraftHandle;
use crate::services::diagnostics::DiagnosticSink;
use crate::services::status::StatusHandle;

const DRAFT_FILTER: &str = r"#AppSearch\.Status_Draft";
const RESULTS_CONTAINER: &str = "#ApplicationListResults";
const DRAFT_LINKS: &str = "#ApplicationListResults article a";
const DRAFT_LINK_TEXT: &str = "Complete your application";

/// 草稿发现
pub struct DraftDiscovery {
    base_url: String,
    listing_url_template: String,
    page_size: usize,
    max_pages: usize,
    timings: Timings,
    status: StatusHandle,
    diagnostics: Arc<DiagnosticSink>,
    worker_id: String,
}

impl DraftDiscovery {
    pub fn new(config: &Config, status: StatusHandle, diagnostics: Arc<DiagnosticSink>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            listing_url_template: config.listing_url_template.clone(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
            timings: config.timings.clone(),
            status,
            diagnostics,
            worker_id: "discovery".to_string(),
        }
    }

    /// 收集所有草稿，任何错误都返回空列表
    pub async fn list_drafts(&self, page: &dyn PageDriver) -> Vec<DraftHandle> {
        match self.collect(page).await {
            Ok(drafts) => {
                info!("[{}] ✓ 共找到 {} 份草稿", self.worker_id, drafts.len());
                self.status(format!("共找到 {} 份草稿", drafts.len())).await;
                drafts
            }
            Err(e) => {
                error!("[{}] ❌ 获取草稿列表失败: {}", self.worker_id, e);
                self.status(format!("获取草稿列表失败: {}", e)).await;
                self.diagnostics
                    .capture(page, "drafts_error", &self.worker_id)
                    .await;
                Vec::new()
            }
        }
    }

    async fn collect(&self, page: &dyn PageDriver) -> AppResult<Vec<DraftHandle>> {
        self.open_draft_filter(page).await.map_err(|e| {
            AppError::from(DiscoveryError::ListingUnavailable {
                reason: e.to_string(),
            })
        })?;

        let mut seen = HashSet::new();
        let mut drafts = Vec::new();

        for page_number in 1..=self.max_pages {
            let hrefs = self
                .page_links(page, page_number)
                .await
                .map_err(|e| {
                    AppError::from(DiscoveryError::PageFailed {
                        page: page_number,
                        reason: e.to_string(),
                    })
                })?;

            let count = hrefs.len();
            for href in hrefs {
                let url = resolve_url(&self.base_url, &href);
                if seen.insert(url.clone()) {
                    drafts.push(DraftHandle::new(url, drafts.len() + 1));
                }
            }

            debug!(
                "[{}] 第 {} 页: {} 个链接，累计 {} 份",
                self.worker_id,
                page_number,
                count,
                drafts.len()
            );
            self.status(format!(
                "第 {} 页找到 {} 个草稿，累计 {} 份",
                page_number,
                count,
                drafts.len()
            ))
            .await;

            if count < self.page_size {
                break;
            }
        }

        Ok(drafts)
    }

    /// 进入申请列表并选中草稿筛选
    async fn open_draft_filter(&self, page: &dyn PageDriver) -> AppResult<()> {
        self.status("打开申请列表").await;
        page.click(&Locator::link_exact("Applications")).await?;

        let filter = Locator::css(DRAFT_FILTER);
        page.wait_for(&filter, self.timings.listing()).await?;
        page.click(&filter).await?;
        sleep(self.timings.filter_settle()).await;
        Ok(())
    }

    /// 读取某一页的草稿链接
    async fn page_links(&self, page: &dyn PageDriver, page_number: usize) -> AppResult<Vec<String>> {
        let url = format!("{}{}", self.listing_url_template, page_number);
        self.status(format!("读取第 {} 页", page_number)).await;
        page.goto(&url).await?;
        // 恰好整页之后的空结果页，容器可能没有高度
        page.wait_for_present(&Locator::css(RESULTS_CONTAINER), self.timings.listing())
            .await?;
        page.attribute_all(&Locator::css_with_text(DRAFT_LINKS, DRAFT_LINK_TEXT), "href")
            .await
    }

    async fn status(&self, message: impl Into<String>) {
        self.status.publish(&self.worker_id, message).await;
    }
}

/// 站点根地址（协议 + 主机）
fn origin(base_url: &str) -> &str {
    match base_url.find("://") {
        Some(scheme_end) => {
            let host_start = scheme_end + 3;
            match base_url[host_start..].find('/') {
                Some(path_start) => &base_url[..host_start + path_start],
                None => base_url,
            }
        }
        None => base_url.trim_end_matches('/'),
    }
}

/// 把列表中的链接解析为完整 URL
pub fn resolve_url(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = origin(base_url);
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = origin.split("://").next().unwrap_or("https");
        return format!("{}://{}", scheme, rest);
    }
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    }
}
