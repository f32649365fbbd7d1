//! 页面抓取
//!
//! 题目内容可能由前端渲染，必须等页面加载完成、网络静默后再取文本。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::models::{PageLink, QuizPage};

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

const LINKS_JS: &str = r#"
Array.from(document.querySelectorAll('a')).map(e => ({
    href: e.href || '',
    text: e.textContent || ''
}))
"#;

const READY_STATE_JS: &str = "document.readyState";

/// 最多轮询 readyState 的次数
const MAX_READY_POLLS: usize = 40;

/// 页面抓取能力
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 渲染页面并返回正文文本和所有链接
    async fn fetch(&self, url: &str) -> Result<QuizPage>;
}

/// 基于 chromiumoxide 的页面抓取
///
/// 每次抓取打开一个新标签页，结束后关闭。
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    settle: Duration,
}

impl BrowserFetcher {
    pub fn new(browser: Arc<Browser>, settle: Duration) -> Self {
        Self { browser, settle }
    }

    async fn render(&self, page: &Page, url: &str) -> Result<QuizPage> {
        page.goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        page.wait_for_navigation().await?;
        self.wait_until_quiet(page).await;

        let body_text: String = page.evaluate(BODY_TEXT_JS).await?.into_value()?;
        let links: Vec<PageLink> = page.evaluate(LINKS_JS).await?.into_value()?;

        debug!(
            "页面渲染完成: {} (正文 {} 字符, {} 个链接)",
            url,
            body_text.chars().count(),
            links.len()
        );

        Ok(QuizPage {
            url: url.to_string(),
            body_text,
            links,
        })
    }

    /// 等待 readyState 变为 complete，再留出一段网络静默时间
    async fn wait_until_quiet(&self, page: &Page) {
        for _ in 0..MAX_READY_POLLS {
            let state: Option<String> = match page.evaluate(READY_STATE_JS).await {
                Ok(result) => result.into_value().ok(),
                Err(_) => None,
            };
            if state.as_deref() == Some("complete") {
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
        sleep(self.settle).await;
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<QuizPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("创建页面失败")?;

        let result = self.render(&page, url).await;

        if let Err(e) = page.close().await {
            warn!("关闭页面失败: {}", e);
        }

        result
    }
}
