//! 应用装配 - 编排层
//!
//! ## 职责
//!
//! 1. **资源初始化**：启动或连接浏览器，唯一持有 Browser 的模块
//! 2. **组件装配**：把浏览器、LLM、HTTP 客户端组装成一条答题链路
//! 3. **服务启动**：把编排器交给 HTTP 入口

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tracing::info;

use crate::api;
use crate::browser::{self, BrowserFetcher, PageFetcher};
use crate::config::Config;
use crate::infrastructure::JsExecutor;
use crate::orchestrator::QuizOrchestrator;
use crate::services::{
    AnswerSynthesizer, DataSourceIngestor, HttpDownloader, LlmService, PreviewLimits,
    SubmissionClient,
};
use crate::workflow::QuizStepFlow;

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Arc<Browser>,
    orchestrator: Arc<QuizOrchestrator>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let browser = match config.browser_debug_port {
            Some(port) => browser::connect_to_browser(port).await?,
            None => browser::launch_headless_browser(config.chrome_executable.as_deref()).await?,
        };
        let browser = Arc::new(browser);

        let orchestrator = build_orchestrator(&config, browser.clone())?;
        info!("✓ 答题链路组件已就绪");

        Ok(Self {
            config,
            _browser: browser,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// 启动 HTTP 服务，直到进程退出
    pub async fn run(self) -> Result<()> {
        api::start_server(self.orchestrator, self.config).await
    }
}

/// 按配置组装编排器
pub fn build_orchestrator(config: &Config, browser: Arc<Browser>) -> Result<QuizOrchestrator> {
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(BrowserFetcher::new(browser.clone(), config.page_settle()));
    let llm = Arc::new(LlmService::new(config));
    let evaluator = Arc::new(JsExecutor::new(browser));

    let ingestor = DataSourceIngestor::new(
        Arc::new(HttpDownloader::new(config)?),
        config.source_failure_policy,
    );
    let synthesizer = AnswerSynthesizer::new(
        fetcher.clone(),
        llm.clone(),
        evaluator,
        PreviewLimits::from(config),
    );
    let submitter = Arc::new(SubmissionClient::new(config)?);

    let flow = QuizStepFlow::new(fetcher, llm, ingestor, synthesizer, submitter);
    Ok(QuizOrchestrator::new(flow))
}
