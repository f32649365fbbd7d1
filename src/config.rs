use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 单个数据源下载失败时的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFailurePolicy {
    /// 写入 raw 列表（带错误信息），继续处理后续数据源
    #[default]
    Record,
    /// 直接让本步失败
    Abort,
}

impl std::str::FromStr for SourceFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "record" => Ok(SourceFailurePolicy::Record),
            "abort" => Ok(SourceFailurePolicy::Abort),
            other => Err(format!("未知的数据源失败策略: {}", other)),
        }
    }
}

/// 程序配置
///
/// 加载顺序：默认值 → `QUIZ_CONFIG` 指向的 TOML 文件 → 环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 入口校验用的 secret
    pub quiz_secret: String,
    /// 整条链路的时间预算（秒）
    pub time_limit_secs: u64,
    /// 下载与提交的 HTTP 超时（秒）
    pub http_timeout_secs: u64,
    /// 监听地址
    pub bind_addr: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    // --- 浏览器配置 ---
    /// 浏览器可执行文件路径，为空时由 chromiumoxide 自动查找
    pub chrome_executable: Option<String>,
    /// 连接已启动浏览器的调试端口，设置后不再启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 页面加载完成后等待网络静默的时间（毫秒）
    pub page_settle_millis: u64,
    // --- 答案计算 ---
    pub page_text_preview_chars: usize,
    pub table_preview_chars: usize,
    pub table_preview_rows: usize,
    pub source_failure_policy: SourceFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiz_secret: String::new(),
            time_limit_secs: 180,
            http_timeout_secs: 60,
            bind_addr: "0.0.0.0:8000".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4.1-mini".to_string(),
            llm_temperature: 0.0,
            llm_max_tokens: 2048,
            chrome_executable: None,
            browser_debug_port: None,
            page_settle_millis: 500,
            page_text_preview_chars: 4000,
            table_preview_chars: 4000,
            table_preview_rows: 5,
            source_failure_policy: SourceFailurePolicy::Record,
        }
    }
}

impl Config {
    /// 按默认值 → TOML 文件 → 环境变量的顺序加载
    pub fn load() -> Result<Self> {
        let base = match std::env::var("QUIZ_CONFIG") {
            Ok(path) => Self::from_toml_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("配置文件解析失败: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            quiz_secret: std::env::var("QUIZ_SECRET").unwrap_or(base.quiz_secret),
            time_limit_secs: std::env::var("QUIZ_TIME_LIMIT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.time_limit_secs),
            http_timeout_secs: std::env::var("QUIZ_HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.http_timeout_secs),
            bind_addr: std::env::var("PORT").map(|port| format!("0.0.0.0:{}", port)).unwrap_or(base.bind_addr),
            verbose_logging: std::env::var("QUIZ_VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(base.verbose_logging),
            llm_api_key: std::env::var("OPENAI_API_KEY").or_else(|_| std::env::var("LLM_API_KEY")).unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(base.llm_temperature),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.llm_max_tokens),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(base.chrome_executable),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(base.browser_debug_port),
            page_settle_millis: std::env::var("PAGE_SETTLE_MILLIS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.page_settle_millis),
            page_text_preview_chars: base.page_text_preview_chars,
            table_preview_chars: base.table_preview_chars,
            table_preview_rows: base.table_preview_rows,
            source_failure_policy: std::env::var("QUIZ_SOURCE_FAILURE_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or(base.source_failure_policy),
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_millis)
    }
}
