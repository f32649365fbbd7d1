//! 数据源下载与解析 - 业务能力层
//!
//! 按规划中的顺序逐个处理数据源，结果只保存在内存中，不跨步缓存。

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{Config, SourceFailurePolicy};
use crate::error::{QuizError, QuizResult};
use crate::models::{DataSourceDescriptor, IngestedDataContext, RawRecord, SourceKind};
use crate::services::plan_interpreter::resolve_url;
use crate::services::tabular::{extract_document_tables, parse_delimited};

/// 资源下载能力
#[async_trait]
pub trait ResourceDownloader: Send + Sync {
    async fn download(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Vec<u8>>;
}

/// 基于 reqwest 的下载
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceDownloader for HttpDownloader {
    async fn download(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// 数据源解析器
///
/// 职责：
/// - 解析相对地址并下载
/// - 按 type/format 分类解析成表格或结构化数据
/// - 单个数据源失败时按策略记录或终止
pub struct DataSourceIngestor {
    downloader: Arc<dyn ResourceDownloader>,
    policy: SourceFailurePolicy,
}

impl DataSourceIngestor {
    pub fn new(downloader: Arc<dyn ResourceDownloader>, policy: SourceFailurePolicy) -> Self {
        Self { downloader, policy }
    }

    /// 下载并解析全部数据源
    ///
    /// 各结果列表保持数据源描述的顺序。
    pub async fn ingest(
        &self,
        sources: &[DataSourceDescriptor],
        base_url: &str,
    ) -> QuizResult<IngestedDataContext> {
        let mut context = IngestedDataContext::default();

        for (idx, source) in sources.iter().enumerate() {
            let format = source.format.as_str();

            let url = match resolve_url(base_url, &source.url) {
                Ok(url) => url,
                Err(e) => {
                    self.handle_failure(&mut context, &source.url, format, e.to_string())?;
                    continue;
                }
            };

            debug!("数据源 {}/{}: {} ({})", idx + 1, sources.len(), url, format);

            let bytes = match self.downloader.download(&url, &source.headers).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.handle_failure(&mut context, &url, format, format!("{:#}", e))?;
                    continue;
                }
            };

            match source.kind() {
                SourceKind::Structured => match serde_json::from_slice(&bytes) {
                    Ok(payload) => context.structured_payloads.push(payload),
                    Err(e) => warn!("JSON 解析失败，仅保留原始内容 ({}): {}", url, e),
                },
                SourceKind::Document => match extract_document_tables(&bytes) {
                    Ok(tables) => {
                        debug!("PDF 中找到 {} 张表 ({})", tables.len(), url);
                        context.document_tables.extend(tables);
                    }
                    Err(e) => warn!("PDF 表格提取失败，仅保留原始内容 ({}): {:#}", url, e),
                },
                SourceKind::Delimited => match parse_delimited(&bytes) {
                    Ok(table) => context.delimited_tables.push(table),
                    Err(e) => warn!("CSV 解析失败，仅保留原始内容 ({}): {:#}", url, e),
                },
                SourceKind::Opaque => {}
            }

            context.raw.push(RawRecord::downloaded(url, format, bytes));
        }

        info!(
            "✓ 数据源处理完成: PDF 表 {} 张, CSV 表 {} 张, JSON {} 份, 原始文件 {} 个",
            context.document_tables.len(),
            context.delimited_tables.len(),
            context.structured_payloads.len(),
            context.raw.len()
        );

        Ok(context)
    }

    fn handle_failure(
        &self,
        context: &mut IngestedDataContext,
        url: &str,
        format: &str,
        reason: String,
    ) -> QuizResult<()> {
        match self.policy {
            SourceFailurePolicy::Record => {
                warn!("⚠️ 数据源下载失败，已记录并继续: {} ({})", url, reason);
                context.raw.push(RawRecord::failed(url, format, reason));
                Ok(())
            }
            SourceFailurePolicy::Abort => Err(QuizError::SourceDownloadFailed {
                url: url.to_string(),
                reason,
            }),
        }
    }
}
