//! JS 执行器 - 基础设施层
//!
//! 生成的计算片段在一个全新的 `about:blank` 页面里执行：
//! - 作用域里只有 [`ExecutionBindings`] 和一组固定的计算工具
//! - 网络、存储、DOM 相关的全局对象被遮蔽
//! - 页面用完即关，无论执行成功与否

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::ExecutionError;
use crate::models::{AnswerMeta, IngestedDataContext, RawRecord, Table};

const SANDBOX_PRELUDE: &str = include_str!("sandbox_prelude.js");

/// 生成代码可以使用的全局工具
pub const ALLOWED_FACILITIES: &[&str] = &[
    "Math",
    "JSON",
    "Number",
    "String",
    "Array",
    "Object",
    "Date",
    "RegExp",
    "btoa",
    "atob",
    "TextEncoder",
    "TextDecoder",
    "tab",
];

/// 在执行作用域内被遮蔽为 undefined 的全局对象
const SHADOWED_GLOBALS: &[&str] = &[
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "EventSource",
    "importScripts",
    "localStorage",
    "sessionStorage",
    "indexedDB",
    "navigator",
    "document",
    "window",
    "globalThis",
    "self",
    "top",
    "parent",
    "frames",
    "Function",
];

/// 暴露给生成代码的表
#[derive(Debug, Clone, Serialize)]
pub struct TableBinding {
    pub columns: Vec<String>,
    /// 每行是 `{列名: 值}`
    pub rows: Vec<JsonValue>,
}

impl From<&Table> for TableBinding {
    fn from(table: &Table) -> Self {
        Self {
            columns: table.columns.clone(),
            rows: table.records(),
        }
    }
}

/// 暴露给生成代码的原始文件
#[derive(Debug, Clone, Serialize)]
pub struct RawFileBinding {
    pub url: String,
    pub format: String,
    /// UTF-8 可解码时的文本内容
    pub text: Option<String>,
    pub base64: String,
    pub error: Option<String>,
}

impl From<&RawRecord> for RawFileBinding {
    fn from(record: &RawRecord) -> Self {
        Self {
            url: record.url.clone(),
            format: record.format.clone(),
            text: record.text().map(str::to_string),
            base64: base64::engine::general_purpose::STANDARD.encode(&record.bytes),
            error: record.error.clone(),
        }
    }
}

/// 生成代码能看到的全部变量
///
/// 执行前构建，执行后丢弃。
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionBindings {
    pub pdf_tables: Vec<TableBinding>,
    pub csv_tables: Vec<TableBinding>,
    pub api_results: Vec<JsonValue>,
    pub raw_files: Vec<RawFileBinding>,
    pub page_text: String,
    pub meta: AnswerMeta,
}

impl ExecutionBindings {
    /// 绑定变量名
    pub const NAMES: &'static [&'static str] = &[
        "pdf_tables",
        "csv_tables",
        "api_results",
        "raw_files",
        "page_text",
        "meta",
    ];

    pub fn new(context: &IngestedDataContext, page_text: &str, meta: &AnswerMeta) -> Self {
        Self {
            pdf_tables: context.document_tables.iter().map(TableBinding::from).collect(),
            csv_tables: context.delimited_tables.iter().map(TableBinding::from).collect(),
            api_results: context.structured_payloads.clone(),
            raw_files: context.raw.iter().map(RawFileBinding::from).collect(),
            page_text: page_text.to_string(),
            meta: meta.clone(),
        }
    }
}

/// 代码执行能力
///
/// 片段的唯一要求是给 `answer` 赋值；未赋值或抛出异常都返回结构化错误。
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        snippet: &str,
        bindings: ExecutionBindings,
    ) -> Result<JsonValue, ExecutionError>;
}

/// 沙箱脚本的返回结构
#[derive(Debug, Deserialize)]
struct SandboxOutcome {
    ok: bool,
    #[serde(default)]
    answer: JsonValue,
    #[serde(default)]
    error: Option<String>,
}

/// 把片段和绑定拼成一个可直接求值的异步表达式
pub fn build_script(snippet: &str, bindings: &ExecutionBindings) -> Result<String, ExecutionError> {
    let bindings_json = serde_json::to_string(bindings)
        .map_err(|e| ExecutionError::Runtime(format!("绑定序列化失败: {}", e)))?;
    let shadowed = SHADOWED_GLOBALS
        .iter()
        .map(|name| format!("{} = undefined", name))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        r#"(async () => {{
const __bindings = {bindings_json};
const {{ {names} }} = __bindings;
{prelude}
const {shadowed};
let answer = null;
try {{
    await (async () => {{
{snippet}
    }})();
}} catch (e) {{
    return {{ ok: false, error: String(e && e.stack ? e.stack : e) }};
}}
if (answer === null || answer === undefined) {{
    return {{ ok: false }};
}}
return {{ ok: true, answer: answer }};
}})()"#,
        bindings_json = bindings_json,
        names = ExecutionBindings::NAMES.join(", "),
        prelude = SANDBOX_PRELUDE,
        shadowed = shadowed,
        snippet = snippet,
    ))
}

fn interpret_outcome(outcome: SandboxOutcome) -> Result<JsonValue, ExecutionError> {
    match outcome {
        SandboxOutcome {
            error: Some(message),
            ..
        } => Err(ExecutionError::Raised { message }),
        SandboxOutcome { ok: true, answer, .. } if !answer.is_null() => Ok(answer),
        _ => Err(ExecutionError::AnswerUnset),
    }
}

/// JS 执行器
///
/// 职责：
/// - 持有浏览器句柄，每次执行创建并关闭一个空白页面
/// - 不认识 Plan / 数据源
/// - 不处理业务流程
pub struct JsExecutor {
    browser: Arc<Browser>,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(browser: Arc<Browser>) -> Self {
        Self { browser }
    }

    /// 执行 JS 代码并反序列化为指定类型
    async fn eval_as<T: DeserializeOwned>(page: &Page, js_code: String) -> anyhow::Result<T> {
        let result = page.evaluate(js_code).await?;
        let typed_value = result.into_value()?;
        Ok(typed_value)
    }
}

#[async_trait]
impl Evaluator for JsExecutor {
    async fn evaluate(
        &self,
        snippet: &str,
        bindings: ExecutionBindings,
    ) -> Result<JsonValue, ExecutionError> {
        let script = build_script(snippet, &bindings)?;
        drop(bindings);
        debug!("沙箱脚本长度: {} 字符", script.len());

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExecutionError::Runtime(format!("创建执行页面失败: {}", e)))?;

        let outcome = Self::eval_as::<SandboxOutcome>(&page, script).await;

        if let Err(e) = page.close().await {
            warn!("关闭执行页面失败: {}", e);
        }

        let outcome = outcome.map_err(|e| ExecutionError::Raised {
            message: e.to_string(),
        })?;
        interpret_outcome(outcome)
    }
}
