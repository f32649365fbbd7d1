//! 规划结果解析 - 业务能力层
//!
//! 规划服务的返回可能被 ``` 包裹，也可能夹在说明文字里。
//! 这里先去掉包装，再找第一个配平的 `{...}`，解析后做字段校验和地址解析。

use std::collections::BTreeMap;

use anyhow::Context;
use reqwest::Url;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::{QuizError, QuizResult};
use crate::models::{AnswerType, DataSourceDescriptor, Plan, SourceFormat};
use crate::utils::strip_code_fences;

/// 找出文本中第一个配平的 `{...}` 片段
///
/// 会跳过 JSON 字符串里的花括号。
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 基于 `base` 解析相对地址，返回绝对地址
pub fn resolve_url(base: &str, reference: &str) -> anyhow::Result<String> {
    let reference = reference.trim();
    if let Ok(absolute) = Url::parse(reference) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(base).with_context(|| format!("无效的基准地址: {}", base))?;
    let joined = base
        .join(reference)
        .with_context(|| format!("无法解析地址 {} (基准: {})", reference, base))?;
    Ok(joined.to_string())
}

/// 从规划服务的原始文本得到校验过的 Plan
pub fn interpret_plan(raw: &str) -> QuizResult<Plan> {
    let stripped = strip_code_fences(raw);
    let candidate = if stripped.starts_with('{') && stripped.ends_with('}') {
        stripped.as_str()
    } else {
        extract_json_object(&stripped).unwrap_or(stripped.as_str())
    };

    let value: JsonValue =
        serde_json::from_str(candidate).map_err(|e| QuizError::PlanUnparseable {
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;

    let JsonValue::Object(fields) = value else {
        return Err(QuizError::PlanUnparseable {
            reason: "顶层不是 JSON 对象".to_string(),
            raw: raw.to_string(),
        });
    };

    let submit_url = fields
        .get("submit_url")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| QuizError::MissingSubmitUrl {
            raw: raw.to_string(),
        })?
        .to_string();

    let plan = Plan {
        submit_url,
        data_sources: parse_data_sources(fields.get("data_sources")),
        answer_type: fields
            .get("answer_type")
            .and_then(JsonValue::as_str)
            .map(AnswerType::parse_loose)
            .unwrap_or_default(),
        answer_instructions: text_field(&fields, "answer_instructions"),
        question_summary: text_field(&fields, "question_summary"),
    };

    debug!(
        "规划解析完成: submit_url={}, 数据源 {} 个, 答案类型 {}",
        plan.submit_url,
        plan.data_sources.len(),
        plan.answer_type.as_str()
    );
    Ok(plan)
}

/// 把 submit_url 和数据源地址都解析成绝对地址
pub fn resolve_plan_urls(plan: Plan, base_url: &str) -> QuizResult<Plan> {
    let submit_url = resolve_url(base_url, &plan.submit_url).map_err(|e| {
        QuizError::MissingSubmitUrl {
            raw: format!("{} ({})", plan.submit_url, e),
        }
    })?;

    let data_sources = plan
        .data_sources
        .into_iter()
        .map(|mut ds| {
            match resolve_url(base_url, &ds.url) {
                Ok(url) => ds.url = url,
                Err(e) => warn!("数据源地址无法解析，保留原值: {} ({})", ds.url, e),
            }
            ds
        })
        .collect();

    Ok(Plan {
        submit_url,
        data_sources,
        ..plan
    })
}

fn text_field(fields: &Map<String, JsonValue>, key: &str) -> String {
    match fields.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn parse_data_sources(value: Option<&JsonValue>) -> Vec<DataSourceDescriptor> {
    let items = match value {
        Some(JsonValue::Array(items)) => items,
        Some(JsonValue::Null) | None => return Vec::new(),
        Some(other) => {
            warn!("data_sources 不是数组，忽略: {}", other);
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| {
            let fields = item.as_object()?;
            let url = fields
                .get("url")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty());
            let Some(url) = url else {
                debug!("跳过没有 url 的数据源: {}", item);
                return None;
            };

            let format = fields
                .get("format")
                .and_then(JsonValue::as_str)
                .map(SourceFormat::from_hint)
                .unwrap_or_default();
            let source_type = fields
                .get("type")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            let headers = fields
                .get("headers")
                .and_then(JsonValue::as_object)
                .map(|h| {
                    h.iter()
                        .map(|(k, v)| {
                            let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                            (k.clone(), v)
                        })
                        .collect::<BTreeMap<_, _>>()
                })
                .unwrap_or_default();

            Some(DataSourceDescriptor {
                url: url.to_string(),
                format,
                source_type,
                headers,
            })
        })
        .collect()
}
