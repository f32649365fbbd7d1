//! 规划结果模型
//!
//! 规划服务根据页面内容给出的"算什么、交到哪"的结构化描述

use std::collections::BTreeMap;

use phf::phf_map;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::error::ExecutionError;

/// 答案类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    Number,
    #[default]
    String,
    Boolean,
    Object,
    /// base64 编码的文件（data URI）
    #[serde(rename = "file_base64")]
    EncodedFile,
}

impl AnswerType {
    /// 宽松解析规划服务给出的类型描述
    ///
    /// 无法识别时按 `string` 处理。
    pub fn parse_loose(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        if lowered.contains("file") || lowered.contains("base64") {
            AnswerType::EncodedFile
        } else if lowered.contains("bool") {
            AnswerType::Boolean
        } else if ["number", "int", "float", "numeric", "decimal"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            AnswerType::Number
        } else if ["object", "dict", "json", "map"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            AnswerType::Object
        } else {
            AnswerType::String
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerType::Number => "number",
            AnswerType::String => "string",
            AnswerType::Boolean => "boolean",
            AnswerType::Object => "object",
            AnswerType::EncodedFile => "file_base64",
        }
    }

    /// 按声明类型检查并规整执行结果
    ///
    /// 数字字符串可转为数字，"true"/"false" 可转为布尔，标量可转为字符串；
    /// 其余不符的情况返回 `TypeMismatch`。
    pub fn coerce(self, value: JsonValue) -> Result<JsonValue, ExecutionError> {
        let mismatch = |value: &JsonValue| ExecutionError::TypeMismatch {
            expected: self.as_str(),
            actual: json_type_name(value),
        };

        match (self, value) {
            (AnswerType::Number, JsonValue::Number(n)) => Ok(JsonValue::Number(n)),
            (AnswerType::Number, JsonValue::String(s)) => {
                parse_number(&s).ok_or_else(|| mismatch(&JsonValue::String(s)))
            }
            (AnswerType::Boolean, JsonValue::Bool(b)) => Ok(JsonValue::Bool(b)),
            (AnswerType::Boolean, JsonValue::String(s)) => {
                let lowered = s.trim().to_lowercase();
                match lowered.as_str() {
                    "true" => Ok(JsonValue::Bool(true)),
                    "false" => Ok(JsonValue::Bool(false)),
                    _ => Err(mismatch(&JsonValue::String(s))),
                }
            }
            (AnswerType::String, JsonValue::String(s)) => Ok(JsonValue::String(s)),
            (AnswerType::String, JsonValue::Number(n)) => Ok(JsonValue::String(n.to_string())),
            (AnswerType::String, JsonValue::Bool(b)) => Ok(JsonValue::String(b.to_string())),
            (AnswerType::Object, v @ (JsonValue::Object(_) | JsonValue::Array(_))) => Ok(v),
            (AnswerType::EncodedFile, JsonValue::String(s)) if !s.trim().is_empty() => {
                Ok(JsonValue::String(s))
            }
            (_, JsonValue::Null) => Err(ExecutionError::AnswerUnset),
            (_, other) => Err(mismatch(&other)),
        }
    }
}

fn parse_number(raw: &str) -> Option<JsonValue> {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(JsonValue::Number(i.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// 数据源格式提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    Csv,
    Json,
    Api,
    #[default]
    Other,
}

static FORMAT_HINTS: phf::Map<&'static str, SourceFormat> = phf_map! {
    "pdf" => SourceFormat::Pdf,
    "application/pdf" => SourceFormat::Pdf,
    "csv" => SourceFormat::Csv,
    "text/csv" => SourceFormat::Csv,
    "json" => SourceFormat::Json,
    "application/json" => SourceFormat::Json,
    "api" => SourceFormat::Api,
};

impl SourceFormat {
    /// 从规划服务给出的格式字符串解析，未知格式归为 `Other`
    pub fn from_hint(hint: &str) -> Self {
        FORMAT_HINTS
            .get(hint.trim().to_lowercase().as_str())
            .copied()
            .unwrap_or(SourceFormat::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Api => "api",
            SourceFormat::Other => "other",
        }
    }
}

/// 数据源的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// API / JSON：尝试结构化解析
    Structured,
    /// PDF：按页抽取表格
    Document,
    /// CSV：解析成一张表
    Delimited,
    /// 其他：只保留原始字节
    Opaque,
}

/// 数据源描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// 可能是相对地址，使用前需要基于当前页面解析
    pub url: String,
    #[serde(default)]
    pub format: SourceFormat,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl DataSourceDescriptor {
    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            url: url.into(),
            format,
            source_type: None,
            headers: BTreeMap::new(),
        }
    }

    /// 按 type 覆盖值和 format 提示分类
    pub fn kind(&self) -> SourceKind {
        let is_api = self
            .source_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("api"));

        if is_api || matches!(self.format, SourceFormat::Json | SourceFormat::Api) {
            return SourceKind::Structured;
        }
        match self.format {
            SourceFormat::Pdf => SourceKind::Document,
            SourceFormat::Csv => SourceKind::Delimited,
            _ => SourceKind::Opaque,
        }
    }
}

/// 规划结果
///
/// 生成后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub submit_url: String,
    #[serde(default)]
    pub data_sources: Vec<DataSourceDescriptor>,
    #[serde(default)]
    pub answer_type: AnswerType,
    #[serde(default)]
    pub answer_instructions: String,
    #[serde(default)]
    pub question_summary: String,
}

impl Plan {
    /// 说明中是否提到 secret code
    pub fn mentions_secret_code(&self) -> bool {
        self.answer_instructions
            .to_lowercase()
            .contains("secret code")
    }
}
