//! 运行历史记录

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ErrorKind, Phase, QuizError};
use crate::models::plan::Plan;

/// 评分服务的返回
///
/// 原样保存，只读取 `correct` 和 `url` 两个字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionResponse(pub JsonValue);

impl SubmissionResponse {
    /// 缺省为 false
    pub fn correct(&self) -> bool {
        self.0
            .get("correct")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    /// 下一题地址，空字符串视为没有
    pub fn next_url(&self) -> Option<&str> {
        self.0
            .get("url")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn reason(&self) -> Option<&str> {
        self.0.get("reason").and_then(JsonValue::as_str)
    }
}

/// 单步记录
///
/// 追加进历史后不再修改。成功提交时有 `response`，失败时有 `error`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizStepRecord {
    pub quiz_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<SubmissionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl QuizStepRecord {
    /// 成功提交的记录
    pub fn submitted(
        quiz_url: impl Into<String>,
        plan: Plan,
        answer: JsonValue,
        response: SubmissionResponse,
    ) -> Self {
        Self {
            quiz_url: quiz_url.into(),
            plan: Some(plan),
            answer: Some(answer),
            response: Some(response),
            error: None,
            error_kind: None,
            phase: None,
        }
    }

    /// 失败记录，`error` 中带上失败阶段
    pub fn failed(quiz_url: impl Into<String>, phase: Option<Phase>, err: &QuizError) -> Self {
        let error = match phase {
            Some(phase) => format!("{} 阶段失败: {}", phase, err),
            None => err.to_string(),
        };
        Self {
            quiz_url: quiz_url.into(),
            plan: None,
            answer: None,
            response: None,
            error: Some(error),
            error_kind: Some(err.kind()),
            phase,
        }
    }

    pub fn with_plan(mut self, plan: Option<Plan>) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_answer(mut self, answer: Option<JsonValue>) -> Self {
        self.answer = answer;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
