//! 错误类型
//!
//! 链路中每个阶段的失败都会在编排层被转换成一条带 `error` 的步骤记录，
//! 这里定义的是这些失败的分类。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单步中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetching,
    Planning,
    Ingesting,
    Answering,
    Submitting,
}

impl Phase {
    /// 记录和日志里使用的短名称
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Fetching => "fetch",
            Phase::Planning => "plan",
            Phase::Ingesting => "ingest",
            Phase::Answering => "answer",
            Phase::Submitting => "submit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 答题链路错误
#[derive(Debug, Error)]
pub enum QuizError {
    /// 页面渲染/抓取失败
    #[error("页面抓取失败 ({url}): {reason}")]
    PageFetchFailed { url: String, reason: String },

    /// 规划服务本身调用失败
    #[error("规划服务调用失败: {0}")]
    PlannerFailed(String),

    /// 规划服务返回的内容无法解析成 JSON 对象
    #[error("规划结果无法解析: {reason}; 原始内容: {raw}")]
    PlanUnparseable { reason: String, raw: String },

    /// 规划结果中没有 submit_url
    #[error("规划结果缺少 submit_url; 原始内容: {raw}")]
    MissingSubmitUrl { raw: String },

    /// 数据源下载失败
    #[error("数据源下载失败 ({url}): {reason}")]
    SourceDownloadFailed { url: String, reason: String },

    /// 代码生成或执行没有得到答案
    #[error("答案计算失败: {0}")]
    SynthesisExecutionFailed(#[from] ExecutionError),

    /// 提交答案失败（网络或非 2xx 状态）
    #[error("提交到 {submit_url} 失败: {reason}, payload={payload}")]
    SubmissionTransportFailed {
        submit_url: String,
        payload: String,
        reason: String,
    },

    /// 入口 secret 校验失败
    #[error("secret 校验失败")]
    AuthorizationFailed,

    /// 进入某阶段前时间预算已耗尽
    #[error("时间预算已耗尽，未进入 {phase} 阶段")]
    BudgetExhausted { phase: Phase },

    /// 未预期的内部故障（如 panic）
    #[error("内部错误: {0}")]
    InternalFault(String),
}

impl QuizError {
    /// 错误类别，写入步骤记录
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::PageFetchFailed { .. } => ErrorKind::PageFetchFailed,
            QuizError::PlannerFailed(_) => ErrorKind::PlannerFailed,
            QuizError::PlanUnparseable { .. } => ErrorKind::PlanUnparseable,
            QuizError::MissingSubmitUrl { .. } => ErrorKind::MissingSubmitUrl,
            QuizError::SourceDownloadFailed { .. } => ErrorKind::SourceDownloadFailed,
            QuizError::SynthesisExecutionFailed(_) => ErrorKind::SynthesisExecutionFailed,
            QuizError::SubmissionTransportFailed { .. } => ErrorKind::SubmissionTransportFailed,
            QuizError::AuthorizationFailed => ErrorKind::AuthorizationFailed,
            QuizError::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
            QuizError::InternalFault(_) => ErrorKind::InternalFault,
        }
    }
}

/// 可序列化的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PageFetchFailed,
    PlannerFailed,
    PlanUnparseable,
    MissingSubmitUrl,
    SourceDownloadFailed,
    SynthesisExecutionFailed,
    SubmissionTransportFailed,
    AuthorizationFailed,
    BudgetExhausted,
    InternalFault,
}

/// 代码生成与执行错误
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 代码生成服务调用失败
    #[error("代码生成服务调用失败: {0}")]
    Synthesis(String),

    /// 片段执行时抛出异常（含语法错误）
    #[error("生成代码执行抛出异常: {message}")]
    Raised { message: String },

    /// 片段执行结束但 `answer` 仍为空
    #[error("生成代码没有给 answer 赋值")]
    AnswerUnset,

    /// 结果与声明的答案类型不符
    #[error("答案类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// 执行环境本身故障（浏览器/CDP）
    #[error("执行环境故障: {0}")]
    Runtime(String),
}

/// 答题链路结果类型
pub type QuizResult<T> = Result<T, QuizError>;
