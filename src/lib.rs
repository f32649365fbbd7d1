//! # Quiz Solver
//!
//! 沿着一串网页题目自动答题的服务：渲染页面、规划、下载数据、计算答案、提交，
//! 再根据评分结果进入下一题，直到时间预算耗尽或链路结束。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动/连接浏览器，`BrowserFetcher` 渲染页面
//! - `infrastructure/` - `JsExecutor` 在空白页面中执行生成的计算片段
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个题目
//! - `LlmService` - 规划和代码生成能力
//! - `plan_interpreter` - 规划结果解析
//! - `DataSourceIngestor` - 数据源下载与解析
//! - `AnswerSynthesizer` - 答案计算（demo / secret code / 生成代码）
//! - `SubmissionClient` - 答案提交
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `StepCtx` - 上下文封装（步骤序号 + 地址 + 身份）
//! - `QuizStepFlow` - 流程编排（fetch → plan → ingest → answer → submit）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/quiz_orchestrator` - 时间预算与链路推进
//! - `orchestrator/app` - 资源装配与服务启动
//!
//! ## 模块结构

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, SourceFailurePolicy};
pub use error::{ErrorKind, ExecutionError, Phase, QuizError, QuizResult};
pub use infrastructure::{Evaluator, ExecutionBindings, JsExecutor};
pub use models::{Plan, QuizStepRecord, SubmissionResponse};
pub use orchestrator::{App, QuizOrchestrator};
pub use workflow::{QuizStepFlow, StepCtx};
