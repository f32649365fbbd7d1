//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责链路调度和资源装配，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用装配
//! - 管理浏览器生命周期
//! - 组装 services 和 workflow
//! - 启动 HTTP 入口
//!
//! ### `quiz_orchestrator` - 链路编排器
//! - 持有时间预算和当前地址
//! - 逐步调用 QuizStepFlow，追加历史记录
//! - 决定是否继续下一题
//!
//! ## 层次关系
//!
//! ```text
//! app (装配资源)
//!     ↓
//! quiz_orchestrator (处理一条链路)
//!     ↓
//! workflow::QuizStepFlow (处理单个题目)
//!     ↓
//! services (能力层：plan / ingest / answer / submit / llm)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管资源，quiz_orchestrator 管链路
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度，不做具体业务判断

pub mod app;
pub mod quiz_orchestrator;

// 重新导出主要类型
pub use app::{build_orchestrator, App};
pub use quiz_orchestrator::QuizOrchestrator;
