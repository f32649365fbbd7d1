//! 链路编排器 - 编排层
//!
//! ## 职责
//!
//! 持有时间预算和当前地址，按顺序一步步处理题目，直到：
//! - 时间预算耗尽
//! - 评分服务没有给出下一题
//! - 某一步失败
//! - 下一题地址已经处理过
//!
//! 历史记录是唯一的输出，只追加不修改；任何内部故障（包括 panic）
//! 都会变成一条错误记录，调用方总能拿到历史。

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::QuizError;
use crate::models::QuizStepRecord;
use crate::services::resolve_url;
use crate::utils::logging::{log_run_complete, log_step_start};
use crate::workflow::{QuizStepFlow, StepCtx, StepOutcome, TimeBudget};

/// 链路编排器
pub struct QuizOrchestrator {
    flow: QuizStepFlow,
}

impl QuizOrchestrator {
    pub fn new(flow: QuizStepFlow) -> Self {
        Self { flow }
    }

    /// 从 `start_url` 开始沿链路答题
    ///
    /// 预算为 `time_limit - (now - start_time)`，只在进入新阶段前检查。
    pub async fn run(
        &self,
        email: &str,
        secret: &str,
        start_url: &str,
        start_time: Instant,
        time_limit: Duration,
    ) -> Vec<QuizStepRecord> {
        let budget = TimeBudget::new(start_time, time_limit);
        let mut history: Vec<QuizStepRecord> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let start_url = start_url.trim();
        // 与评分服务返回的地址同样规范化，保证已访问判断一致
        let start_url = resolve_url(start_url, start_url).unwrap_or_else(|_| start_url.to_string());
        let mut current = Some(start_url);

        while let Some(quiz_url) = current.take() {
            if budget.is_exhausted() {
                warn!("⏱️ 时间预算已耗尽，停止在 {}", quiz_url);
                break;
            }
            if !visited.insert(quiz_url.clone()) {
                warn!("🔁 {} 已经处理过，停止", quiz_url);
                break;
            }

            let ctx = StepCtx::new(
                history.len() + 1,
                quiz_url,
                email.to_string(),
                secret.to_string(),
            );
            log_step_start(ctx.step_index, &ctx.quiz_url, budget.remaining());

            let outcome = self.run_step(&ctx, &budget).await;
            let failed = outcome.record.is_error();
            history.push(outcome.record);

            if failed {
                break;
            }
            current = outcome.next_url;
            if current.is_none() {
                info!("{} 🏁 没有下一题，链路结束", ctx);
            }
        }

        let failed = history.last().is_some_and(QuizStepRecord::is_error);
        log_run_complete(history.len(), failed, budget.elapsed());
        history
    }

    /// 执行一步，panic 转为错误记录
    async fn run_step(&self, ctx: &StepCtx, budget: &TimeBudget) -> StepOutcome {
        match AssertUnwindSafe(self.flow.run(ctx, budget))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("{} 💥 处理过程中 panic: {}", ctx, message);
                StepOutcome {
                    record: QuizStepRecord::failed(
                        &ctx.quiz_url,
                        None,
                        &QuizError::InternalFault(message),
                    ),
                    next_url: None,
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
