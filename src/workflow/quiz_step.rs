//! 单步处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 抓取页面
//! 2. 规划（解析 submit_url / 数据源 / 答案类型）
//! 3. 下载解析数据源
//! 4. 计算答案
//! 5. 提交
//!
//! 任何一个阶段失败都会变成一条错误记录，不重试。

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use crate::browser::PageFetcher;
use crate::error::{Phase, QuizError, QuizResult};
use crate::models::{Plan, QuizStepRecord};
use crate::services::{
    interpret_plan, resolve_plan_urls, resolve_url, AnswerSubmitter, AnswerSynthesizer,
    DataSourceIngestor, Planner, Submission,
};
use crate::utils::truncate_text;
use crate::workflow::step_ctx::StepCtx;
use crate::workflow::time_budget::TimeBudget;

/// 单步结果
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub record: QuizStepRecord,
    /// 评分服务给出的下一题地址（已解析为绝对地址）
    pub next_url: Option<String>,
}

/// 记录走到了哪个阶段，以及失败前已经得到的中间结果
struct StepProgress {
    phase: Phase,
    plan: Option<Plan>,
    answer: Option<JsonValue>,
}

impl StepProgress {
    fn new() -> Self {
        Self {
            phase: Phase::Fetching,
            plan: None,
            answer: None,
        }
    }

    /// 进入下一阶段，预算耗尽时不进入
    fn enter(&mut self, phase: Phase, budget: &TimeBudget) -> QuizResult<()> {
        self.phase = phase;
        if budget.is_exhausted() {
            return Err(QuizError::BudgetExhausted { phase });
        }
        Ok(())
    }
}

/// 单步处理流程
///
/// - 编排一步中的五个阶段
/// - 决定何时检查时间预算
/// - 不持有浏览器等资源，只依赖业务能力（services）
pub struct QuizStepFlow {
    fetcher: Arc<dyn PageFetcher>,
    planner: Arc<dyn Planner>,
    ingestor: DataSourceIngestor,
    synthesizer: AnswerSynthesizer,
    submitter: Arc<dyn AnswerSubmitter>,
}

impl QuizStepFlow {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        planner: Arc<dyn Planner>,
        ingestor: DataSourceIngestor,
        synthesizer: AnswerSynthesizer,
        submitter: Arc<dyn AnswerSubmitter>,
    ) -> Self {
        Self {
            fetcher,
            planner,
            ingestor,
            synthesizer,
            submitter,
        }
    }

    /// 处理一步，总是返回一条记录
    ///
    /// 调用前由编排层检查预算；之后每进入一个阶段再检查一次。
    pub async fn run(&self, ctx: &StepCtx, budget: &TimeBudget) -> StepOutcome {
        let mut progress = StepProgress::new();

        match self.execute(ctx, budget, &mut progress).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if matches!(err, QuizError::BudgetExhausted { .. }) {
                    warn!("{} ⏱️ {}", ctx, err);
                } else {
                    error!("{} ❌ {} 阶段失败: {}", ctx, progress.phase, err);
                }
                let record = QuizStepRecord::failed(&ctx.quiz_url, Some(progress.phase), &err)
                    .with_plan(progress.plan)
                    .with_answer(progress.answer);
                StepOutcome {
                    record,
                    next_url: None,
                }
            }
        }
    }

    async fn execute(
        &self,
        ctx: &StepCtx,
        budget: &TimeBudget,
        progress: &mut StepProgress,
    ) -> QuizResult<StepOutcome> {
        // ========== 1. 抓取页面 ==========
        info!("{} 🌐 正在渲染页面...", ctx);
        let page = self
            .fetcher
            .fetch(&ctx.quiz_url)
            .await
            .map_err(|e| QuizError::PageFetchFailed {
                url: ctx.quiz_url.clone(),
                reason: format!("{:#}", e),
            })?;
        info!(
            "{} ✓ 页面文本 {} 字符, 链接 {} 个",
            ctx,
            page.body_text.chars().count(),
            page.links.len()
        );

        // ========== 2. 规划 ==========
        progress.enter(Phase::Planning, budget)?;
        let raw_plan = self
            .planner
            .plan(&page)
            .await
            .map_err(|e| QuizError::PlannerFailed(format!("{:#}", e)))?;
        let plan = resolve_plan_urls(interpret_plan(&raw_plan)?, &ctx.quiz_url)?;
        info!(
            "{} 📝 {} | 类型 {} | 数据源 {} 个 | 提交到 {}",
            ctx,
            truncate_text(&plan.question_summary, 80),
            plan.answer_type.as_str(),
            plan.data_sources.len(),
            plan.submit_url
        );
        progress.plan = Some(plan.clone());

        // ========== 3. 数据源 ==========
        progress.enter(Phase::Ingesting, budget)?;
        let context = self
            .ingestor
            .ingest(&plan.data_sources, &ctx.quiz_url)
            .await?;

        // ========== 4. 计算答案 ==========
        progress.enter(Phase::Answering, budget)?;
        let answer = self
            .synthesizer
            .compute_answer(&plan, &context, &page.body_text, &ctx.meta())
            .await?;
        drop(context);
        info!("{} ✓ 答案: {}", ctx, truncate_text(&answer.to_string(), 120));
        progress.answer = Some(answer.clone());

        // ========== 5. 提交 ==========
        progress.enter(Phase::Submitting, budget)?;
        let submission = Submission {
            email: ctx.email.clone(),
            secret: ctx.secret.clone(),
            url: ctx.quiz_url.clone(),
            answer: answer.clone(),
        };
        let response = self.submitter.submit(&plan.submit_url, &submission).await?;

        if response.correct() {
            info!("{} ✅ 回答正确", ctx);
        } else {
            warn!(
                "{} ⚠️ 回答未通过: {}",
                ctx,
                response.reason().unwrap_or("无说明")
            );
        }

        let next_url = response
            .next_url()
            .map(|url| resolve_url(&ctx.quiz_url, url).unwrap_or_else(|_| url.to_string()));

        Ok(StepOutcome {
            record: QuizStepRecord::submitted(&ctx.quiz_url, plan, answer, response),
            next_url,
        })
    }
}
