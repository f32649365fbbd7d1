//! 集成测试用的假协作者
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use quiz_solver::browser::PageFetcher;
use quiz_solver::config::SourceFailurePolicy;
use quiz_solver::error::{ExecutionError, QuizError, QuizResult};
use quiz_solver::infrastructure::{Evaluator, ExecutionBindings};
use quiz_solver::models::{QuizPage, SubmissionResponse};
use quiz_solver::services::{
    AnswerSubmitter, AnswerSynthesizer, CodeSynthesizer, DataSourceIngestor, Planner,
    PreviewLimits, ResourceDownloader, Submission, SynthesisRequest,
};
use quiz_solver::{Config, QuizOrchestrator, QuizStepFlow};

/// 按地址返回页面；可以设置延迟或 panic
#[derive(Default)]
pub struct ScriptedFetcher {
    pub pages: HashMap<String, String>,
    pub delay: Option<Duration>,
    pub panic_on: Option<String>,
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<QuizPage> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.panic_on.as_deref() == Some(url) {
            panic!("renderer crashed on {}", url);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let body = self
            .pages
            .get(url)
            .ok_or_else(|| anyhow!("net::ERR_NAME_NOT_RESOLVED"))?;
        Ok(QuizPage {
            url: url.to_string(),
            body_text: body.clone(),
            links: Vec::new(),
        })
    }
}

/// 按页面地址返回规划文本
#[derive(Default)]
pub struct ScriptedPlanner {
    pub plans: HashMap<String, String>,
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, page: &QuizPage) -> Result<String> {
        self.plans
            .get(&page.url)
            .cloned()
            .ok_or_else(|| anyhow!("planner unavailable"))
    }
}

/// 返回固定片段
pub struct FixedSynthesizer {
    pub snippet: String,
    pub requests: Mutex<Vec<SynthesisRequest>>,
}

#[async_trait]
impl CodeSynthesizer for FixedSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.snippet.clone())
    }
}

pub type EvalFn =
    Box<dyn Fn(&str, &ExecutionBindings) -> Result<JsonValue, ExecutionError> + Send + Sync>;

/// 用闭包代替 JS 执行
pub struct ClosureEvaluator {
    pub eval: EvalFn,
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Evaluator for ClosureEvaluator {
    async fn evaluate(
        &self,
        snippet: &str,
        bindings: ExecutionBindings,
    ) -> Result<JsonValue, ExecutionError> {
        *self.calls.lock().unwrap() += 1;
        (self.eval)(snippet, &bindings)
    }
}

#[derive(Default)]
pub struct MapDownloader {
    pub files: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl ResourceDownloader for MapDownloader {
    async fn download(&self, url: &str, _headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP status client error (404 Not Found) for url ({})", url))
    }
}

/// 按提交地址返回评分结果，并记录每次提交
#[derive(Default)]
pub struct RecordingSubmitter {
    pub responses: HashMap<String, JsonValue>,
    pub submissions: Mutex<Vec<(String, Submission)>>,
}

#[async_trait]
impl AnswerSubmitter for RecordingSubmitter {
    async fn submit(
        &self,
        submit_url: &str,
        submission: &Submission,
    ) -> QuizResult<SubmissionResponse> {
        self.submissions
            .lock()
            .unwrap()
            .push((submit_url.to_string(), submission.clone()));
        match self.responses.get(submit_url) {
            Some(body) => Ok(SubmissionResponse(body.clone())),
            None => Err(QuizError::SubmissionTransportFailed {
                submit_url: submit_url.to_string(),
                payload: submission.redacted_payload(),
                reason: "HTTP status server error (502 Bad Gateway)".to_string(),
            }),
        }
    }
}

/// 一套可配置的假协作者
pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub planner: Arc<ScriptedPlanner>,
    pub synthesizer: Arc<FixedSynthesizer>,
    pub evaluator: Arc<ClosureEvaluator>,
    pub downloader: Arc<MapDownloader>,
    pub submitter: Arc<RecordingSubmitter>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            fetcher: ScriptedFetcher::default(),
            planner: ScriptedPlanner::default(),
            snippet: "answer = 1;".to_string(),
            eval: Box::new(|_: &str, _: &ExecutionBindings| Ok(json!(1))),
            downloader: MapDownloader::default(),
            submitter: RecordingSubmitter::default(),
        }
    }

    pub fn orchestrator(&self) -> QuizOrchestrator {
        let config = Config::default();
        let ingestor =
            DataSourceIngestor::new(self.downloader.clone(), SourceFailurePolicy::Record);
        let synthesizer = AnswerSynthesizer::new(
            self.fetcher.clone(),
            self.synthesizer.clone(),
            self.evaluator.clone(),
            PreviewLimits::from(&config),
        );
        let flow = QuizStepFlow::new(
            self.fetcher.clone(),
            self.planner.clone(),
            ingestor,
            synthesizer,
            self.submitter.clone(),
        );
        QuizOrchestrator::new(flow)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetcher.fetched.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<(String, Submission)> {
        self.submitter.submissions.lock().unwrap().clone()
    }

    pub fn evaluator_calls(&self) -> usize {
        *self.evaluator.calls.lock().unwrap()
    }
}

pub struct HarnessBuilder {
    fetcher: ScriptedFetcher,
    planner: ScriptedPlanner,
    snippet: String,
    eval: EvalFn,
    downloader: MapDownloader,
    submitter: RecordingSubmitter,
}

impl HarnessBuilder {
    /// 注册一道题：页面文本、规划文本
    pub fn page(mut self, url: &str, body: &str, plan: JsonValue) -> Self {
        self.fetcher.pages.insert(url.to_string(), body.to_string());
        self.planner.plans.insert(url.to_string(), plan.to_string());
        self
    }

    pub fn raw_plan(mut self, url: &str, body: &str, raw: &str) -> Self {
        self.fetcher.pages.insert(url.to_string(), body.to_string());
        self.planner.plans.insert(url.to_string(), raw.to_string());
        self
    }

    /// 只注册页面（例如 secret code 抓取目标）
    pub fn scrape_page(mut self, url: &str, body: &str) -> Self {
        self.fetcher.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn response(mut self, submit_url: &str, body: JsonValue) -> Self {
        self.submitter.responses.insert(submit_url.to_string(), body);
        self
    }

    pub fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.downloader.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn snippet(mut self, snippet: &str) -> Self {
        self.snippet = snippet.to_string();
        self
    }

    pub fn eval(
        mut self,
        eval: impl Fn(&str, &ExecutionBindings) -> Result<JsonValue, ExecutionError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.eval = Box::new(eval);
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetcher.delay = Some(delay);
        self
    }

    pub fn panic_on(mut self, url: &str) -> Self {
        self.fetcher.panic_on = Some(url.to_string());
        self
    }

    pub fn build(self) -> Harness {
        Harness {
            fetcher: Arc::new(self.fetcher),
            planner: Arc::new(self.planner),
            synthesizer: Arc::new(FixedSynthesizer {
                snippet: self.snippet,
                requests: Mutex::new(Vec::new()),
            }),
            evaluator: Arc::new(ClosureEvaluator {
                eval: self.eval,
                calls: Mutex::new(0),
            }),
            downloader: Arc::new(self.downloader),
            submitter: Arc::new(self.submitter),
        }
    }
}

/// 规划 JSON
pub fn plan(submit_url: &str, answer_type: &str, instructions: &str) -> JsonValue {
    json!({
        "question_summary": "test question",
        "submit_url": submit_url,
        "data_sources": [],
        "answer_type": answer_type,
        "answer_instructions": instructions,
    })
}
