//! 答案提交 - 业务能力层

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{QuizError, QuizResult};
use crate::models::SubmissionResponse;

const REDACTED: &str = "***";

/// 提交请求体，字段固定为 `{email, secret, url, answer}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub email: String,
    pub secret: String,
    /// 当前题目地址
    pub url: String,
    pub answer: JsonValue,
}

impl Submission {
    /// 用于错误信息的请求体，secret 已隐藏
    pub fn redacted_payload(&self) -> String {
        let redacted = Submission {
            secret: REDACTED.to_string(),
            ..self.clone()
        };
        serde_json::to_string(&redacted).unwrap_or_default()
    }
}

/// 提交能力
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit(&self, submit_url: &str, submission: &Submission)
        -> QuizResult<SubmissionResponse>;
}

/// 提交客户端
///
/// 只发一次请求，返回体原样交给调用方。
pub struct SubmissionClient {
    client: reqwest::Client,
}

impl SubmissionClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self { client })
    }

    async fn post(&self, submit_url: &str, submission: &Submission) -> reqwest::Result<JsonValue> {
        self.client
            .post(submit_url)
            .json(submission)
            .send()
            .await?
            .error_for_status()?
            .json::<JsonValue>()
            .await
    }
}

#[async_trait]
impl AnswerSubmitter for SubmissionClient {
    async fn submit(
        &self,
        submit_url: &str,
        submission: &Submission,
    ) -> QuizResult<SubmissionResponse> {
        info!("📤 提交答案到 {}", submit_url);
        debug!("提交内容: {}", submission.redacted_payload());

        match self.post(submit_url, submission).await {
            Ok(body) => {
                let response = SubmissionResponse(body);
                info!(
                    "评分结果: correct={}, next={}",
                    response.correct(),
                    response.next_url().unwrap_or("-")
                );
                if let Some(reason) = response.reason() {
                    debug!("评分说明: {}", reason);
                }
                Ok(response)
            }
            Err(e) => {
                warn!("❌ 提交失败: {}", e);
                Err(QuizError::SubmissionTransportFailed {
                    submit_url: submit_url.to_string(),
                    payload: submission.redacted_payload(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
