//! HTTP 入口
//!
//! - `GET /`、`GET /quiz`：使用说明
//! - `POST /quiz`：`{email, secret, url}`，校验 secret 后跑完整条链路，返回历史记录

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{body::Bytes, extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::QuizError;
use crate::orchestrator::QuizOrchestrator;

const USAGE: &str = "Quiz solver running. Send POST to /quiz with {email, secret, url}.";

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<QuizOrchestrator>,
    pub config: Arc<Config>,
}

/// 入口请求中的三个字段
#[derive(Debug, Clone, PartialEq)]
pub struct QuizRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

/// 入口请求的校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum RequestRejection {
    InvalidJson,
    MissingFields,
}

impl RequestRejection {
    fn message(&self) -> &'static str {
        match self {
            RequestRejection::InvalidJson => "Invalid JSON",
            RequestRejection::MissingFields => "Missing fields",
        }
    }
}

/// 解析请求体，字段缺失、为空或不是字符串都视为缺失
pub fn parse_quiz_request(body: &[u8]) -> Result<QuizRequest, RequestRejection> {
    let value: JsonValue =
        serde_json::from_slice(body).map_err(|_| RequestRejection::InvalidJson)?;
    let fields = value.as_object().ok_or(RequestRejection::InvalidJson)?;

    let field = |key: &str| {
        fields
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    match (field("email"), field("secret"), field("url")) {
        (Some(email), Some(secret), Some(url)) => Ok(QuizRequest { email, secret, url }),
        _ => Err(RequestRejection::MissingFields),
    }
}

/// 处理一次答题请求
///
/// 开始时间取请求到达的时刻。
pub async fn handle_quiz_request(state: &ApiState, body: &[u8]) -> (StatusCode, JsonValue) {
    let start_time = Instant::now();

    let request = match parse_quiz_request(body) {
        Ok(request) => request,
        Err(rejection) => {
            warn!("请求被拒绝: {}", rejection.message());
            return (
                StatusCode::BAD_REQUEST,
                json!({ "error": rejection.message() }),
            );
        }
    };

    if request.secret != state.config.quiz_secret {
        warn!("{} ({})", QuizError::AuthorizationFailed, request.email);
        return (StatusCode::FORBIDDEN, json!({ "error": "Invalid secret" }));
    }

    info!("📥 收到答题请求: {} → {}", request.email, request.url);
    let history = state
        .orchestrator
        .run(
            &request.email,
            &request.secret,
            &request.url,
            start_time,
            state.config.time_limit(),
        )
        .await;

    (
        StatusCode::OK,
        json!({ "status": "completed", "history": history }),
    )
}

async fn usage() -> Json<JsonValue> {
    Json(json!({ "message": USAGE }))
}

async fn quiz_handler(State(state): State<ApiState>, body: Bytes) -> (StatusCode, Json<JsonValue>) {
    let (status, body) = handle_quiz_request(&state, &body).await;
    (status, Json(body))
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(usage))
        .route("/quiz", get(usage).post(quiz_handler))
        .with_state(state)
}

/// 启动 HTTP 服务
pub async fn start_server(orchestrator: Arc<QuizOrchestrator>, config: Config) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    if config.quiz_secret.is_empty() {
        warn!("⚠️ 未配置 QUIZ_SECRET，所有请求都会被拒绝");
    }

    let router = create_router(ApiState {
        orchestrator,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("无法监听 {}", bind_addr))?;
    info!("📡 HTTP 服务已启动: http://{}", bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
