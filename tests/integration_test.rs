//! 需要真实浏览器 / LLM 的端到端测试
//!
//! 默认忽略，需要手动运行：cargo test -- --ignored

use std::sync::Arc;

use quiz_solver::browser::{launch_headless_browser, BrowserFetcher, PageFetcher};
use quiz_solver::config::Config;
use quiz_solver::infrastructure::{Evaluator, ExecutionBindings, JsExecutor};
use quiz_solver::models::{AnswerMeta, IngestedDataContext, Table};
use quiz_solver::orchestrator::build_orchestrator;
use quiz_solver::utils::logging;
use serde_json::json;
use tokio::time::Instant;

#[tokio::test]
#[ignore]
async fn test_snippet_runs_in_sandbox() {
    logging::init(true);
    let config = Config::load().expect("加载配置失败");

    let browser = launch_headless_browser(config.chrome_executable.as_deref())
        .await
        .expect("启动浏览器失败");
    let executor = JsExecutor::new(Arc::new(browser));

    let context = IngestedDataContext {
        delimited_tables: vec![Table::new(
            vec!["city".into(), "sales".into()],
            vec![vec![json!("A"), json!(10)], vec![json!("B"), json!(32)]],
        )],
        ..Default::default()
    };
    let meta = AnswerMeta {
        email: "a@b.c".to_string(),
        secret: "s".to_string(),
        quiz_url: "https://quiz.example/q".to_string(),
    };
    let bindings = ExecutionBindings::new(&context, "Cutoff: 15", &meta);

    let answer = executor
        .evaluate(
            "const cutoff = Number(page_text.match(/Cutoff: (\\d+)/)[1]);\n\
             answer = tab.sum(tab.column(csv_tables[0], 'sales').filter(v => v > cutoff));",
            bindings,
        )
        .await
        .expect("执行失败");

    assert_eq!(answer, json!(32));
}

#[tokio::test]
#[ignore]
async fn test_fetch_rendered_page() {
    logging::init(true);
    let config = Config::load().expect("加载配置失败");

    let browser = launch_headless_browser(config.chrome_executable.as_deref())
        .await
        .expect("启动浏览器失败");
    let fetcher = BrowserFetcher::new(Arc::new(browser), config.page_settle());

    let page = fetcher
        .fetch("https://example.com/")
        .await
        .expect("抓取页面失败");

    assert!(page.body_text.contains("Example Domain"));
    assert!(!page.links.is_empty());
}

/// 跑一条真实链路，需要设置 QUIZ_START_URL / QUIZ_EMAIL / QUIZ_SECRET 和 LLM 配置
#[tokio::test]
#[ignore]
async fn test_live_chain() {
    logging::init(true);
    let config = Config::load().expect("加载配置失败");
    let start_url = std::env::var("QUIZ_START_URL").expect("缺少 QUIZ_START_URL");
    let email = std::env::var("QUIZ_EMAIL").expect("缺少 QUIZ_EMAIL");

    let browser = launch_headless_browser(config.chrome_executable.as_deref())
        .await
        .expect("启动浏览器失败");
    let orchestrator = build_orchestrator(&config, Arc::new(browser)).expect("组装失败");

    let history = orchestrator
        .run(
            &email,
            &config.quiz_secret,
            &start_url,
            Instant::now(),
            config.time_limit(),
        )
        .await;

    assert!(!history.is_empty());
}
