mod common;

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use common::{plan, Harness};
use quiz_solver::error::{ErrorKind, ExecutionError, Phase};
use quiz_solver::services::answer_synthesizer::DEMO_ANSWER;

const EMAIL: &str = "student@example.com";
const SECRET: &str = "s3cr3t";
const LIMIT: Duration = Duration::from_secs(180);

#[tokio::test]
async fn test_chain_follows_continuation_url() {
    let h = Harness::builder()
        .page("https://x/start", "Q1", plan("https://x/submit1", "number", "sum"))
        .page("https://x/next", "Q2", plan("/submit2", "number", "sum"))
        .response("https://x/submit1", json!({"correct": true, "url": "https://x/next"}))
        .response("https://x/submit2", json!({"correct": true}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/start", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 2);
    assert_eq!(h.fetched(), vec!["https://x/start", "https://x/next"]);
    assert_eq!(history[1].quiz_url, "https://x/next");
    assert!(history.iter().all(|r| !r.is_error()));

    let submissions = h.submissions();
    assert_eq!(submissions[1].0, "https://x/submit2");
    assert_eq!(submissions[1].1.url, "https://x/next");
    assert_eq!(submissions[1].1.email, EMAIL);
    assert_eq!(submissions[1].1.secret, SECRET);
}

#[tokio::test]
async fn test_chain_stops_without_continuation() {
    let h = Harness::builder()
        .page("https://x/only", "Q", plan("https://x/submit", "number", "sum"))
        .response("https://x/submit", json!({"correct": false, "reason": "wrong"}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/only", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert!(!record.is_error());
    assert_eq!(record.answer, Some(json!(1)));
    assert!(!record.response.as_ref().unwrap().correct());
}

#[tokio::test]
async fn test_first_phase_failure_still_returns_history() {
    let h = Harness::builder().build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/unreachable", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].error_kind, Some(ErrorKind::PageFetchFailed));
    assert_eq!(history[0].phase, Some(Phase::Fetching));
    assert!(history[0].error.as_deref().unwrap().starts_with("fetch"));
}

#[tokio::test]
async fn test_zero_budget_attempts_nothing() {
    let h = Harness::builder()
        .page("https://x/start", "Q", plan("https://x/submit", "number", "sum"))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/start", Instant::now(), Duration::ZERO)
        .await;

    assert!(history.is_empty());
    assert!(h.fetched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_budget_expiring_mid_step_blocks_next_phase() {
    let h = Harness::builder()
        .page("https://x/slow", "Q", plan("https://x/submit", "number", "sum"))
        .response("https://x/submit", json!({"correct": true}))
        .fetch_delay(Duration::from_secs(5))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/slow", Instant::now(), Duration::from_secs(3))
        .await;

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].error_kind, Some(ErrorKind::BudgetExhausted));
    assert_eq!(history[0].phase, Some(Phase::Planning));
    assert!(h.submissions().is_empty());
    assert_eq!(h.evaluator_calls(), 0);
}

#[tokio::test]
async fn test_raising_snippet_is_recorded() {
    let h = Harness::builder()
        .page("https://x/q", "Q", plan("https://x/submit", "number", "sum"))
        .snippet("throw new Error('boom');")
        .eval(|_, _| {
            Err(ExecutionError::Raised {
                message: "Error: boom".to_string(),
            })
        })
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.error_kind, Some(ErrorKind::SynthesisExecutionFailed));
    assert_eq!(record.phase, Some(Phase::Answering));
    assert!(record.plan.is_some());
    assert!(record.error.as_deref().unwrap().contains("boom"));
    assert!(h.submissions().is_empty());
}

#[tokio::test]
async fn test_unassigned_answer_is_recorded() {
    let h = Harness::builder()
        .page("https://x/q", "Q", plan("https://x/submit", "number", "sum"))
        .snippet("let total = 3;")
        .eval(|_, _| Err(ExecutionError::AnswerUnset))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].error_kind, Some(ErrorKind::SynthesisExecutionFailed));
}

#[tokio::test]
async fn test_demo_page_submits_fixed_answer() {
    let h = Harness::builder()
        .page(
            "https://x/demo",
            "Demo",
            plan("https://x/submit", "string", "Post anything you want"),
        )
        .response("https://x/submit", json!({"correct": true}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/demo", Instant::now(), LIMIT)
        .await;

    assert_eq!(history[0].answer, Some(json!(DEMO_ANSWER)));
    assert_eq!(h.evaluator_calls(), 0);
}

#[tokio::test]
async fn test_secret_code_page_is_scraped() {
    let h = Harness::builder()
        .page(
            "https://x/demo-scrape?email=a",
            "Scrape the data page",
            plan("https://x/submit", "string", "Get the secret code"),
        )
        .scrape_page("https://x/demo-scrape-data?email=a", "Secret code is 98765 .")
        .response("https://x/submit", json!({"correct": true}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/demo-scrape?email=a", Instant::now(), LIMIT)
        .await;

    assert_eq!(history[0].answer, Some(json!("98765")));
    assert_eq!(
        h.fetched(),
        vec!["https://x/demo-scrape?email=a", "https://x/demo-scrape-data?email=a"]
    );
}

#[tokio::test]
async fn test_ingested_tables_reach_evaluator() {
    let plan = json!({
        "submit_url": "/submit",
        "data_sources": [
            {"type": "file", "url": "/data.csv", "format": "csv"},
            {"type": "file", "url": "/missing.pdf", "format": "pdf"}
        ],
        "answer_type": "number",
        "answer_instructions": "Sum the sales column"
    });
    let h = Harness::builder()
        .page("https://x/q/1", "Sum it", plan)
        .file("https://x/data.csv", b"city,sales\nA,10\nB,32\n")
        .response("https://x/submit", json!({"correct": true}))
        .snippet("answer = tab.sum(tab.column(csv_tables[0], 'sales'));")
        .eval(|_, bindings| {
            assert_eq!(bindings.raw_files.len(), 2);
            assert!(bindings.raw_files[1].error.is_some());
            let total: i64 = bindings.csv_tables[0]
                .rows
                .iter()
                .filter_map(|row| row["sales"].as_i64())
                .sum();
            Ok(json!(total))
        })
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q/1", Instant::now(), LIMIT)
        .await;

    assert!(!history[0].is_error());
    assert_eq!(history[0].answer, Some(json!(42)));
    assert_eq!(h.submissions()[0].0, "https://x/submit");
}

#[tokio::test]
async fn test_missing_submit_url_stops_chain() {
    let h = Harness::builder()
        .page("https://x/q", "Q", json!({"answer_type": "number"}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].error_kind, Some(ErrorKind::MissingSubmitUrl));
    assert_eq!(history[0].phase, Some(Phase::Planning));
}

#[tokio::test]
async fn test_unparseable_plan_keeps_raw_text() {
    let h = Harness::builder()
        .raw_plan("https://x/q", "Q", "Sorry, I can't produce a plan for this page.")
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q", Instant::now(), LIMIT)
        .await;

    assert_eq!(history[0].error_kind, Some(ErrorKind::PlanUnparseable));
    assert!(history[0]
        .error
        .as_deref()
        .unwrap()
        .contains("can't produce a plan"));
}

#[tokio::test]
async fn test_submission_failure_keeps_answer() {
    let h = Harness::builder()
        .page("https://x/q", "Q", plan("https://x/down", "number", "sum"))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/q", Instant::now(), LIMIT)
        .await;

    let record = &history[0];
    assert_eq!(record.error_kind, Some(ErrorKind::SubmissionTransportFailed));
    assert_eq!(record.answer, Some(json!(1)));
    let error = record.error.as_deref().unwrap();
    assert!(error.contains("https://x/down"));
    assert!(!error.contains(SECRET));
}

#[tokio::test]
async fn test_revisited_url_stops_chain() {
    let h = Harness::builder()
        .page("https://x/loop", "Q", plan("https://x/submit", "number", "sum"))
        .response("https://x/submit", json!({"correct": true, "url": "https://x/loop"}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/loop", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    assert_eq!(h.fetched(), vec!["https://x/loop"]);
}

#[tokio::test]
async fn test_start_url_is_normalized_before_loop_check() {
    let h = Harness::builder()
        .page("https://x/", "Q", plan("https://x/submit", "number", "sum"))
        .response("https://x/submit", json!({"correct": true, "url": "https://x/"}))
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, " https://x ", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 1);
    assert!(!history[0].is_error());
    assert_eq!(history[0].quiz_url, "https://x/");
    assert_eq!(h.fetched(), vec!["https://x/"]);
}

#[tokio::test]
async fn test_panic_becomes_internal_fault_record() {
    let h = Harness::builder()
        .page("https://x/start", "Q1", plan("https://x/submit", "number", "sum"))
        .response("https://x/submit", json!({"correct": true, "url": "https://x/crash"}))
        .panic_on("https://x/crash")
        .build();

    let history = h
        .orchestrator()
        .run(EMAIL, SECRET, "https://x/start", Instant::now(), LIMIT)
        .await;

    assert_eq!(history.len(), 2);
    assert!(!history[0].is_error());
    assert_eq!(history[1].error_kind, Some(ErrorKind::InternalFault));
    assert!(history[1].error.as_deref().unwrap().contains("renderer crashed"));
}
