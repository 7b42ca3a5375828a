#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use coderush_api::config::{CompetitionFormat, Config};
use coderush_api::models::{Difficulty, Question, QuestionStatus, Verdict};
use coderush_api::services::catalog_service::QuestionCatalog;
use coderush_api::services::progress_store::{InMemoryProgressStore, ProgressStore};
use coderush_api::{create_router, AppState};

/// Poll fast so verdict-absorption tests finish quickly.
pub fn test_format() -> CompetitionFormat {
    CompetitionFormat {
        verdict_poll_interval_ms: 50,
        ..CompetitionFormat::default()
    }
}

pub fn test_config(format: CompetitionFormat) -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017/coderush-test".to_string(),
        mongo_database: "coderush_test".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        format,
    }
}

pub fn question(id: &str, difficulty: Difficulty, order: u32) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {}", id),
        description: format!("Solve {}", id),
        difficulty,
        order,
    }
}

/// 3 easy, 2 medium, 3 hard.
pub fn test_catalog() -> QuestionCatalog {
    QuestionCatalog::new(vec![
        question("e1", Difficulty::Easy, 1),
        question("e2", Difficulty::Easy, 2),
        question("e3", Difficulty::Easy, 3),
        question("m1", Difficulty::Medium, 1),
        question("m2", Difficulty::Medium, 2),
        question("h1", Difficulty::Hard, 1),
        question("h2", Difficulty::Hard, 2),
        question("h3", Difficulty::Hard, 3),
    ])
}

pub fn build_state(store: Arc<dyn ProgressStore>, format: CompetitionFormat) -> Arc<AppState> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    Arc::new(AppState::new(test_config(format), test_catalog(), store))
}

pub fn create_test_app() -> (Router, Arc<AppState>) {
    let store: Arc<dyn ProgressStore> = Arc::new(InMemoryProgressStore::new());
    let state = build_state(store, test_format());
    (create_router(state.clone()), state)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

pub fn parse(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or(serde_json::Value::Null)
}

/// Simulates the external judge UI: flips the stored status and nothing else,
/// exactly like the verdict endpoint does.
pub async fn judge_directly(
    store: &Arc<dyn ProgressStore>,
    participant_id: &str,
    question_id: &str,
    verdict: Verdict,
) {
    let mut record = store
        .get(participant_id, question_id)
        .await
        .unwrap()
        .expect("record to judge must exist");
    assert_eq!(record.status, QuestionStatus::Pending, "not awaiting judgment");
    record.status = match verdict {
        Verdict::Correct => QuestionStatus::Correct,
        Verdict::Wrong => QuestionStatus::Wrong,
    };
    store.upsert(&record).await.unwrap();
}

/// Fetches the participant state until `predicate` holds or the attempts run
/// out. Lets tests wait for the asynchronous verdict poll to absorb a status.
pub async fn wait_for_state<F>(app: &Router, participant_id: &str, predicate: F) -> serde_json::Value
where
    F: Fn(&serde_json::Value) -> bool,
{
    let uri = format!("/api/v1/progress/{}", participant_id);
    for _ in 0..100 {
        let (status, body) = get(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        let state = parse(&body);
        if predicate(&state) {
            return state;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("state never satisfied predicate for {}", participant_id);
}
