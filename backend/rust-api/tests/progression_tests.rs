use axum::http::StatusCode;
use serde_json::json;

use coderush_api::create_router;

mod common;

#[tokio::test]
async fn open_session_returns_initial_state() {
    let (app, _state) = common::create_test_app();

    let (status, body) = common::post_json(
        &app,
        "/api/v1/progress/team-1/open",
        json!({ "team_name": "Rustaceans" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let state = common::parse(&body);
    assert_eq!(state["team_name"], "Rustaceans");
    assert_eq!(state["focus"]["round"], "easy");
    assert_eq!(state["focus"]["index"], 0);
    assert_eq!(state["total_points"], 0);

    // Easy open, medium and hard gated behind it.
    assert_eq!(state["rounds"][0]["locked"], false);
    assert_eq!(state["rounds"][1]["locked"], true);
    assert_eq!(state["rounds"][2]["locked"], true);

    // First question reachable, everything past it locked.
    assert_eq!(state["rounds"][0]["questions"][0]["locked"], false);
    assert_eq!(state["rounds"][0]["questions"][1]["locked"], true);
    assert_eq!(state["rounds"][0]["questions"][2]["locked"], true);
}

#[tokio::test]
async fn state_requires_open_session() {
    let (app, _state) = common::create_test_app();
    let (status, _) = common::get(&app, "/api/v1/progress/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_and_correct_verdict_awards_points_and_advances() {
    let (app, _state) = common::create_test_app();

    common::post_json(
        &app,
        "/api/v1/progress/team-2/open",
        json!({ "team_name": "Lifetime Legends" }),
    )
    .await;

    let (status, body) =
        common::post_json(&app, "/api/v1/progress/team-2/start", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let state = common::parse(&body);
    assert_eq!(state["rounds"][0]["questions"][0]["status"], "in_progress");
    assert_eq!(state["rounds"][0]["questions"][0]["is_paused"], false);

    let (status, body) = common::post_json(
        &app,
        "/api/v1/progress/team-2/submit",
        json!({ "answer": "fn main() {}" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let state = common::parse(&body);
    assert_eq!(state["rounds"][0]["questions"][0]["status"], "pending");
    assert_eq!(state["rounds"][0]["questions"][0]["is_paused"], true);

    // External judge marks it correct; the engine discovers it by polling.
    let (status, _) = common::post_json(
        &app,
        "/api/v1/judge/verdict",
        json!({ "participant_id": "team-2", "question_id": "e1", "verdict": "correct" }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let state = common::wait_for_state(&app, "team-2", |s| {
        s["rounds"][0]["questions"][0]["status"] == "correct"
    })
    .await;
    assert_eq!(state["rounds"][0]["questions"][0]["points"], 2);
    assert_eq!(state["total_points"], 2);
    // Focus advanced to the next question.
    assert_eq!(state["focus"]["index"], 1);
    assert_eq!(state["rounds"][0]["questions"][1]["locked"], false);

    // Re-judging an already resolved record is refused and changes nothing.
    let (status, _) = common::post_json(
        &app,
        "/api/v1/judge/verdict",
        json!({ "participant_id": "team-2", "question_id": "e1", "verdict": "correct" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = common::get(&app, "/api/v1/progress/team-2").await;
    let state = common::parse(&body);
    assert_eq!(state["total_points"], 2);
    assert_eq!(state["focus"]["index"], 1);
}

#[tokio::test]
async fn wrong_verdict_returns_to_in_progress_without_refund() {
    let (app, _state) = common::create_test_app();

    common::post_json(
        &app,
        "/api/v1/progress/team-3/open",
        json!({ "team_name": "Panic Free" }),
    )
    .await;
    common::post_json(&app, "/api/v1/progress/team-3/start", json!({})).await;

    let (_, body) = common::post_json(
        &app,
        "/api/v1/progress/team-3/submit",
        json!({ "answer": "almost right" }),
    )
    .await;
    let remaining_at_submit = common::parse(&body)["rounds"][0]["questions"][0]
        ["remaining_seconds"]
        .as_u64()
        .unwrap();

    common::post_json(
        &app,
        "/api/v1/judge/verdict",
        json!({ "participant_id": "team-3", "question_id": "e1", "verdict": "wrong" }),
    )
    .await;

    let state = common::wait_for_state(&app, "team-3", |s| {
        s["rounds"][0]["questions"][0]["status"] == "in_progress"
    })
    .await;
    // No refund, no reset: the clock resumes from the submission value
    // (allow a tick or two for the resumed countdown).
    let remaining_after = state["rounds"][0]["questions"][0]["remaining_seconds"]
        .as_u64()
        .unwrap();
    assert!(remaining_after <= remaining_at_submit);
    assert!(remaining_at_submit - remaining_after <= 2);
    assert_eq!(state["rounds"][0]["questions"][0]["is_paused"], false);
    assert_eq!(state["total_points"], 0);
}

#[tokio::test]
async fn locked_round_selection_is_rejected_without_mutation() {
    let (app, _state) = common::create_test_app();

    common::post_json(
        &app,
        "/api/v1/progress/team-4/open",
        json!({ "team_name": "Deadlock" }),
    )
    .await;

    let (status, _) = common::post_json(
        &app,
        "/api/v1/progress/team-4/round",
        json!({ "round": "medium" }),
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);

    let (_, body) = common::get(&app, "/api/v1/progress/team-4").await;
    let state = common::parse(&body);
    assert_eq!(state["focus"]["round"], "easy");
    assert_eq!(state["focus"]["index"], 0);
}

#[tokio::test]
async fn skip_advances_focus_and_preserves_remaining_time() {
    let (app, _state) = common::create_test_app();

    common::post_json(
        &app,
        "/api/v1/progress/team-5/open",
        json!({ "team_name": "Unsafe Block" }),
    )
    .await;

    // Skip before starting is not a legal transition.
    let (status, _) = common::post_json(&app, "/api/v1/progress/team-5/skip", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::post_json(&app, "/api/v1/progress/team-5/start", json!({})).await;
    let (status, body) = common::post_json(&app, "/api/v1/progress/team-5/skip", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let state = common::parse(&body);
    assert_eq!(state["focus"]["index"], 1);
    assert_eq!(state["rounds"][0]["questions"][0]["status"], "skipped");
    assert_eq!(state["rounds"][0]["questions"][0]["points"], 0);
    assert_eq!(state["rounds"][0]["questions"][0]["remaining_seconds"], 900);

    // A skipped question behind the focus is locked until focus comes back
    // around on its own.
    let (status, _) = common::post_json(
        &app,
        "/api/v1/progress/team-5/question",
        json!({ "index": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn reload_reconstructs_state_from_the_store() {
    let (app, state) = common::create_test_app();

    common::post_json(
        &app,
        "/api/v1/progress/team-6/open",
        json!({ "team_name": "Sync Send" }),
    )
    .await;
    common::post_json(&app, "/api/v1/progress/team-6/start", json!({})).await;

    // Simulated reload: a fresh process over the same Progress Store, with
    // no in-memory state carried over.
    let state2 = common::build_state(state.store.clone(), common::test_format());
    let app2 = create_router(state2.clone());

    let (status, body) = common::post_json(
        &app2,
        "/api/v1/progress/team-6/open",
        json!({ "team_name": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let reloaded = common::parse(&body);
    assert_eq!(reloaded["team_name"], "Sync Send");
    assert_eq!(reloaded["focus"]["round"], "easy");
    assert_eq!(reloaded["focus"]["index"], 0);
    assert_eq!(reloaded["rounds"][0]["questions"][0]["status"], "in_progress");
    assert_eq!(
        reloaded["rounds"][0]["questions"][0]["remaining_seconds"],
        900
    );
}

#[tokio::test]
async fn question_catalog_is_sorted_by_difficulty_then_order() {
    let (app, _state) = common::create_test_app();

    let (status, body) = common::get(&app, "/api/v1/questions").await;
    assert_eq!(status, StatusCode::OK);

    let questions = common::parse(&body);
    let ids: Vec<&str> = questions
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["e1", "e2", "e3", "m1", "m2", "h1", "h2", "h3"]);
}

#[tokio::test]
async fn health_reports_store_status() {
    let (app, _state) = common::create_test_app();

    let (status, body) = common::get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let health = common::parse(&body);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "coderush-api");
}

#[tokio::test]
#[serial_test::serial]
async fn metrics_endpoint_requires_basic_auth() {
    std::env::remove_var("METRICS_AUTH");
    let (app, _state) = common::create_test_app();
    let (status, _) = common::get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial_test::serial]
async fn metrics_endpoint_accepts_configured_credentials() {
    use axum::body::{to_bytes, Body};
    use tower::ServiceExt;

    std::env::set_var("METRICS_AUTH", "ops:secret");
    let (app, _state) = common::create_test_app();

    // Make sure at least one counter family has a sample to render.
    coderush_api::metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/warmup", "200"])
        .inc();

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", "Basic b3BzOnNlY3JldA==")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    std::env::remove_var("METRICS_AUTH");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("http_requests_total"));
}
