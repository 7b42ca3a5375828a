use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    models::{QuestionStatus, Verdict, VerdictRequest},
    services::AppState,
};

/// Judge queue: every record currently awaiting a verdict, across all
/// participants.
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.store.list_pending().await {
        Ok(mut records) => {
            records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
            Ok((StatusCode::OK, Json(records)))
        }
        Err(e) => {
            tracing::error!("Failed to list pending submissions: {}", e);
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

/// The external verdict write of the judging handshake: flips the stored
/// status to correct/wrong and nothing else. The participant engine discovers
/// the change by polling and applies points/advancement on its own side.
pub async fn post_verdict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerdictRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Judge verdict {:?} for participant={} question={}",
        req.verdict,
        req.participant_id,
        req.question_id
    );

    let record = state
        .store
        .get(&req.participant_id, &req.question_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read record for verdict: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        })?;

    let Some(mut record) = record else {
        return Err((StatusCode::NOT_FOUND, "Submission not found".to_string()));
    };

    if record.status != QuestionStatus::Pending {
        return Err((
            StatusCode::CONFLICT,
            "No submission awaiting judgment".to_string(),
        ));
    }

    record.status = match req.verdict {
        Verdict::Correct => QuestionStatus::Correct,
        Verdict::Wrong => QuestionStatus::Wrong,
    };
    record.updated_at = Utc::now();

    state.store.upsert(&record).await.map_err(|e| {
        tracing::error!("Failed to persist verdict: {}", e);
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    Ok((StatusCode::NO_CONTENT, ()))
}
