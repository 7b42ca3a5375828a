use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ProgressionError,
    models::{
        OpenSessionRequest, SelectQuestionRequest, SelectRoundRequest, SubmitAnswerRequest,
    },
    services::{progression::ProgressionService, AppState},
};

fn reject(e: ProgressionError) -> (StatusCode, String) {
    let status = e.status_code();
    if status.is_server_error() {
        tracing::error!("Progression action failed: {}", e);
    } else {
        tracing::info!("Progression action rejected: {}", e);
    }
    (status, e.to_string())
}

pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Opening session for participant_id={}, team={}",
        participant_id,
        req.team_name
    );

    let service = ProgressionService::new(state);
    match service.open(&participant_id, &req.team_name).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = ProgressionService::new(state);
    match service.state_view(&participant_id).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn select_round(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
    Json(req): Json<SelectRoundRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Participant {} selecting round {}",
        participant_id,
        req.round
    );

    let service = ProgressionService::new(state);
    match service.select_round(&participant_id, req.round).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn select_question(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
    Json(req): Json<SelectQuestionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Participant {} selecting question index {}",
        participant_id,
        req.index
    );

    let service = ProgressionService::new(state);
    match service.select_question(&participant_id, req.index).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn start_question(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Participant {} starting focused question", participant_id);

    let service = ProgressionService::new(state);
    match service.start(&participant_id).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn submit_for_judgment(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Participant {} submitting for judgment", participant_id);

    let service = ProgressionService::new(state);
    match service.submit(&participant_id, req.answer).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn skip_question(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Participant {} skipping focused question", participant_id);

    let service = ProgressionService::new(state);
    match service.skip(&participant_id).await {
        Ok(view) => Ok((StatusCode::OK, Json(view))),
        Err(e) => Err(reject(e)),
    }
}
