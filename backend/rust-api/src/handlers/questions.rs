use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::services::AppState;

/// Full catalog, sorted by difficulty then order. The progression core only
/// ever reads this; content management happens elsewhere.
pub async fn list_questions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let questions: Vec<_> = state.catalog.all().into_iter().cloned().collect();
    (StatusCode::OK, Json(questions))
}
