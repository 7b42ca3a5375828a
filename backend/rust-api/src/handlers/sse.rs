use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    models::timer::{TimeExpired, TimerEvent, TimerTick},
    services::{progression::ProgressionService, AppState},
};

/// SSE endpoint streaming timer events for the focused question.
/// GET /api/v1/progress/{participant_id}/stream
///
/// Observer only: the authoritative countdown runs inside the engine's
/// ticker; this stream just reports it to the UI once a second.
pub async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Client connected to progress stream: participant={}",
        participant_id
    );

    // Reject unknown participants up front.
    let service = ProgressionService::new(state.clone());
    service
        .state_view(&participant_id)
        .await
        .map_err(|e| (e.status_code(), e.to_string()))?;

    let stream = create_timer_stream(state, participant_id);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn create_timer_stream(
    state: Arc<AppState>,
    participant_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (state, participant_id, false),
        move |(state, participant_id, expired_sent)| async move {
            if expired_sent {
                return None;
            }

            sleep(Duration::from_secs(1)).await;

            let engine = state.engine(&participant_id).await?;
            let (question_id, remaining, running) = {
                let guard = engine.lock().await;
                (
                    guard.focused_question_id().unwrap_or_default(),
                    guard.remaining_seconds(),
                    guard.timer_running(),
                )
            };

            if remaining == 0 {
                let event = TimerEvent::TimeExpired(TimeExpired {
                    participant_id: participant_id.clone(),
                    question_id,
                    timestamp: Utc::now(),
                    message: "Time limit exceeded".to_string(),
                });
                let event = Event::default()
                    .event(event.event_name())
                    .data(event.to_sse_data());
                return Some((Ok(event), (state, participant_id, true)));
            }

            let event = TimerEvent::TimerTick(TimerTick {
                participant_id: participant_id.clone(),
                question_id,
                remaining_seconds: remaining,
                is_paused: !running,
                timestamp: Utc::now(),
            });
            let event = Event::default()
                .event(event.event_name())
                .data(event.to_sse_data());

            Some((Ok(event), (state, participant_id, false)))
        },
    )
}
