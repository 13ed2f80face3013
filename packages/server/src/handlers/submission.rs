use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use common::{RoomEvent, SolutionSubmitted};
use engine::languages::normalize_language;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::shared::PlayerQuery;
use crate::models::submission::{SubmitSolutionRequest, SubmitSolutionResponse};
use crate::state::AppState;

/// Queue a solution for judging in a room.
///
/// Validation failures (unknown language, oversize code) are rejected
/// here with 400; a full room queue is 503 and the client retries. On
/// 202 the verdict arrives on the room's SSE stream and the submission
/// row tracks the terminal status.
#[utoipa::path(
    post,
    path = "/events/{event_id}/rooms/{room_id}/submit",
    tag = "Submissions",
    operation_id = "submitSolution",
    summary = "Submit a solution",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("room_id" = Uuid, Path, description = "Room ID"),
        PlayerQuery,
    ),
    request_body = SubmitSolutionRequest,
    responses(
        (status = 202, description = "Submission queued", body = SubmitSolutionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Room not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Room queue full (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(%event_id, %room_id))]
pub async fn submit_solution(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PlayerQuery>,
    AppJson(payload): AppJson<SubmitSolutionRequest>,
) -> Result<(StatusCode, Json<SubmitSolutionResponse>), AppError> {
    if normalize_language(&payload.language).is_none() {
        warn!(language = %payload.language, "Unknown programming language");
        return Err(AppError::Validation("Invalid programming language".into()));
    }

    let max_code_length = state.config.engine.max_code_length;
    if payload.code.len() > max_code_length {
        return Err(AppError::Validation(format!(
            "Code exceeds the maximum length of {max_code_length} bytes"
        )));
    }

    let room = state
        .hub
        .room(room_id)
        .ok_or_else(|| AppError::NotFound("Room not found or not active".into()))?;

    let problem_id = payload.problem_id;
    let language = payload.language.clone();

    room.submit(RoomEvent::SolutionSubmitted(SolutionSubmitted {
        player_id: query.player_id,
        event_id,
        room_id,
        problem_id,
        code: payload.code,
        language: payload.language,
        submitted_at: Utc::now(),
        submission_id: None,
    }))?;

    info!(player_id = %query.player_id, %problem_id, "Submission queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitSolutionResponse {
            room_id,
            problem_id,
            language,
            queued: true,
        }),
    ))
}
