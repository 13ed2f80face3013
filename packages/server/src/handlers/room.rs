use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, instrument};
use uuid::Uuid;

use common::RoomEvent;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::room::{CreateRoomRequest, RoomResponse};
use crate::state::AppState;

/// Create a room under an event and register its hub.
#[utoipa::path(
    post,
    path = "/events/{event_id}/rooms",
    tag = "Rooms",
    operation_id = "createRoom",
    summary = "Create a room",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(%event_id))]
pub async fn create_room(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    AppJson(payload): AppJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(AppError::Validation(
            "Room name must be between 1 and 100 characters".into(),
        ));
    }

    let _ = state.store.get_event(event_id).await?;

    let room = state.store.create_room(event_id, name).await?;
    state.hub.create_room(event_id, room.id);

    info!(room_id = %room.id, "Room created");
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// Request deletion of a room.
///
/// The room loop removes the persistent rows, notifies listeners with
/// `ROOM_DELETED` and stops; deletion is acknowledged before it has
/// happened.
#[utoipa::path(
    delete,
    path = "/events/{event_id}/rooms/{room_id}",
    tag = "Rooms",
    operation_id = "deleteRoom",
    summary = "Delete a room",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("room_id" = Uuid, Path, description = "Room ID")
    ),
    responses(
        (status = 202, description = "Deletion queued"),
        (status = 404, description = "Room not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Room queue full (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(%event_id, %room_id))]
pub async fn delete_room(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let room = state
        .hub
        .room(room_id)
        .ok_or_else(|| AppError::NotFound("Room not found or not active".into()))?;

    room.submit(RoomEvent::RoomDeleted { room_id })?;

    info!("Room deletion queued");
    Ok(StatusCode::ACCEPTED)
}
