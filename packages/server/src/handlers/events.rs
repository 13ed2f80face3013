use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, instrument};
use uuid::Uuid;

use common::{RoomEvent, SseEvent};

use crate::entity::{event, room};
use crate::error::{AppError, ErrorBody};
use crate::models::shared::{ListQuery, PlayerQuery, SpectatorQuery};
use crate::state::AppState;

/// List events.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events",
    params(ListQuery),
    responses(
        (status = 200, description = "Events ordered by start time"),
    ),
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<event::Model>>, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    let events = state.store.get_events(limit, offset).await?;
    Ok(Json(events))
}

/// List the rooms of an event.
#[utoipa::path(
    get,
    path = "/events/{event_id}/rooms",
    tag = "Events",
    operation_id = "listEventRooms",
    summary = "List an event's rooms",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Rooms of the event"),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
pub async fn list_event_rooms(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<room::Model>>, AppError> {
    let _ = state.store.get_event(event_id).await?;
    let rooms = state.store.get_rooms_by_event(event_id).await?;
    Ok(Json(rooms))
}

/// SSE stream of a room's live events.
///
/// Registers the caller as a room listener and reports the join to the
/// room loop; the stream then carries every SSE event dispatched to the
/// room until the client disconnects, at which point the listener is
/// deregistered and the leave is reported.
#[instrument(skip(state), fields(%event_id, %room_id))]
pub async fn join_room(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PlayerQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let room = state
        .hub
        .room(room_id)
        .ok_or_else(|| AppError::NotFound("Room not found or not active".into()))?;

    let player_id = query.player_id;
    let (rx, guard) = room.subscribe(player_id);

    // the guard deregisters if the join cannot be queued
    room.submit(RoomEvent::PlayerJoined { player_id, room_id })?;

    info!(%player_id, "SSE connection established");

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _registered = &guard;
        Ok(sse_frame(event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// SSE stream of an event's guild leaderboard for spectators.
#[instrument(skip(state), fields(%event_id))]
pub async fn spectate_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<SpectatorQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let _ = state.store.get_event(event_id).await?;

    let listener_id = query.player_id.unwrap_or_else(Uuid::new_v4);
    let (rx, guard) = state.hub.subscribe_event(event_id, listener_id);

    // push a snapshot to the new spectator instead of making them wait
    // for the next accepted solution
    state.hub.request_guild_refresh(event_id);

    info!(%listener_id, "Spectator SSE connection established");

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _registered = &guard;
        Ok(sse_frame(event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Encodes an [`SseEvent`] as a wire frame (`event:` tag plus JSON
/// `data:` payload).
fn sse_frame(event: SseEvent) -> Event {
    match Event::default()
        .event(event.event_type.as_str())
        .json_data(&event.data)
    {
        Ok(frame) => frame,
        Err(err) => {
            error!(error = %err, event_type = %event.event_type, "Failed to encode SSE payload");
            Event::default().event(event.event_type.as_str()).data("{}")
        }
    }
}
