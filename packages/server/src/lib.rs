pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod state;
pub mod store;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(handlers::events::list_events))
        .route(
            "/events/{event_id}/rooms",
            get(handlers::events::list_event_rooms).post(handlers::room::create_room),
        )
        .route(
            "/events/{event_id}/rooms/{room_id}",
            delete(handlers::room::delete_room),
        )
        .route(
            "/events/{event_id}/leaderboard",
            get(handlers::events::spectate_event),
        )
        .route(
            "/events/{event_id}/rooms/{room_id}/leaderboard",
            get(handlers::events::join_room),
        )
        .route(
            "/events/{event_id}/rooms/{room_id}/submit",
            post(handlers::submission::submit_solution),
        )
        .with_state(state)
}
