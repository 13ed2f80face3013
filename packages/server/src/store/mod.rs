//! Narrow transactional contract between the hubs and persistence.

mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use sea_orm::FromQueryResult;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use common::SubmissionStatus;

use crate::entity::{
    code_problem, event, language, language_detail, room, room_player, submission, test_case,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The "no rows" sentinel.
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// A store call exceeded the configured query timeout.
    #[error("store operation timed out")]
    Timeout,
}

/// Fields of a new pending submission row.
#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub code_problem_id: Uuid,
    pub language_id: i32,
    pub code_submitted: String,
}

/// One row of an event's cross-room guild leaderboard.
#[derive(Clone, Debug, Serialize, FromQueryResult)]
pub struct GuildLeaderboardEntry {
    pub guild_id: Uuid,
    pub guild_name: String,
    pub total_score: i64,
    pub place: i64,
}

/// The operations the hubs consume. All persistent invariants (score
/// adds, rank recompute, submission lifecycle) are arbitrated here; the
/// room loop's single-consumer discipline is the serialization surface on
/// top.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_events(&self, limit: u64, offset: u64) -> Result<Vec<event::Model>, StoreError>;
    async fn get_event(&self, event_id: Uuid) -> Result<event::Model, StoreError>;
    async fn get_rooms_by_event(&self, event_id: Uuid) -> Result<Vec<room::Model>, StoreError>;
    async fn get_room(&self, room_id: Uuid) -> Result<room::Model, StoreError>;
    async fn create_room(&self, event_id: Uuid, name: &str) -> Result<room::Model, StoreError>;
    /// Removes the room and its player rows.
    async fn delete_room(&self, room_id: Uuid) -> Result<(), StoreError>;

    async fn get_language_by_name(&self, name: &str) -> Result<language::Model, StoreError>;
    async fn get_problem(&self, problem_id: Uuid) -> Result<code_problem::Model, StoreError>;
    async fn get_problem_language_detail(
        &self,
        problem_id: Uuid,
        language_id: i32,
    ) -> Result<language_detail::Model, StoreError>;
    /// Test cases ordered by (is_hidden ascending, id).
    async fn get_test_cases_by_problem(
        &self,
        problem_id: Uuid,
    ) -> Result<Vec<test_case::Model>, StoreError>;

    async fn create_submission(
        &self,
        new: NewSubmission,
    ) -> Result<submission::Model, StoreError>;
    async fn update_submission_status(
        &self,
        submission_id: Uuid,
        status: SubmissionStatus,
        execution_time_ms: Option<i64>,
    ) -> Result<(), StoreError>;

    async fn create_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<room_player::Model, StoreError>;
    async fn get_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<room_player::Model, StoreError>;
    /// Players ordered by (score descending, joined_at ascending).
    async fn get_room_players(
        &self,
        room_id: Uuid,
    ) -> Result<Vec<room_player::Model>, StoreError>;
    async fn delete_room_player(&self, room_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    /// Atomic `score = score + points`.
    async fn add_room_player_score(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> Result<(), StoreError>;
    /// Atomic rank recompute: `RANK()` over (score desc, joined_at asc),
    /// so ties share a place and the next place skips.
    async fn calculate_room_leaderboard(&self, room_id: Uuid) -> Result<(), StoreError>;

    async fn get_guild_leaderboard_by_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<GuildLeaderboardEntry>, StoreError>;
}
