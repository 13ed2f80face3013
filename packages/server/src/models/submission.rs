use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for submitting a solution into a room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitSolutionRequest {
    pub problem_id: Uuid,
    pub code: String,
    /// Language name or alias (e.g., "go", "golang", "py").
    pub language: String,
}

/// Acknowledgement that a submission entered the room's queue. The
/// verdict arrives on the SSE stream.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitSolutionResponse {
    pub room_id: Uuid,
    pub problem_id: Uuid,
    pub language: String,
    pub queued: bool,
}
