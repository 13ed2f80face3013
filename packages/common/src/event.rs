use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tag of a server-sent event pushed to live room/event listeners.
///
/// Serializes to the SCREAMING_SNAKE_CASE wire tag (`PLAYER_JOINED`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    PlayerJoined,
    PlayerLeft,
    RoomDeleted,
    CorrectSolutionSubmitted,
    WrongSolutionSubmitted,
    LeaderboardUpdated,
    GuildLeaderboardUpdated,
    CompilationTest,
}

impl EventType {
    /// The wire tag written on the `event:` line of the SSE frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerJoined => "PLAYER_JOINED",
            Self::PlayerLeft => "PLAYER_LEFT",
            Self::RoomDeleted => "ROOM_DELETED",
            Self::CorrectSolutionSubmitted => "CORRECT_SOLUTION_SUBMITTED",
            Self::WrongSolutionSubmitted => "WRONG_SOLUTION_SUBMITTED",
            Self::LeaderboardUpdated => "LEADERBOARD_UPDATED",
            Self::GuildLeaderboardUpdated => "GUILD_LEADERBOARD_UPDATED",
            Self::CompilationTest => "COMPILATION_TEST",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope delivered to a single listener channel.
///
/// `data` is an already-serialized JSON payload; producers build it with
/// `serde_json::json!` or `serde_json::to_value`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseEvent {
    pub event_type: EventType,
    pub data: serde_json::Value,
}

impl SseEvent {
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self { event_type, data }
    }
}

/// Outcome classification of a judged solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JudgeStatus {
    Accepted,
    WrongAnswer,
    RuntimeError,
    CompilationError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
}

impl JudgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::RuntimeError => "Runtime Error",
            Self::CompilationError => "Compilation Error",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::MemoryLimitExceeded => "Memory Limit Exceeded",
        }
    }
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A solution submitted into a room, before judging.
///
/// `submission_id` is assigned once the pending submission row has been
/// persisted by the room loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolutionSubmitted {
    pub player_id: Uuid,
    pub event_id: Uuid,
    pub room_id: Uuid,
    pub problem_id: Uuid,
    pub code: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
    pub submission_id: Option<Uuid>,
}

/// The judged outcome of a [`SolutionSubmitted`], re-enqueued on the
/// originating room's queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolutionResult {
    pub submitted: SolutionSubmitted,
    pub score: i32,
    pub status: JudgeStatus,
    pub message: String,
    pub execution_time_ms: Option<i64>,
}

/// Everything that can happen inside a room.
///
/// A room's queue carries exactly these variants; the room loop is their
/// single consumer.
#[derive(Clone, Debug)]
pub enum RoomEvent {
    SolutionSubmitted(SolutionSubmitted),
    SolutionResult(SolutionResult),
    PlayerJoined { player_id: Uuid, room_id: Uuid },
    PlayerLeft { player_id: Uuid, room_id: Uuid },
    RoomDeleted { room_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_tags() {
        assert_eq!(EventType::PlayerJoined.as_str(), "PLAYER_JOINED");
        assert_eq!(
            EventType::CorrectSolutionSubmitted.as_str(),
            "CORRECT_SOLUTION_SUBMITTED"
        );
        assert_eq!(
            EventType::GuildLeaderboardUpdated.as_str(),
            "GUILD_LEADERBOARD_UPDATED"
        );
    }

    #[test]
    fn test_event_type_serde_matches_wire_tag() {
        for et in [
            EventType::PlayerJoined,
            EventType::PlayerLeft,
            EventType::RoomDeleted,
            EventType::CorrectSolutionSubmitted,
            EventType::WrongSolutionSubmitted,
            EventType::LeaderboardUpdated,
            EventType::GuildLeaderboardUpdated,
            EventType::CompilationTest,
        ] {
            let json = serde_json::to_string(&et).unwrap();
            assert_eq!(json, format!("\"{}\"", et.as_str()));
        }
    }

    #[test]
    fn test_sse_event_round_trip() {
        let event = SseEvent::new(
            EventType::PlayerJoined,
            serde_json::json!({ "player_id": "123", "room_id": "456" }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SseEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, EventType::PlayerJoined);
        assert_eq!(parsed.data["player_id"], "123");
    }

    #[test]
    fn test_judge_status_display() {
        assert_eq!(JudgeStatus::WrongAnswer.to_string(), "Wrong Answer");
        assert_eq!(
            JudgeStatus::TimeLimitExceeded.to_string(),
            "Time Limit Exceeded"
        );
    }
}
