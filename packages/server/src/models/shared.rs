use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Maximum rows to return (1..=100). Default: 10.
    pub limit: Option<u64>,
    /// Rows to skip. Default: 0.
    pub offset: Option<u64>,
}

/// Identifies the player behind a live connection or submission.
///
/// Carried as a query parameter; in production deployments the gateway
/// resolves it from the authenticated principal instead.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PlayerQuery {
    pub player_id: Uuid,
}

/// Optional spectator identity for event-level streams.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SpectatorQuery {
    pub player_id: Option<Uuid>,
}
