use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::room;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
}

impl From<room::Model> for RoomResponse {
    fn from(model: room::Model) -> Self {
        Self {
            id: model.id,
            event_id: model.event_id,
            name: model.name,
        }
    }
}
