use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};

/// Presence of a player inside one room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "disconnected")]
    Disconnected,
    #[sea_orm(string_value = "left")]
    Left,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// One player's standing in a room. `place` is derived: it is recomputed
/// atomically after any score-changing event and is `NULL` until the
/// first recompute.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "room_player")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub room_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    pub username: String,
    pub score: i32,
    pub place: Option<i32>,
    pub state: PlayerState,
    pub joined_at: DateTimeUtc,

    #[sea_orm(belongs_to, from = "room_id", to = "id")]
    pub room: HasOne<super::room::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
