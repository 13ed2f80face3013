use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Administrative container above rooms. Owned by admin tooling; the hubs
/// only read it.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub event_type: String,

    pub started_at: DateTimeUtc,
    pub ended_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub rooms: HasMany<super::room::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
