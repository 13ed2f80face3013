use common::SubmissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One submitted solution. `status` is written exactly twice: `pending`
/// on insert and one terminal status on verdict.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,
    pub room_id: Uuid,
    pub code_problem_id: Uuid,
    pub language_id: i32,

    #[sea_orm(column_type = "Text")]
    pub code_submitted: String,
    pub status: SubmissionStatus,
    pub execution_time_ms: Option<i64>,
    pub submitted_at: DateTimeUtc,

    #[sea_orm(belongs_to, from = "code_problem_id", to = "id")]
    pub code_problem: HasOne<super::code_problem::Entity>,
    #[sea_orm(belongs_to, from = "language_id", to = "id")]
    pub language: HasOne<super::language::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
