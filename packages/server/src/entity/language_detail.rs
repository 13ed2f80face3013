use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-language material of a problem: the solution stub shown to the
/// player and the driver template the builder injects their code into.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "code_problem_language_detail")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code_problem_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub language_id: i32,

    #[sea_orm(column_type = "Text")]
    pub solution_stub: String,
    /// Contains the language's user-code placeholder and, for compiled
    /// languages, the imports placeholder.
    #[sea_orm(column_type = "Text")]
    pub driver_code: String,
    pub time_constraint_ms: i32,
    pub space_constraint_mb: i32,

    #[sea_orm(belongs_to, from = "code_problem_id", to = "id")]
    pub code_problem: HasOne<super::code_problem::Entity>,
    #[sea_orm(belongs_to, from = "language_id", to = "id")]
    pub language: HasOne<super::language::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
