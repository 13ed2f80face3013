use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A programming problem. Immutable once published; `score` is the number
/// of points an accepted solution grants.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "code_problem")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub statement: String,
    pub difficulty: String,
    pub score: i32,

    #[sea_orm(has_many)]
    pub test_cases: HasMany<super::test_case::Entity>,
    #[sea_orm(has_many)]
    pub language_details: HasMany<super::language_detail::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
