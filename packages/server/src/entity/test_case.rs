use common::TestCaseData;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_case")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub code_problem_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub input: String,
    #[sea_orm(column_type = "Text")]
    pub expected_output: String,
    pub is_hidden: bool,

    #[sea_orm(belongs_to, from = "code_problem_id", to = "id")]
    pub code_problem: HasOne<super::code_problem::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TestCaseData {
    fn from(model: Model) -> Self {
        TestCaseData {
            id: model.id,
            input: model.input,
            expected_output: model.expected_output,
            is_hidden: model.is_hidden,
        }
    }
}
