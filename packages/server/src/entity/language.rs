use common::LanguageSpec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Execution recipe for one language. `compile_cmd` is empty for
/// interpreted languages; both command columns may carry the
/// `{{temp_file_dir}}` / `{{temp_file_name}}` placeholders.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "language")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,
    pub compile_cmd: String,
    pub run_cmd: String,
    pub temp_file_dir: String,
    pub temp_file_name: String,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LanguageSpec {
    fn from(model: Model) -> Self {
        LanguageSpec {
            id: model.id,
            name: model.name,
            compile_cmd: model.compile_cmd,
            run_cmd: model.run_cmd,
            temp_file_dir: model.temp_file_dir,
            temp_file_name: model.temp_file_name,
        }
    }
}
