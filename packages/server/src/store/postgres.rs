use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, ExprTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};
use uuid::Uuid;

use common::SubmissionStatus;

use crate::entity::room_player::PlayerState;
use crate::entity::{
    code_problem, event, language, language_detail, room, room_player, submission, test_case,
};

use super::{GuildLeaderboardEntry, NewSubmission, Store, StoreError};

/// [`Store`] over a Postgres connection.
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn required<T>(found: Option<T>) -> Result<T, StoreError> {
    found.ok_or(StoreError::NotFound)
}

fn map_update_err(err: DbErr) -> StoreError {
    match err {
        DbErr::RecordNotUpdated => StoreError::NotFound,
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_events(&self, limit: u64, offset: u64) -> Result<Vec<event::Model>, StoreError> {
        Ok(event::Entity::find()
            .order_by_asc(event::Column::StartedAt)
            .offset(Some(offset))
            .limit(Some(limit))
            .all(&self.db)
            .await?)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<event::Model, StoreError> {
        required(event::Entity::find_by_id(event_id).one(&self.db).await?)
    }

    async fn get_rooms_by_event(&self, event_id: Uuid) -> Result<Vec<room::Model>, StoreError> {
        Ok(room::Entity::find()
            .filter(room::Column::EventId.eq(event_id))
            .order_by_asc(room::Column::Name)
            .all(&self.db)
            .await?)
    }

    async fn get_room(&self, room_id: Uuid) -> Result<room::Model, StoreError> {
        required(room::Entity::find_by_id(room_id).one(&self.db).await?)
    }

    async fn create_room(&self, event_id: Uuid, name: &str) -> Result<room::Model, StoreError> {
        let model = room::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(event_id),
            name: Set(name.to_string()),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<(), StoreError> {
        room_player::Entity::delete_many()
            .filter(room_player::Column::RoomId.eq(room_id))
            .exec(&self.db)
            .await?;
        room::Entity::delete_by_id(room_id).exec(&self.db).await?;
        Ok(())
    }

    async fn get_language_by_name(&self, name: &str) -> Result<language::Model, StoreError> {
        required(
            language::Entity::find()
                .filter(language::Column::Name.eq(name))
                .one(&self.db)
                .await?,
        )
    }

    async fn get_problem(&self, problem_id: Uuid) -> Result<code_problem::Model, StoreError> {
        required(
            code_problem::Entity::find_by_id(problem_id)
                .one(&self.db)
                .await?,
        )
    }

    async fn get_problem_language_detail(
        &self,
        problem_id: Uuid,
        language_id: i32,
    ) -> Result<language_detail::Model, StoreError> {
        required(
            language_detail::Entity::find_by_id((problem_id, language_id))
                .one(&self.db)
                .await?,
        )
    }

    async fn get_test_cases_by_problem(
        &self,
        problem_id: Uuid,
    ) -> Result<Vec<test_case::Model>, StoreError> {
        Ok(test_case::Entity::find()
            .filter(test_case::Column::CodeProblemId.eq(problem_id))
            .order_by_asc(test_case::Column::IsHidden)
            .order_by_asc(test_case::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn create_submission(
        &self,
        new: NewSubmission,
    ) -> Result<submission::Model, StoreError> {
        let model = submission::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            room_id: Set(new.room_id),
            code_problem_id: Set(new.code_problem_id),
            language_id: Set(new.language_id),
            code_submitted: Set(new.code_submitted),
            status: Set(SubmissionStatus::Pending),
            execution_time_ms: Set(None),
            submitted_at: Set(Utc::now()),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn update_submission_status(
        &self,
        submission_id: Uuid,
        status: SubmissionStatus,
        execution_time_ms: Option<i64>,
    ) -> Result<(), StoreError> {
        let model = submission::ActiveModel {
            id: Set(submission_id),
            status: Set(status),
            execution_time_ms: Set(execution_time_ms),
            ..Default::default()
        };
        model.update(&self.db).await.map_err(map_update_err)?;
        Ok(())
    }

    async fn create_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<room_player::Model, StoreError> {
        let model = room_player::ActiveModel {
            room_id: Set(room_id),
            user_id: Set(user_id),
            username: Set(username.to_string()),
            score: Set(0),
            place: Set(None),
            state: Set(PlayerState::Present),
            joined_at: Set(Utc::now()),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn get_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<room_player::Model, StoreError> {
        required(
            room_player::Entity::find_by_id((room_id, user_id))
                .one(&self.db)
                .await?,
        )
    }

    async fn get_room_players(
        &self,
        room_id: Uuid,
    ) -> Result<Vec<room_player::Model>, StoreError> {
        Ok(room_player::Entity::find()
            .filter(room_player::Column::RoomId.eq(room_id))
            .order_by_desc(room_player::Column::Score)
            .order_by_asc(room_player::Column::JoinedAt)
            .all(&self.db)
            .await?)
    }

    async fn delete_room_player(&self, room_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let res = room_player::Entity::delete_by_id((room_id, user_id))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_room_player_score(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> Result<(), StoreError> {
        let res = room_player::Entity::update_many()
            .col_expr(
                room_player::Column::Score,
                Expr::col(room_player::Column::Score).add(points),
            )
            .filter(room_player::Column::RoomId.eq(room_id))
            .filter(room_player::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn calculate_room_leaderboard(&self, room_id: Uuid) -> Result<(), StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE room_player AS rp
            SET place = ranked.place
            FROM (
                SELECT user_id,
                       RANK() OVER (ORDER BY score DESC, joined_at ASC) AS place
                FROM room_player
                WHERE room_id = $1
            ) AS ranked
            WHERE rp.room_id = $1 AND rp.user_id = ranked.user_id
            "#,
            [room_id.into()],
        );
        self.db.execute_raw(stmt).await?;
        Ok(())
    }

    async fn get_guild_leaderboard_by_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<GuildLeaderboardEntry>, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT g.id AS guild_id,
                   g.name AS guild_name,
                   COALESCE(SUM(rp.score), 0)::bigint AS total_score,
                   RANK() OVER (ORDER BY COALESCE(SUM(rp.score), 0) DESC) AS place
            FROM guild AS g
            JOIN guild_member AS gm ON gm.guild_id = g.id
            JOIN room_player AS rp ON rp.user_id = gm.user_id
            JOIN room AS r ON r.id = rp.room_id
            WHERE r.event_id = $1
            GROUP BY g.id, g.name
            ORDER BY total_score DESC, g.name ASC
            "#,
            [event_id.into()],
        );
        Ok(GuildLeaderboardEntry::find_by_statement(stmt)
            .all(&self.db)
            .await?)
    }
}
