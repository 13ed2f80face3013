use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use uuid::Uuid;

use common::SubmissionStatus;

use crate::entity::room_player::PlayerState;
use crate::entity::{
    code_problem, event, guild, guild_member, language, language_detail, room, room_player,
    submission, test_case,
};

use super::{GuildLeaderboardEntry, NewSubmission, Store, StoreError};

#[derive(Default)]
struct Inner {
    events: Vec<event::Model>,
    rooms: HashMap<Uuid, room::Model>,
    players: HashMap<(Uuid, Uuid), room_player::Model>,
    problems: HashMap<Uuid, code_problem::Model>,
    languages: Vec<language::Model>,
    details: HashMap<(Uuid, i32), language_detail::Model>,
    test_cases: Vec<test_case::Model>,
    submissions: HashMap<Uuid, submission::Model>,
    guilds: Vec<guild::Model>,
    guild_members: Vec<guild_member::Model>,
}

/// In-memory [`Store`] with the same observable semantics as [`PgStore`],
/// including the shared-place `RANK()` behavior of the leaderboard
/// recompute. Backs the integration tests and local development without a
/// database.
///
/// [`PgStore`]: super::PgStore
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, model: event::Model) {
        self.inner.lock().unwrap().events.push(model);
    }

    pub fn insert_room(&self, model: room::Model) {
        self.inner.lock().unwrap().rooms.insert(model.id, model);
    }

    pub fn insert_language(&self, model: language::Model) {
        self.inner.lock().unwrap().languages.push(model);
    }

    pub fn insert_problem(&self, model: code_problem::Model) {
        self.inner.lock().unwrap().problems.insert(model.id, model);
    }

    pub fn insert_language_detail(&self, model: language_detail::Model) {
        self.inner
            .lock()
            .unwrap()
            .details
            .insert((model.code_problem_id, model.language_id), model);
    }

    pub fn insert_test_case(&self, model: test_case::Model) {
        self.inner.lock().unwrap().test_cases.push(model);
    }

    pub fn insert_guild(&self, model: guild::Model) {
        self.inner.lock().unwrap().guilds.push(model);
    }

    pub fn insert_guild_member(&self, model: guild_member::Model) {
        self.inner.lock().unwrap().guild_members.push(model);
    }

    pub fn insert_room_player(&self, model: room_player::Model) {
        self.inner
            .lock()
            .unwrap()
            .players
            .insert((model.room_id, model.user_id), model);
    }

    /// Snapshot of one submission row.
    pub fn submission(&self, id: Uuid) -> Option<submission::Model> {
        self.inner.lock().unwrap().submissions.get(&id).cloned()
    }

    /// Snapshot of all submission rows, oldest first.
    pub fn submissions(&self) -> Vec<submission::Model> {
        let mut rows: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .submissions
            .values()
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.submitted_at);
        rows
    }

    /// Snapshot of one room player row.
    pub fn player(&self, room_id: Uuid, user_id: Uuid) -> Option<room_player::Model> {
        self.inner
            .lock()
            .unwrap()
            .players
            .get(&(room_id, user_id))
            .cloned()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_events(&self, limit: u64, offset: u64) -> Result<Vec<event::Model>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events = inner.events.clone();
        events.sort_by_key(|e| e.started_at);
        Ok(events
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_event(&self, event_id: Uuid) -> Result<event::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_rooms_by_event(&self, event_id: Uuid) -> Result<Vec<room::Model>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rooms: Vec<_> = inner
            .rooms
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    async fn get_room(&self, room_id: Uuid) -> Result<room::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_room(&self, event_id: Uuid, name: &str) -> Result<room::Model, StoreError> {
        let model = room::Model {
            id: Uuid::new_v4(),
            event_id,
            name: name.to_string(),
        };
        self.inner
            .lock()
            .unwrap()
            .rooms
            .insert(model.id, model.clone());
        Ok(model)
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.players.retain(|(rid, _), _| *rid != room_id);
        inner.rooms.remove(&room_id);
        Ok(())
    }

    async fn get_language_by_name(&self, name: &str) -> Result<language::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .languages
            .iter()
            .find(|l| l.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_problem(&self, problem_id: Uuid) -> Result<code_problem::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .problems
            .get(&problem_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_problem_language_detail(
        &self,
        problem_id: Uuid,
        language_id: i32,
    ) -> Result<language_detail::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .details
            .get(&(problem_id, language_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_test_cases_by_problem(
        &self,
        problem_id: Uuid,
    ) -> Result<Vec<test_case::Model>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut cases: Vec<_> = inner
            .test_cases
            .iter()
            .filter(|tc| tc.code_problem_id == problem_id)
            .cloned()
            .collect();
        cases.sort_by(|a, b| a.is_hidden.cmp(&b.is_hidden).then(a.id.cmp(&b.id)));
        Ok(cases)
    }

    async fn create_submission(
        &self,
        new: NewSubmission,
    ) -> Result<submission::Model, StoreError> {
        let model = submission::Model {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            room_id: new.room_id,
            code_problem_id: new.code_problem_id,
            language_id: new.language_id,
            code_submitted: new.code_submitted,
            status: SubmissionStatus::Pending,
            execution_time_ms: None,
            submitted_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .submissions
            .insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_submission_status(
        &self,
        submission_id: Uuid,
        status: SubmissionStatus,
        execution_time_ms: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .submissions
            .get_mut(&submission_id)
            .ok_or(StoreError::NotFound)?;
        row.status = status;
        row.execution_time_ms = execution_time_ms;
        Ok(())
    }

    async fn create_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: &str,
    ) -> Result<room_player::Model, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.players.contains_key(&(room_id, user_id)) {
            return Err(StoreError::Database(DbErr::Custom(
                "room player already exists".into(),
            )));
        }
        let model = room_player::Model {
            room_id,
            user_id,
            username: username.to_string(),
            score: 0,
            place: None,
            state: PlayerState::Present,
            joined_at: Utc::now(),
        };
        inner.players.insert((room_id, user_id), model.clone());
        Ok(model)
    }

    async fn get_room_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<room_player::Model, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .players
            .get(&(room_id, user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_room_players(
        &self,
        room_id: Uuid,
    ) -> Result<Vec<room_player::Model>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut players: Vec<_> = inner
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.joined_at.cmp(&b.joined_at)));
        Ok(players)
    }

    async fn delete_room_player(&self, room_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .players
            .remove(&(room_id, user_id))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn add_room_player_score(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        points: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let player = inner
            .players
            .get_mut(&(room_id, user_id))
            .ok_or(StoreError::NotFound)?;
        player.score += points;
        Ok(())
    }

    async fn calculate_room_leaderboard(&self, room_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let mut ranked: Vec<(Uuid, i32, DateTime<Utc>)> = inner
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .map(|p| (p.user_id, p.score, p.joined_at))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        // RANK() semantics: ties share a place, the next place skips.
        let mut places: HashMap<Uuid, i32> = HashMap::new();
        let mut prev_key: Option<(i32, DateTime<Utc>)> = None;
        let mut prev_place = 0;
        for (idx, (user_id, score, joined_at)) in ranked.iter().enumerate() {
            let place = match prev_key {
                Some(key) if key == (*score, *joined_at) => prev_place,
                _ => idx as i32 + 1,
            };
            prev_key = Some((*score, *joined_at));
            prev_place = place;
            places.insert(*user_id, place);
        }

        for player in inner.players.values_mut().filter(|p| p.room_id == room_id) {
            player.place = places.get(&player.user_id).copied();
        }

        Ok(())
    }

    async fn get_guild_leaderboard_by_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<GuildLeaderboardEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();

        let mut user_scores: HashMap<Uuid, i64> = HashMap::new();
        for player in inner.players.values() {
            if inner
                .rooms
                .get(&player.room_id)
                .is_some_and(|r| r.event_id == event_id)
            {
                *user_scores.entry(player.user_id).or_default() += player.score as i64;
            }
        }

        let mut totals: Vec<(Uuid, String, i64)> = Vec::new();
        for g in &inner.guilds {
            let mut total = 0i64;
            let mut seen = false;
            for member in inner.guild_members.iter().filter(|m| m.guild_id == g.id) {
                if let Some(score) = user_scores.get(&member.user_id) {
                    total += score;
                    seen = true;
                }
            }
            if seen {
                totals.push((g.id, g.name.clone(), total));
            }
        }
        totals.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));

        let mut entries = Vec::with_capacity(totals.len());
        let mut prev_total: Option<i64> = None;
        let mut prev_place = 0;
        for (idx, (guild_id, guild_name, total_score)) in totals.into_iter().enumerate() {
            let place = match prev_total {
                Some(prev) if prev == total_score => prev_place,
                _ => idx as i64 + 1,
            };
            prev_total = Some(total_score);
            prev_place = place;
            entries.push(GuildLeaderboardEntry {
                guild_id,
                guild_name,
                total_score,
                place,
            });
        }

        Ok(entries)
    }
}
