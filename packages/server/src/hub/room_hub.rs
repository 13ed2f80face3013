use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{
    EventType, JudgeStatus, LanguageSpec, RoomEvent, SolutionResult, SolutionSubmitted, SseEvent,
    SubmissionStatus, TestCaseData,
};
use engine::languages::normalize_language;
use engine::{BuildError, CodeBuilder, ExecuteError, JobError, JobResult, WorkerPool};

use crate::config::HubConfig;
use crate::entity::language;
use crate::store::{NewSubmission, Store, StoreError};

/// Error returned to producers putting an event on a room's queue.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The queue is at capacity. Transient; surfaces to clients as 503.
    #[error("room queue is full")]
    QueueFull,
    /// The room loop has stopped; callers remove the room.
    #[error("room is closed")]
    Closed,
}

/// One row of a room's leaderboard as pushed to listeners.
#[derive(Clone, Debug, Serialize)]
pub struct RoomLeaderboardEntry {
    pub player_name: String,
    pub score: i32,
    pub place: Option<i32>,
}

/// Serialization point for everything that happens inside one room.
///
/// All state changes go through the bounded `events` queue, whose receiver
/// is owned by the single loop task, so single-consumer is enforced by
/// ownership. Producers only ever `try_send`; the queue is the system's
/// primary backpressure surface.
pub struct RoomHub {
    pub room_id: Uuid,
    pub event_id: Uuid,
    events: mpsc::Sender<RoomEvent>,
    listeners: RwLock<HashMap<Uuid, mpsc::Sender<SseEvent>>>,
    store: Arc<dyn Store>,
    builder: Arc<CodeBuilder>,
    pool: Arc<WorkerPool>,
    guild_updates: mpsc::Sender<Uuid>,
    listener_buffer: usize,
    query_timeout: Duration,
}

/// Removes the listener registration when the subscriber goes away,
/// however it goes away, and reports the player gone to the room loop.
pub struct ListenerGuard {
    hub: Arc<RoomHub>,
    player_id: Uuid,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.hub.remove_listener(self.player_id);
        // best effort: a full queue drops the PlayerLeft, the listener is
        // already gone either way
        let _ = self.hub.submit(RoomEvent::PlayerLeft {
            player_id: self.player_id,
            room_id: self.hub.room_id,
        });
    }
}

impl RoomHub {
    pub(crate) fn new(
        event_id: Uuid,
        room_id: Uuid,
        store: Arc<dyn Store>,
        builder: Arc<CodeBuilder>,
        pool: Arc<WorkerPool>,
        guild_updates: mpsc::Sender<Uuid>,
        config: &HubConfig,
    ) -> (Arc<Self>, mpsc::Receiver<RoomEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.room_queue_capacity);
        let hub = Arc::new(Self {
            room_id,
            event_id,
            events: events_tx,
            listeners: RwLock::new(HashMap::new()),
            store,
            builder,
            pool,
            guild_updates,
            listener_buffer: config.listener_buffer,
            query_timeout: config.query_timeout(),
        });
        (hub, events_rx)
    }

    /// Non-blocking enqueue onto the room's queue.
    pub fn submit(&self, event: RoomEvent) -> Result<(), SubmitError> {
        self.events.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(event) => {
                warn!(room_id = %self.room_id, ?event, "Room queue is full, dropping event");
                SubmitError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Registers a buffered delivery channel for `player_id` and couples
    /// its lifetime to the returned guard.
    pub fn subscribe(self: &Arc<Self>, player_id: Uuid) -> (mpsc::Receiver<SseEvent>, ListenerGuard) {
        let (tx, rx) = mpsc::channel(self.listener_buffer);
        self.listeners.write().unwrap().insert(player_id, tx);
        (
            rx,
            ListenerGuard {
                hub: self.clone(),
                player_id,
            },
        )
    }

    pub fn remove_listener(&self, player_id: Uuid) {
        self.listeners.write().unwrap().remove(&player_id);
    }

    /// Consumes the room's events until the room is deleted. Exactly one
    /// task runs this for the lifetime of the room.
    pub(crate) async fn run(self: Arc<Self>, mut events: mpsc::Receiver<RoomEvent>) {
        info!(room_id = %self.room_id, event_id = %self.event_id, "Room loop started");

        while let Some(event) = events.recv().await {
            match event {
                RoomEvent::SolutionSubmitted(e) => {
                    if let Err(err) = self.process_solution_submitted(e).await {
                        error!(room_id = %self.room_id, error = %err, "Failed to process solution submitted event");
                    }
                }
                RoomEvent::SolutionResult(e) => {
                    if let Err(err) = self.process_solution_result(e).await {
                        error!(room_id = %self.room_id, error = %err, "Failed to process solution result event");
                    }
                }
                RoomEvent::PlayerJoined { player_id, .. } => {
                    if let Err(err) = self.process_player_joined(player_id).await {
                        error!(room_id = %self.room_id, error = %err, "Failed to process player joined event");
                    }
                }
                RoomEvent::PlayerLeft { player_id, .. } => {
                    if let Err(err) = self.process_player_left(player_id).await {
                        error!(room_id = %self.room_id, error = %err, "Failed to process player left event");
                    }
                }
                RoomEvent::RoomDeleted { .. } => {
                    self.process_room_deleted().await;
                    break;
                }
            }
        }

        info!(room_id = %self.room_id, "Room loop stopped");
    }

    async fn store_call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Snapshot the listeners under the read lock, then try-send outside
    /// it: a slow consumer is skipped, never waited on.
    pub(crate) fn dispatch_event(&self, event: SseEvent) {
        let listeners: Vec<(Uuid, mpsc::Sender<SseEvent>)> = {
            let guard = self.listeners.read().unwrap();
            guard.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        debug!(
            room_id = %self.room_id,
            listeners = listeners.len(),
            event_type = %event.event_type,
            "Dispatching event"
        );

        for (player_id, tx) in listeners {
            if tx.try_send(event.clone()).is_err() {
                warn!(
                    room_id = %self.room_id,
                    %player_id,
                    "Failed to send event to listener, channel full or closed"
                );
            }
        }
    }

    fn dispatch_event_to_player(&self, event: SseEvent, player_id: Uuid) {
        let listener = self.listeners.read().unwrap().get(&player_id).cloned();
        match listener {
            Some(tx) => {
                if tx.try_send(event).is_err() {
                    warn!(
                        room_id = %self.room_id,
                        %player_id,
                        "Failed to send event to listener, channel full or closed"
                    );
                }
            }
            None => warn!(room_id = %self.room_id, %player_id, "Listener not found"),
        }
    }

    async fn process_player_joined(&self, player_id: Uuid) -> anyhow::Result<()> {
        match self
            .store_call(self.store.get_room_player(self.room_id, player_id))
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                info!(%player_id, room_id = %self.room_id, "Player not in room, adding");
                let username = format!("player-{player_id}");
                self.store_call(self.store.create_room_player(
                    self.room_id,
                    player_id,
                    &username,
                ))
                .await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.recalculate_leaderboard().await;

        self.dispatch_event(SseEvent::new(
            EventType::PlayerJoined,
            json!({ "player_id": player_id, "room_id": self.room_id }),
        ));
        self.dispatch_leaderboard().await;

        Ok(())
    }

    async fn process_player_left(&self, player_id: Uuid) -> anyhow::Result<()> {
        match self
            .store_call(self.store.delete_room_player(self.room_id, player_id))
            .await
        {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(err) => {
                error!(room_id = %self.room_id, %player_id, error = %err, "Failed to remove player from room");
            }
        }

        self.recalculate_leaderboard().await;

        self.dispatch_event(SseEvent::new(
            EventType::PlayerLeft,
            json!({ "player_id": player_id, "room_id": self.room_id }),
        ));
        self.dispatch_leaderboard().await;

        Ok(())
    }

    async fn process_solution_submitted(&self, mut event: SolutionSubmitted) -> anyhow::Result<()> {
        let Some(canonical) = normalize_language(&event.language) else {
            warn!(language = %event.language, "Unknown language on submission, dropping");
            anyhow::bail!("language not found: {}", event.language);
        };

        let language = self
            .store_call(self.store.get_language_by_name(canonical))
            .await?;

        let submission = self
            .store_call(self.store.create_submission(NewSubmission {
                user_id: event.player_id,
                room_id: event.room_id,
                code_problem_id: event.problem_id,
                language_id: language.id,
                code_submitted: event.code.clone(),
            }))
            .await?;
        event.submission_id = Some(submission.id);

        let result = self.evaluate(&event, language).await;

        if self.submit(RoomEvent::SolutionResult(result.clone())).is_err() {
            // Re-enqueueing can fail when the queue filled up behind us;
            // handle the result inline so the submission still finalizes.
            warn!(room_id = %self.room_id, "Could not re-enqueue solution result, processing inline");
            self.process_solution_result(result).await?;
        }

        Ok(())
    }

    /// Builds and runs the submission, turning every outcome, including
    /// infrastructure failures, into a [`SolutionResult`] so the
    /// submission row always reaches a terminal status.
    async fn evaluate(&self, event: &SolutionSubmitted, language: language::Model) -> SolutionResult {
        let detail = match self
            .store_call(
                self.store
                    .get_problem_language_detail(event.problem_id, language.id),
            )
            .await
        {
            Ok(detail) => detail,
            Err(err) => {
                error!(problem_id = %event.problem_id, error = %err, "Failed to load problem language detail");
                return failure_result(event, JudgeStatus::RuntimeError, "Problem details are unavailable.");
            }
        };

        let problem = match self.store_call(self.store.get_problem(event.problem_id)).await {
            Ok(problem) => problem,
            Err(err) => {
                error!(problem_id = %event.problem_id, error = %err, "Failed to load problem");
                return failure_result(event, JudgeStatus::RuntimeError, "Problem details are unavailable.");
            }
        };

        let test_cases = match self
            .store_call(self.store.get_test_cases_by_problem(event.problem_id))
            .await
        {
            Ok(cases) => cases,
            Err(err) => {
                error!(problem_id = %event.problem_id, error = %err, "Failed to load test cases");
                return failure_result(event, JudgeStatus::RuntimeError, "Test cases are unavailable.");
            }
        };

        let final_code = match self
            .builder
            .build(&language.name, &detail.driver_code, &event.code)
        {
            Ok(code) => code,
            Err(BuildError::Parse) => {
                return failure_result(event, JudgeStatus::CompilationError, "Wrong syntax.");
            }
            Err(err) if err.is_user_error() => {
                return failure_result(event, JudgeStatus::CompilationError, &err.to_string());
            }
            Err(err) => {
                error!(error = %err, "Failed to build code");
                return failure_result(event, JudgeStatus::RuntimeError, "Failed to build code.");
            }
        };

        debug!(submission_id = ?event.submission_id, "Code built successfully");

        let lang: LanguageSpec = language.into();
        let test_data: Vec<TestCaseData> = test_cases.into_iter().map(Into::into).collect();

        match self.pool.execute_job(lang, final_code, test_data).await {
            Ok(job) => solution_result_from_job(event, job, problem.score),
            Err(ExecuteError::QueueFull) => failure_result(
                event,
                JudgeStatus::RuntimeError,
                "Execution queue is full, please try again later.",
            ),
            Err(err) => {
                error!(error = %err, "Worker pool unavailable");
                failure_result(event, JudgeStatus::RuntimeError, "Execution is unavailable.")
            }
        }
    }

    async fn process_solution_result(&self, event: SolutionResult) -> anyhow::Result<()> {
        let Some(submission_id) = event.submitted.submission_id else {
            anyhow::bail!("solution result without a submission id");
        };

        info!(
            room_id = %self.room_id,
            %submission_id,
            status = %event.status,
            "Processing solution result"
        );

        if event.status != JudgeStatus::Accepted {
            self.store_call(self.store.update_submission_status(
                submission_id,
                event.status.into(),
                event.execution_time_ms,
            ))
            .await?;

            self.dispatch_event_to_player(
                SseEvent::new(
                    EventType::WrongSolutionSubmitted,
                    json!({ "status": event.status, "message": event.message }),
                ),
                event.submitted.player_id,
            );
            return Ok(());
        }

        self.add_score(&event, submission_id).await?;

        // non-blocking: a full channel drops this refresh, the next
        // accepted solution triggers another
        if self.guild_updates.try_send(self.event_id).is_err() {
            warn!(event_id = %self.event_id, "Guild update channel is full, notification dropped");
        }

        self.recalculate_leaderboard().await;

        self.dispatch_event(SseEvent::new(
            EventType::CorrectSolutionSubmitted,
            json!({
                "player_id": event.submitted.player_id,
                "problem_id": event.submitted.problem_id,
                "score": event.score,
            }),
        ));
        self.dispatch_leaderboard().await;

        self.store_call(self.store.update_submission_status(
            submission_id,
            SubmissionStatus::Accepted,
            event.execution_time_ms,
        ))
        .await?;

        Ok(())
    }

    /// Adds the solution's score to the player, inserting the player row
    /// first when they submitted without ever joining the live room.
    async fn add_score(&self, event: &SolutionResult, submission_id: Uuid) -> anyhow::Result<()> {
        let player_id = event.submitted.player_id;
        match self
            .store_call(
                self.store
                    .add_room_player_score(self.room_id, player_id, event.score),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => {
                info!(%player_id, %submission_id, "Scoring player without a room row, creating one");
                let username = format!("player-{player_id}");
                self.store_call(self.store.create_room_player(
                    self.room_id,
                    player_id,
                    &username,
                ))
                .await?;
                self.store_call(self.store.add_room_player_score(
                    self.room_id,
                    player_id,
                    event.score,
                ))
                .await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn process_room_deleted(&self) {
        if let Err(err) = self.store_call(self.store.delete_room(self.room_id)).await {
            error!(room_id = %self.room_id, error = %err, "Failed to delete room from store");
        }

        self.dispatch_event(SseEvent::new(
            EventType::RoomDeleted,
            json!({ "room_id": self.room_id }),
        ));

        // closing the delivery channels ends the SSE streams after the
        // buffered ROOM_DELETED drains
        self.listeners.write().unwrap().clear();

        info!(room_id = %self.room_id, "Room deleted");
    }

    async fn recalculate_leaderboard(&self) {
        if let Err(err) = self
            .store_call(self.store.calculate_room_leaderboard(self.room_id))
            .await
        {
            // non-fatal, but should be monitored
            error!(room_id = %self.room_id, error = %err, "Failed to recalculate leaderboard");
        }
    }

    /// Current leaderboard rows, ranked (score desc, joined_at asc).
    pub async fn leaderboard_entries(&self) -> Result<Vec<RoomLeaderboardEntry>, StoreError> {
        let players = self
            .store_call(self.store.get_room_players(self.room_id))
            .await?;
        Ok(players
            .into_iter()
            .map(|p| RoomLeaderboardEntry {
                player_name: p.username,
                score: p.score,
                place: p.place,
            })
            .collect())
    }

    async fn dispatch_leaderboard(&self) {
        let entries = match self.leaderboard_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                error!(room_id = %self.room_id, error = %err, "Failed to get room leaderboard entries");
                return;
            }
        };
        match serde_json::to_value(&entries) {
            Ok(data) => self.dispatch_event(SseEvent::new(EventType::LeaderboardUpdated, data)),
            Err(err) => error!(room_id = %self.room_id, error = %err, "Failed to encode leaderboard"),
        }
    }
}

fn solution_result_from_job(
    event: &SolutionSubmitted,
    job: JobResult,
    problem_score: i32,
) -> SolutionResult {
    let (status, score, message) = match job.error {
        None => (
            JudgeStatus::Accepted,
            problem_score,
            "Solution is correct!".to_string(),
        ),
        Some(JobError::Compile) => (
            JudgeStatus::CompilationError,
            0,
            format!("compile error: {}", job.message),
        ),
        // expired deadlines finalize as runtime failures, matching the
        // submission vocabulary exposed to clients
        Some(JobError::Runtime) | Some(JobError::Timeout) => (
            JudgeStatus::RuntimeError,
            0,
            format!("runtime error: {}", job.message),
        ),
        Some(JobError::TestCaseFailed) => (
            JudgeStatus::WrongAnswer,
            0,
            format!("test case failed: {}", job.message),
        ),
    };

    SolutionResult {
        submitted: event.clone(),
        score,
        status,
        message,
        execution_time_ms: job.success.then_some(job.execution_time_ms),
    }
}

fn failure_result(event: &SolutionSubmitted, status: JudgeStatus, message: &str) -> SolutionResult {
    SolutionResult {
        submitted: event.clone(),
        score: 0,
        status,
        message: message.to_string(),
        execution_time_ms: None,
    }
}
