use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Notify, Semaphore, mpsc};
use uuid::Uuid;

use common::{EventType, SseEvent};
use engine::{
    CodeBuilder, ContainerHost, EngineConfig, ExecOutput, GoPackageAnalyzer, SandboxError,
    WorkerPool,
};
use server::config::HubConfig;
use server::entity::{code_problem, event, language, language_detail, submission, test_case};
use server::hub::EventHub;
use server::store::{MemStore, Store};

pub const GO_DRIVER: &str =
    "package main\n// IMPORTS_HERE\nfunc main() {\n\t// USER_CODE_HERE\n}\n";

type ExecFn = Box<dyn Fn(&str, Option<&str>) -> Result<ExecOutput, SandboxError> + Send + Sync>;

/// Container host whose `exec` is scripted by the test. `gated` variants
/// block inside `exec` until the test opens the gate, letting a test hold
/// a job in flight.
pub struct ScriptedHost {
    idle: Semaphore,
    gate: Option<Semaphore>,
    pub exec_entered: Notify,
    exec_fn: ExecFn,
}

impl ScriptedHost {
    pub fn new(exec_fn: ExecFn) -> Self {
        Self {
            idle: Semaphore::new(4),
            gate: None,
            exec_entered: Notify::new(),
            exec_fn,
        }
    }

    pub fn gated(exec_fn: ExecFn) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(exec_fn)
        }
    }

    pub fn open_gate(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }
}

#[async_trait]
impl ContainerHost for ScriptedHost {
    async fn acquire(&self) -> Result<String, SandboxError> {
        let permit = self
            .idle
            .acquire()
            .await
            .map_err(|_| SandboxError::Exhausted)?;
        permit.forget();
        Ok("sandbox-0".into())
    }

    fn release(&self, _container_id: &str) {
        self.idle.add_permits(1);
    }

    async fn copy_in(
        &self,
        _container_id: &str,
        _dir: &str,
        _name: &str,
        _contents: &[u8],
        _timeout: Duration,
    ) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn exec(
        &self,
        _container_id: &str,
        command: &str,
        stdin: Option<&str>,
        _timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        self.exec_entered.notify_one();
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| SandboxError::Exhausted)?;
            permit.forget();
        }
        (self.exec_fn)(command, stdin)
    }

    async fn shutdown(&self) {
        self.idle.close();
    }
}

pub fn echo_output(stdout: &str) -> Result<ExecOutput, SandboxError> {
    Ok(ExecOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        duration: Duration::from_millis(5),
    })
}

/// Fully wired arena over the in-memory store and a scripted container
/// host, seeded with one event, one room, and one Go problem worth 50
/// points with a single test case expecting "42".
pub struct Arena {
    pub hub: Arc<EventHub>,
    pub store: Arc<MemStore>,
    pub host: Arc<ScriptedHost>,
    pub event_id: Uuid,
    pub room_id: Uuid,
    pub problem_id: Uuid,
}

pub fn hub_config() -> HubConfig {
    HubConfig {
        room_queue_capacity: 10,
        guild_update_capacity: 100,
        listener_buffer: 8,
        query_timeout_secs: 5,
    }
}

pub async fn arena() -> Arena {
    arena_with(
        ScriptedHost::new(Box::new(|_, _| echo_output("42\n"))),
        hub_config(),
    )
    .await
}

pub async fn arena_with(host: ScriptedHost, hub_config: HubConfig) -> Arena {
    let store = Arc::new(MemStore::new());
    let event_id = Uuid::new_v4();
    let problem_id = Uuid::new_v4();

    store.insert_event(event::Model {
        id: event_id,
        title: "Summer Code Clash".into(),
        description: None,
        event_type: "tournament".into(),
        started_at: Utc::now(),
        ended_at: Utc::now() + chrono::Duration::hours(2),
    });
    store.insert_language(language::Model {
        id: 1,
        name: "Golang".into(),
        compile_cmd: String::new(),
        run_cmd: "go run {{temp_file_dir}}/{{temp_file_name}}".into(),
        temp_file_dir: "/tmp/arena".into(),
        temp_file_name: "main.go".into(),
    });
    store.insert_problem(code_problem::Model {
        id: problem_id,
        title: "Print the Answer".into(),
        statement: "Print 42.".into(),
        difficulty: "easy".into(),
        score: 50,
    });
    store.insert_language_detail(language_detail::Model {
        code_problem_id: problem_id,
        language_id: 1,
        solution_stub: "// write your solution here".into(),
        driver_code: GO_DRIVER.into(),
        time_constraint_ms: 2000,
        space_constraint_mb: 256,
    });
    store.insert_test_case(test_case::Model {
        id: Uuid::new_v4(),
        code_problem_id: problem_id,
        input: String::new(),
        expected_output: "42".into(),
        is_hidden: false,
    });

    let host = Arc::new(host);
    let dyn_host: Arc<dyn ContainerHost> = host.clone();
    let engine_config = EngineConfig {
        max_workers: 2,
        max_job_count: 8,
        ..Default::default()
    };
    let pool = Arc::new(WorkerPool::new(&engine_config, dyn_host));
    let builder = Arc::new(CodeBuilder::new(vec![Arc::new(GoPackageAnalyzer::new())]));

    let dyn_store: Arc<dyn Store> = store.clone();
    let hub = EventHub::new(dyn_store, builder, pool, hub_config);

    let room = store.create_room(event_id, "main-hall").await.unwrap();
    hub.create_room(event_id, room.id);

    Arena {
        hub,
        store,
        host,
        event_id,
        room_id: room.id,
        problem_id,
    }
}

/// Receives the next event within two seconds.
pub async fn next_event(rx: &mut mpsc::Receiver<SseEvent>) -> SseEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("listener channel closed")
}

/// Receives the next event and asserts its type.
pub async fn expect_event(rx: &mut mpsc::Receiver<SseEvent>, event_type: EventType) -> SseEvent {
    let event = next_event(rx).await;
    assert_eq!(event.event_type, event_type, "unexpected event: {event:?}");
    event
}

/// Asserts that nothing arrives for a while.
pub async fn assert_no_event(rx: &mut mpsc::Receiver<SseEvent>) {
    let res = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(res.is_err(), "unexpected event: {res:?}");
}

/// Polls the store until some submission reaches a terminal status.
pub async fn wait_for_terminal_submission(store: &MemStore) -> submission::Model {
    for _ in 0..200 {
        if let Some(sub) = store
            .submissions()
            .into_iter()
            .find(|s| s.status.is_terminal())
        {
            return sub;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("submission never reached a terminal status");
}
