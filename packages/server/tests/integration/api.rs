use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use uuid::Uuid;

use common::SubmissionStatus;
use server::config::{AppConfig, CorsConfig, DatabaseConfig, ServerConfig};
use server::state::AppState;
use server::store::{Store, StoreError};

use crate::harness::{self, Arena};

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors: CorsConfig {
                allow_origins: vec![],
                max_age: 3600,
            },
        },
        database: DatabaseConfig {
            url: "postgres://unused".into(),
        },
        engine: Default::default(),
        hub: harness::hub_config(),
    }
}

async fn spawn_app(arena: &Arena) -> SocketAddr {
    let store: Arc<dyn Store> = arena.store.clone();
    let state = AppState {
        hub: arena.hub.clone(),
        store,
        config: test_config(),
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_list_events_and_rooms() {
    let arena = harness::arena().await;
    let addr = spawn_app(&arena).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{addr}/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let events: Value = res.json().await.unwrap();
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["title"], "Summer Code Clash");

    let res = client
        .get(format!("http://{addr}/events/{}/rooms", arena.event_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let rooms: Value = res.json().await.unwrap();
    assert_eq!(rooms.as_array().unwrap().len(), 1);
    assert_eq!(rooms[0]["name"], "main-hall");

    let res = client
        .get(format!("http://{addr}/events/{}/rooms", Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_submission_validation_and_queueing() {
    let arena = harness::arena().await;
    let addr = spawn_app(&arena).await;
    let client = reqwest::Client::new();
    let player_id = Uuid::new_v4();
    let submit_url = format!(
        "http://{addr}/events/{}/rooms/{}/submit?player_id={player_id}",
        arena.event_id, arena.room_id
    );

    // unknown language
    let res = client
        .post(&submit_url)
        .json(&json!({
            "problem_id": arena.problem_id,
            "code": "fmt.Println(\"42\")",
            "language": "brainfuck",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // oversize code
    let res = client
        .post(&submit_url)
        .json(&json!({
            "problem_id": arena.problem_id,
            "code": "x".repeat(2000),
            "language": "go",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // unknown room
    let res = client
        .post(format!(
            "http://{addr}/events/{}/rooms/{}/submit?player_id={player_id}",
            arena.event_id,
            Uuid::new_v4()
        ))
        .json(&json!({
            "problem_id": arena.problem_id,
            "code": "fmt.Println(\"42\")",
            "language": "go",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    // valid submission is queued and eventually accepted
    let res = client
        .post(&submit_url)
        .json(&json!({
            "problem_id": arena.problem_id,
            "code": "fmt.Println(\"42\")",
            "language": "go",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["queued"], true);

    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::Accepted);
    assert_eq!(sub.user_id, player_id);
}

#[tokio::test]
async fn test_room_sse_stream_frames_events() {
    let arena = harness::arena().await;
    let addr = spawn_app(&arena).await;
    let player_id = Uuid::new_v4();

    let res = reqwest::Client::new()
        .get(format!(
            "http://{addr}/events/{}/rooms/{}/leaderboard?player_id={player_id}",
            arena.event_id, arena.room_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let content_type = res.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut stream = res.bytes_stream();
    let mut buf = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while tokio::time::Instant::now() < deadline {
        let chunk = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("timed out waiting for SSE data")
            .expect("SSE stream ended early")
            .unwrap();
        buf.push_str(&String::from_utf8_lossy(&chunk));
        if buf.contains("event: LEADERBOARD_UPDATED") {
            break;
        }
    }

    // frames carry the `event:` tag and a JSON `data:` line
    assert!(buf.contains("event: PLAYER_JOINED"));
    assert!(buf.contains("event: LEADERBOARD_UPDATED"));
    assert!(buf.contains("data: "));
}

#[tokio::test]
async fn test_create_and_delete_room() {
    let arena = harness::arena().await;
    let addr = spawn_app(&arena).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{addr}/events/{}/rooms", arena.event_id))
        .json(&json!({ "name": "second-hall" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let new_room_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    assert!(arena.hub.room(new_room_id).is_some());

    // empty name is rejected
    let res = client
        .post(format!("http://{addr}/events/{}/rooms", arena.event_id))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .delete(format!(
            "http://{addr}/events/{}/rooms/{new_room_id}",
            arena.event_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);

    // deletion is asynchronous; poll until the row is gone
    for _ in 0..100 {
        if matches!(
            arena.store.get_room(new_room_id).await,
            Err(StoreError::NotFound)
        ) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(
        arena.store.get_room(new_room_id).await,
        Err(StoreError::NotFound)
    ));
}
