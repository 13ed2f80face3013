use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use common::{EventType, RoomEvent, SolutionSubmitted, SubmissionStatus};
use engine::SandboxError;
use server::hub::SubmitError;
use server::store::{Store, StoreError};

use crate::harness::{
    self, ScriptedHost, arena, arena_with, assert_no_event, echo_output, expect_event, hub_config,
};

fn submission_event(arena: &harness::Arena, player_id: Uuid, code: &str) -> RoomEvent {
    RoomEvent::SolutionSubmitted(SolutionSubmitted {
        player_id,
        event_id: arena.event_id,
        room_id: arena.room_id,
        problem_id: arena.problem_id,
        code: code.into(),
        language: "go".into(),
        submitted_at: Utc::now(),
        submission_id: None,
    })
}

#[tokio::test]
async fn test_accepted_submission_scores_and_notifies_room() {
    let arena = arena().await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let player_id = Uuid::new_v4();

    let (mut rx, _guard) = room.subscribe(player_id);
    room.submit(RoomEvent::PlayerJoined {
        player_id,
        room_id: arena.room_id,
    })
    .unwrap();

    expect_event(&mut rx, EventType::PlayerJoined).await;
    let lb = expect_event(&mut rx, EventType::LeaderboardUpdated).await;
    assert_eq!(lb.data.as_array().unwrap().len(), 1);

    room.submit(submission_event(&arena, player_id, "fmt.Println(\"42\")"))
        .unwrap();

    expect_event(&mut rx, EventType::CorrectSolutionSubmitted).await;
    let lb = expect_event(&mut rx, EventType::LeaderboardUpdated).await;
    // the snapshot is taken after the score update
    assert_eq!(lb.data[0]["score"], 50);
    assert_eq!(lb.data[0]["place"], 1);

    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::Accepted);
    assert!(sub.execution_time_ms.is_some());

    let player = arena.store.player(arena.room_id, player_id).unwrap();
    assert_eq!(player.score, 50);
    assert_eq!(player.place, Some(1));
}

#[tokio::test]
async fn test_wrong_syntax_notifies_only_the_submitter() {
    let arena = arena().await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let submitter = Uuid::new_v4();
    let bystander = Uuid::new_v4();

    let (mut rx1, _g1) = room.subscribe(submitter);
    room.submit(RoomEvent::PlayerJoined {
        player_id: submitter,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut rx1, EventType::PlayerJoined).await;
    expect_event(&mut rx1, EventType::LeaderboardUpdated).await;

    let (mut rx2, _g2) = room.subscribe(bystander);
    room.submit(RoomEvent::PlayerJoined {
        player_id: bystander,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut rx1, EventType::PlayerJoined).await;
    expect_event(&mut rx1, EventType::LeaderboardUpdated).await;
    expect_event(&mut rx2, EventType::PlayerJoined).await;
    expect_event(&mut rx2, EventType::LeaderboardUpdated).await;

    // unterminated call: the analyzer rejects the composed file
    room.submit(submission_event(&arena, submitter, "fmt.Println("))
        .unwrap();

    let wrong = expect_event(&mut rx1, EventType::WrongSolutionSubmitted).await;
    assert_eq!(wrong.data["status"], "CompilationError");
    assert_eq!(wrong.data["message"], "Wrong syntax.");
    assert_no_event(&mut rx2).await;

    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::CompilationError);
}

#[tokio::test]
async fn test_wrong_answer_carries_the_diff_to_the_submitter() {
    let arena = arena_with(
        ScriptedHost::new(Box::new(|_, _| echo_output("41\n"))),
        hub_config(),
    )
    .await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let submitter = Uuid::new_v4();

    let (mut rx, _guard) = room.subscribe(submitter);
    room.submit(RoomEvent::PlayerJoined {
        player_id: submitter,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut rx, EventType::PlayerJoined).await;
    expect_event(&mut rx, EventType::LeaderboardUpdated).await;

    room.submit(submission_event(&arena, submitter, "fmt.Println(\"41\")"))
        .unwrap();

    let wrong = expect_event(&mut rx, EventType::WrongSolutionSubmitted).await;
    assert_eq!(wrong.data["status"], "WrongAnswer");
    let message = wrong.data["message"].as_str().unwrap();
    assert!(message.contains("Expected Output:\n42"));
    assert!(message.contains("Your Output:\n41"));

    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::WrongAnswer);
    assert_eq!(arena.store.player(arena.room_id, submitter).unwrap().score, 0);
}

#[tokio::test]
async fn test_timed_out_run_finalizes_as_runtime_error() {
    let arena = arena_with(
        ScriptedHost::new(Box::new(|_, _| Err(SandboxError::Timeout))),
        hub_config(),
    )
    .await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let submitter = Uuid::new_v4();

    let (mut rx, _guard) = room.subscribe(submitter);
    room.submit(RoomEvent::PlayerJoined {
        player_id: submitter,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut rx, EventType::PlayerJoined).await;
    expect_event(&mut rx, EventType::LeaderboardUpdated).await;

    room.submit(submission_event(&arena, submitter, "for {}"))
        .unwrap();

    let wrong = expect_event(&mut rx, EventType::WrongSolutionSubmitted).await;
    assert_eq!(wrong.data["status"], "RuntimeError");
    assert!(
        wrong.data["message"]
            .as_str()
            .unwrap()
            .contains("Time limit exceeded")
    );

    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::RuntimeError);
}

#[tokio::test]
async fn test_slow_listener_does_not_stall_the_room() {
    let mut config = hub_config();
    config.listener_buffer = 1;
    let arena = arena_with(
        ScriptedHost::new(Box::new(|_, _| echo_output("42\n"))),
        config,
    )
    .await;
    let room = arena.hub.room(arena.room_id).unwrap();

    let fast = Uuid::new_v4();
    let slow = Uuid::new_v4();
    let (mut fast_rx, _fg) = room.subscribe(fast);
    let (mut slow_rx, _sg) = room.subscribe(slow);

    // the slow listener never reads; its one-slot buffer fills on the
    // first event and everything after is dropped
    let newcomer = Uuid::new_v4();
    room.submit(RoomEvent::PlayerJoined {
        player_id: newcomer,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut fast_rx, EventType::PlayerJoined).await;
    expect_event(&mut fast_rx, EventType::LeaderboardUpdated).await;

    // the loop stays responsive to a follow-on event
    room.submit(RoomEvent::PlayerLeft {
        player_id: newcomer,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut fast_rx, EventType::PlayerLeft).await;
    expect_event(&mut fast_rx, EventType::LeaderboardUpdated).await;

    // the slow listener holds exactly the one buffered event
    let first = slow_rx.try_recv().unwrap();
    assert_eq!(first.event_type, EventType::PlayerJoined);
    assert!(slow_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_full_room_queue_rejects_the_eleventh_event() {
    let arena = arena_with(
        ScriptedHost::gated(Box::new(|_, _| echo_output("42\n"))),
        hub_config(),
    )
    .await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let submitter = Uuid::new_v4();

    // the loop blocks inside the worker pool on this one
    room.submit(submission_event(&arena, submitter, "fmt.Println(\"42\")"))
        .unwrap();
    arena.host.exec_entered.notified().await;

    // capacity is 10: these fill the queue while the loop is busy
    for _ in 0..10 {
        room.submit(RoomEvent::PlayerJoined {
            player_id: Uuid::new_v4(),
            room_id: arena.room_id,
        })
        .unwrap();
    }

    let overflow = room.submit(RoomEvent::PlayerJoined {
        player_id: Uuid::new_v4(),
        room_id: arena.room_id,
    });
    assert!(matches!(overflow, Err(SubmitError::QueueFull)));

    // release the job; the stuck submission must still finalize even
    // though its result cannot be re-enqueued on the full queue
    arena.host.open_gate(16);
    let sub = harness::wait_for_terminal_submission(&arena.store).await;
    assert_eq!(sub.status, SubmissionStatus::Accepted);
}

#[tokio::test]
async fn test_room_deletion_notifies_and_closes() {
    let arena = arena().await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let player_id = Uuid::new_v4();

    let (mut rx, _guard) = room.subscribe(player_id);
    room.submit(RoomEvent::PlayerJoined {
        player_id,
        room_id: arena.room_id,
    })
    .unwrap();
    expect_event(&mut rx, EventType::PlayerJoined).await;
    expect_event(&mut rx, EventType::LeaderboardUpdated).await;

    room.submit(RoomEvent::RoomDeleted {
        room_id: arena.room_id,
    })
    .unwrap();

    expect_event(&mut rx, EventType::RoomDeleted).await;
    // the hub closes the delivery channels once the room is gone
    assert!(
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .is_none()
    );

    let gone = arena.store.get_room(arena.room_id).await;
    assert!(matches!(gone, Err(StoreError::NotFound)));

    // the registry prunes the hub when its loop exits
    for _ in 0..100 {
        if arena.hub.room(arena.room_id).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(arena.hub.room(arena.room_id).is_none());

    let refused = room.submit(RoomEvent::PlayerJoined {
        player_id,
        room_id: arena.room_id,
    });
    assert!(matches!(refused, Err(SubmitError::Closed)));
}

#[tokio::test]
async fn test_accepted_solution_pushes_guild_leaderboard() {
    let arena = arena().await;
    let room = arena.hub.room(arena.room_id).unwrap();
    let player_id = Uuid::new_v4();

    let guild_id = Uuid::new_v4();
    arena.store.insert_guild(server::entity::guild::Model {
        id: guild_id,
        name: "rustaceans".into(),
    });
    arena
        .store
        .insert_guild_member(server::entity::guild_member::Model {
            guild_id,
            user_id: player_id,
        });

    let spectator = Uuid::new_v4();
    let (mut guild_rx, _guard) = arena.hub.subscribe_event(arena.event_id, spectator);

    room.submit(RoomEvent::PlayerJoined {
        player_id,
        room_id: arena.room_id,
    })
    .unwrap();
    room.submit(submission_event(&arena, player_id, "fmt.Println(\"42\")"))
        .unwrap();

    let update = expect_event(&mut guild_rx, EventType::GuildLeaderboardUpdated).await;
    let rows = update.data.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["guild_name"], "rustaceans");
    assert_eq!(rows[0]["total_score"], 50);
    assert_eq!(rows[0]["place"], 1);
}
