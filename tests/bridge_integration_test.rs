//! End-to-end tests: control server, event streams, bridges and the game.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{forwarding_handler, recv_within, TestServer};
use pushbridge::bridge::{BridgeError, BridgeTask, Bridges};
use pushbridge::bus::event_types::{EVENT_PUSH_NEXT_ANSWER, EVENT_PUSH_SHUTDOWN, EVENT_PUSH_START};
use pushbridge::bus::{EventDispatcher, RemoteEvent};
use pushbridge::config::RetransmitTimeouts;
use pushbridge::game::{LogRenderer, WordGame, DEFAULT_TITLE};
use pushbridge::stream::{consume, StreamError};

const PATIENCE: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

#[tokio::test]
async fn test_shutdown_trigger_reaches_game_and_raises_terminate() {
    let server = TestServer::start(RetransmitTimeouts::default()).await;
    let game = Arc::new(WordGame::new(
        DEFAULT_TITLE,
        vec!["ONE".to_string()],
        Arc::new(LogRenderer),
        Some(0),
    ));
    let mut dispatcher = EventDispatcher::new();
    game.register(&mut dispatcher);
    let (observer, mut shutdown_rx) = forwarding_handler();
    dispatcher.on(EVENT_PUSH_SHUTDOWN, observer);
    let dispatcher = dispatcher.into_shared();

    let client = reqwest::Client::new();
    let mut bridges = Bridges::new();
    bridges.spawn(BridgeTask::for_event(
        client,
        &server.base_url(),
        RemoteEvent::Shutdown,
        dispatcher,
    ));

    server.trigger(RemoteEvent::Shutdown).await;

    let args = recv_within(&mut shutdown_rx, PATIENCE)
        .await
        .expect("shutdown payload should arrive");
    assert_eq!(args, vec![json!([true])]);

    let terminated = tokio::time::timeout(PATIENCE, game.terminate_signal().wait(None))
        .await
        .expect("terminate should be raised");
    assert!(terminated);
    bridges.shutdown();
}

#[tokio::test]
async fn test_bridges_only_deliver_their_own_event() {
    let server = TestServer::start(RetransmitTimeouts::default()).await;
    let mut dispatcher = EventDispatcher::new();
    let (start_handler, mut start_rx) = forwarding_handler();
    let (next_handler, mut next_rx) = forwarding_handler();
    dispatcher.on(EVENT_PUSH_START, start_handler);
    dispatcher.on(EVENT_PUSH_NEXT_ANSWER, next_handler);
    let dispatcher = dispatcher.into_shared();

    let client = reqwest::Client::new();
    let mut bridges = Bridges::new();
    for event in [RemoteEvent::Start, RemoteEvent::NextAnswer] {
        bridges.spawn(BridgeTask::for_event(
            client.clone(),
            &server.base_url(),
            event,
            dispatcher.clone(),
        ));
    }
    assert_eq!(bridges.len(), 2);

    server.trigger(RemoteEvent::NextAnswer).await;

    assert_eq!(recv_within(&mut next_rx, PATIENCE).await, Some(vec![]));
    assert_eq!(recv_within(&mut start_rx, QUIET).await, None);
    assert!(!server.state.signal(RemoteEvent::Start).is_set());
    bridges.shutdown();
}

#[tokio::test]
async fn test_trigger_before_connect_is_not_missed() {
    let server = TestServer::start(RetransmitTimeouts::default()).await;
    server.trigger(RemoteEvent::Start).await;

    let client = reqwest::Client::new();
    let mut messages = consume(&client, &server.url(RemoteEvent::Start.stream_path()))
        .await
        .unwrap();

    let first = tokio::time::timeout(PATIENCE, messages.next())
        .await
        .expect("pending trigger should be delivered")
        .unwrap()
        .unwrap();
    assert_eq!(first, "[]");
}

#[tokio::test]
async fn test_idle_stream_retransmits_current_payload() {
    let timeouts = RetransmitTimeouts {
        shutdown: Some(Duration::from_millis(150)),
        ..RetransmitTimeouts::default()
    };
    let server = TestServer::start(timeouts).await;

    let client = reqwest::Client::new();
    let mut messages = consume(&client, &server.url(RemoteEvent::Shutdown.stream_path()))
        .await
        .unwrap();

    let idle = tokio::time::timeout(PATIENCE, messages.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(idle, "[[false]]");

    server.state.trigger(RemoteEvent::Shutdown);
    let mut latest = idle;
    for _ in 0..10 {
        latest = tokio::time::timeout(PATIENCE, messages.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if latest != "[[false]]" {
            break;
        }
    }
    assert_eq!(latest, "[[true]]");
}

#[tokio::test]
async fn test_unknown_stream_path_is_a_remote_error() {
    let server = TestServer::start(RetransmitTimeouts::default()).await;
    let client = reqwest::Client::new();

    let err = match consume(&client, &server.url("/push_missing")).await {
        Ok(_) => panic!("expected the connection to be refused"),
        Err(e) => e,
    };

    assert!(matches!(err, StreamError::RemoteError { status: 404, .. }));
}

#[tokio::test]
async fn test_bridge_without_local_handler_stops_with_unknown_event() {
    let server = TestServer::start(RetransmitTimeouts::default()).await;
    let dispatcher = EventDispatcher::new().into_shared();

    let mut bridges = Bridges::new();
    bridges.spawn(BridgeTask::for_event(
        reqwest::Client::new(),
        &server.base_url(),
        RemoteEvent::Start,
        dispatcher,
    ));
    server.trigger(RemoteEvent::Start).await;

    let (name, error) = tokio::time::timeout(PATIENCE, bridges.next_exit())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "start");
    assert!(matches!(error, BridgeError::Dispatch(_)));
    assert!(bridges.is_empty());
}
