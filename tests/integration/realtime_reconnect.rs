// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::needless_continue,
    clippy::match_same_arms,
    clippy::doc_markdown,
    clippy::manual_let_else,
    clippy::future_not_send,
    clippy::redundant_pub_crate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the realtime client against a live hub.
//!
//! These tests validate:
//! - the client reconnects after the hub closes every socket
//! - project rooms are re-joined on the new connection
//! - events broadcast after the reconnect reach registered handlers
//! - an unreachable endpoint exhausts its attempts and ends `Disconnected`
//! - a refused handshake (no token) is treated like any failed open

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use taskboard::realtime::socket::WsConnector;
use taskboard::realtime::{BackoffPolicy, LinkState, RealtimeClient};
use taskboard_hub::hub::{self, HubState};
use taskboard_hub::rooms::ConnId;
use taskboard_proto::event::TaskDeleted;
use taskboard_proto::{ProjectId, ServerEvent};

const WAIT: Duration = Duration::from_secs(10);

fn fast_policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(50),
        max_attempts,
    }
}

async fn start_hub() -> (SocketAddr, Arc<HubState>) {
    let state = Arc::new(HubState::new());
    let (addr, _handle) = hub::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (addr, state)
}

fn client_for(addr: SocketAddr, policy: BackoffPolicy) -> RealtimeClient {
    let connector = WsConnector::new(&format!("ws://{addr}/ws")).unwrap();
    RealtimeClient::spawn(connector, policy)
}

async fn wait_for_state(client: &RealtimeClient, wanted: LinkState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|state| *state == wanted))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"))
        .unwrap();
}

/// Polls the hub until the room has exactly one member that satisfies `pred`.
async fn wait_for_member<F>(state: &HubState, project: &ProjectId, pred: F) -> ConnId
where
    F: Fn(ConnId) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            if let [conn] = state.rooms.members(project).await[..]
                && pred(conn)
            {
                return conn;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room membership did not settle")
}

fn deleted(project: &ProjectId, task: &str) -> ServerEvent {
    ServerEvent::TaskDeleted(TaskDeleted {
        project_id: project.clone(),
        task_id: task.into(),
    })
}

#[tokio::test]
async fn reconnects_and_rejoins_after_server_close() {
    let (addr, hub_state) = start_hub().await;
    let project = ProjectId::new("p1");

    let client = client_for(addr, fast_policy(5));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_task_deleted(move |event| sink.lock().push(event.task_id.clone()));

    client.connect("dev-token");
    wait_for_state(&client, LinkState::Connected).await;
    client.join_project(&project);
    let first = wait_for_member(&hub_state, &project, |_| true).await;

    hub_state.close_all_connections().await;

    let second = wait_for_member(&hub_state, &project, |conn| conn != first).await;
    assert_ne!(first, second);
    wait_for_state(&client, LinkState::Connected).await;

    assert_eq!(hub_state.broadcast(&deleted(&project, "t1")).await, 1);
    tokio::time::timeout(WAIT, async {
        while seen.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(seen.lock().as_slice(), [taskboard_proto::TaskId::new("t1")]);
}

#[tokio::test]
async fn left_rooms_are_not_rejoined() {
    let (addr, hub_state) = start_hub().await;
    let (kept, dropped) = (ProjectId::new("kept"), ProjectId::new("dropped"));

    let client = client_for(addr, fast_policy(5));
    client.connect("dev-token");
    wait_for_state(&client, LinkState::Connected).await;
    client.join_project(&kept);
    client.join_project(&dropped);
    let first = wait_for_member(&hub_state, &kept, |_| true).await;
    wait_for_member(&hub_state, &dropped, |_| true).await;
    client.leave_project(&dropped);
    tokio::time::timeout(WAIT, async {
        while !hub_state.rooms.members(&dropped).await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    hub_state.close_all_connections().await;
    wait_for_member(&hub_state, &kept, |conn| conn != first).await;
    assert!(hub_state.rooms.members(&dropped).await.is_empty());
}

#[tokio::test]
async fn unreachable_hub_gives_up() {
    // Reserve a port, then free it so nothing listens there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, fast_policy(2));
    let mut states = client.watch_state();
    client.connect("dev-token");

    tokio::time::timeout(WAIT, states.wait_for(|s| matches!(s, LinkState::Reconnecting { .. })))
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&client, LinkState::Disconnected).await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn handshake_without_token_is_refused() {
    let (addr, hub_state) = start_hub().await;

    // A blank token yields "Bearer " which the hub rejects with 401.
    let client = client_for(addr, fast_policy(1));
    let mut states = client.watch_state();
    client.connect("");

    tokio::time::timeout(WAIT, states.wait_for(|s| matches!(s, LinkState::Reconnecting { .. })))
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&client, LinkState::Disconnected).await;
    assert_eq!(hub_state.connection_count().await, 0);
}

#[tokio::test]
async fn disconnect_releases_the_server_connection() {
    let (addr, hub_state) = start_hub().await;
    let project = ProjectId::new("p1");

    let client = client_for(addr, fast_policy(5));
    client.connect("dev-token");
    wait_for_state(&client, LinkState::Connected).await;
    client.join_project(&project);
    wait_for_member(&hub_state, &project, |_| true).await;

    client.disconnect();
    wait_for_state(&client, LinkState::Disconnected).await;
    tokio::time::timeout(WAIT, async {
        while hub_state.connection_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(hub_state.rooms.members(&project).await.is_empty());
}
