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

//! Integration tests for optimistic mutations and realtime merging.
//!
//! Two stores talk to one hub over HTTP: `alice` is the store under test and
//! is subscribed to the project room; `bob` is another user making changes.
//!
//! These tests validate:
//! - a rejected move rolls back and yields exactly one error notice
//! - a successful update yields exactly one success notice, even after the
//!   server's `task:updated` echo is merged
//! - tasks created, moved and deleted by another user appear locally
//! - a second binding detached before re-attaching does not double-apply

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use taskboard::api::{HttpApiConfig, HttpTaskApi};
use taskboard::realtime::socket::WsConnector;
use taskboard::realtime::{BackoffPolicy, LinkState, RealtimeClient};
use taskboard::store::{ChannelNotifier, MutationKind, Notice, NoticeLevel, StoreError, TaskStore};
use taskboard::sync::SyncBinding;
use taskboard_hub::hub::{self, HubState};
use taskboard_proto::rest::codes;
use taskboard_proto::{ColumnId, Priority, ProjectId, Task, TaskDraft, TaskPatch};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

type Store = TaskStore<HttpTaskApi, ChannelNotifier>;

struct Harness {
    addr: SocketAddr,
    hub: Arc<HubState>,
    project: ProjectId,
}

impl Harness {
    async fn start() -> Self {
        let hub = Arc::new(HubState::new());
        let project = hub.store.create_project("Launch").await.unwrap().id;
        let (addr, _handle) = hub::start_server_with_state("127.0.0.1:0", Arc::clone(&hub))
            .await
            .unwrap();
        Self { addr, hub, project }
    }

    fn store(&self) -> (Arc<Store>, mpsc::UnboundedReceiver<Notice>) {
        let config = HttpApiConfig {
            base_url: format!("http://{}/api", self.addr),
            ..HttpApiConfig::default()
        };
        let api = HttpTaskApi::new(&config, "dev-token").unwrap();
        let (notifier, notices) = ChannelNotifier::new();
        (Arc::new(TaskStore::new(api, notifier)), notices)
    }

    /// Connects a realtime client and joins the project room.
    async fn subscribe(&self) -> RealtimeClient {
        let connector = WsConnector::new(&format!("ws://{}/ws", self.addr)).unwrap();
        let client = RealtimeClient::spawn(connector, BackoffPolicy::default());
        let mut states = client.watch_state();
        client.connect("dev-token");
        tokio::time::timeout(WAIT, states.wait_for(|s| *s == LinkState::Connected))
            .await
            .unwrap()
            .unwrap();
        let before = self.hub.rooms.members(&self.project).await.len();
        client.join_project(&self.project);
        tokio::time::timeout(WAIT, async {
            while self.hub.rooms.members(&self.project).await.len() <= before {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("join did not reach the hub");
        client
    }

    async fn seed_task(&self, title: &str) -> Task {
        self.hub
            .store
            .create_task(&self.project, TaskDraft::new(title))
            .await
            .unwrap()
    }
}

/// Polls `condition` until it holds.
async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Waits briefly, then returns everything queued on `notices`.
async fn drain(notices: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

#[tokio::test]
async fn rejected_move_rolls_back_with_one_error_notice() {
    let harness = Harness::start().await;
    let task = harness.seed_task("Write docs").await;
    let (alice, mut notices) = harness.store();
    alice.load_project(&harness.project).await.unwrap();

    let err = alice
        .move_task(&task.id, ColumnId::new("archive"), 0)
        .await
        .unwrap_err();

    let StoreError::Rejected { kind, message, source } = &err else {
        panic!("expected Rejected, got {err:?}");
    };
    assert_eq!(*kind, MutationKind::Move);
    assert_eq!(message, "Column archive does not exist in this project");
    assert_eq!(source.status(), Some(400));
    assert_eq!(source.code(), Some(codes::INVALID_COLUMN));

    let local = alice.task(&task.id).unwrap();
    assert_eq!(local.column_id, ColumnId::new("todo"));
    assert_eq!(local, task);

    let notices = drain(&mut notices).await;
    assert_eq!(
        notices,
        [Notice::error("Column archive does not exist in this project")]
    );
}

#[tokio::test]
async fn update_announces_success_once_despite_echo() {
    let harness = Harness::start().await;
    let task = harness.seed_task("Ship it").await;
    let (alice, mut notices) = harness.store();
    alice.load_project(&harness.project).await.unwrap();
    let client = harness.subscribe().await;
    let binding = SyncBinding::attach(&client, Arc::clone(&alice));

    let updated = alice
        .update_task(&task.id, TaskPatch::default().with_priority(Priority::High))
        .await
        .unwrap();
    assert_eq!(updated.priority, Priority::High);

    let notices = drain(&mut notices).await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[0].message, "Task updated");

    let local = alice.task(&task.id).unwrap();
    assert_eq!(local.priority, Priority::High);
    assert_eq!(local.title, "Ship it");

    binding.detach(&client);
}

#[tokio::test]
async fn remote_create_lands_in_empty_project() {
    let harness = Harness::start().await;
    let (alice, _alice_notices) = harness.store();
    assert!(alice.load_project(&harness.project).await.unwrap().is_empty());
    let client = harness.subscribe().await;
    let binding = SyncBinding::attach(&client, Arc::clone(&alice));

    let (bob, _bob_notices) = harness.store();
    let created = bob
        .create_task(&harness.project, TaskDraft::new("From Bob"))
        .await
        .unwrap();

    eventually(|| alice.task(&created.id).is_some()).await;
    assert_eq!(alice.tasks(&harness.project), [created]);

    binding.detach(&client);
}

#[tokio::test]
async fn remote_move_and_delete_are_merged() {
    let harness = Harness::start().await;
    let keep = harness.seed_task("Keep").await;
    let doomed = harness.seed_task("Drop").await;
    let (alice, mut alice_notices) = harness.store();
    alice.load_project(&harness.project).await.unwrap();
    let client = harness.subscribe().await;
    let binding = SyncBinding::attach(&client, Arc::clone(&alice));

    let (bob, _bob_notices) = harness.store();
    bob.load_project(&harness.project).await.unwrap();
    bob.move_task(&keep.id, ColumnId::new("done"), 0)
        .await
        .unwrap();
    bob.delete_task(&doomed.id).await.unwrap();

    eventually(|| {
        alice.task(&doomed.id).is_none()
            && alice
                .task(&keep.id)
                .is_some_and(|t| t.column_id == ColumnId::new("done"))
    })
    .await;
    assert_eq!(alice.tasks(&harness.project).len(), 1);
    // Remote changes never produce notices.
    assert!(drain(&mut alice_notices).await.is_empty());

    binding.detach(&client);
}

#[tokio::test]
async fn reattached_binding_applies_each_event_once() {
    let harness = Harness::start().await;
    let (alice, _notices) = harness.store();
    alice.load_project(&harness.project).await.unwrap();
    let client = harness.subscribe().await;

    let first = SyncBinding::attach(&client, Arc::clone(&alice));
    first.detach(&client);

    let applied = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&applied);
    let second = SyncBinding::attach_with(&client, Arc::clone(&alice), move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    assert_eq!(second.len(), 4);

    let (bob, _bob_notices) = harness.store();
    let created = bob
        .create_task(&harness.project, TaskDraft::new("Once"))
        .await
        .unwrap();
    eventually(|| alice.task(&created.id).is_some()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(applied.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(alice.tasks(&harness.project).len(), 1);

    second.detach(&client);
}
