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

//! Integration tests for drag-and-drop moves on a board session.
//!
//! A [`BoardSession`] is driven with drag events against a live hub over
//! HTTP. These tests validate:
//! - a drop on another column moves the task locally and on the server
//! - a drop on the source column, or a cancelled drag, makes no request
//! - a drop on a column the board does not render is refused
//! - a move the server rejects leaves the task where it was

use std::sync::Arc;

use taskboard::api::{HttpApiConfig, HttpTaskApi};
use taskboard::board::{BoardError, BoardSession, DragEvent, DragState};
use taskboard::store::{StoreError, TaskStore, TracingNotifier};
use taskboard_hub::hub::{self, HubState};
use taskboard_proto::{ColumnId, Task, TaskDraft};

type Session = BoardSession<HttpTaskApi, TracingNotifier>;

struct Board {
    hub: Arc<HubState>,
    session: Session,
    task: Task,
}

/// Starts a hub with one project holding one `todo` task, and a loaded
/// board session for it.
async fn board() -> Board {
    let hub = Arc::new(HubState::new());
    let project = hub.store.create_project("Launch").await.unwrap().id;
    let task = hub
        .store
        .create_task(&project, TaskDraft::new("Drag me"))
        .await
        .unwrap();
    let (addr, _handle) = hub::start_server_with_state("127.0.0.1:0", Arc::clone(&hub))
        .await
        .unwrap();

    let config = HttpApiConfig {
        base_url: format!("http://{addr}/api"),
        ..HttpApiConfig::default()
    };
    let api = HttpTaskApi::new(&config, "dev-token").unwrap();
    let store = Arc::new(TaskStore::new(api, TracingNotifier));
    let mut session = BoardSession::new(project, store);
    session.load().await.unwrap();
    Board { hub, session, task }
}

fn pick_up(task: &Task) -> DragEvent {
    DragEvent::Started {
        task_id: task.id.clone(),
        column_id: task.column_id.clone(),
    }
}

fn drop_on(column: &str) -> DragEvent {
    DragEvent::Dropped {
        column_id: ColumnId::new(column),
    }
}

fn lane_titles(session: &Session) -> Vec<(String, Vec<String>)> {
    session
        .lanes()
        .into_iter()
        .map(|lane| {
            (
                lane.column.id.to_string(),
                lane.tasks.into_iter().map(|t| t.title).collect(),
            )
        })
        .collect()
}

#[tokio::test]
async fn drop_on_other_column_moves_task() {
    let Board {
        hub,
        mut session,
        task,
    } = board().await;

    assert!(session.handle(pick_up(&task)).await.unwrap().is_none());
    assert!(session.drag().accepts_drop(&ColumnId::new("done")));

    let moved = session.handle(drop_on("done")).await.unwrap().unwrap();
    assert_eq!(moved.column_id, ColumnId::new("done"));
    assert_eq!(moved.position, 0);
    assert_eq!(*session.drag(), DragState::Idle);

    assert_eq!(
        lane_titles(&session),
        [
            ("todo".to_string(), vec![]),
            ("in-progress".to_string(), vec![]),
            ("done".to_string(), vec!["Drag me".to_string()]),
        ]
    );
    let server = hub.store.tasks(session.project_id()).await.unwrap();
    assert_eq!(server[0].column_id, ColumnId::new("done"));
}

#[tokio::test]
async fn drop_on_source_column_is_a_no_op() {
    let Board {
        hub,
        mut session,
        task,
    } = board().await;
    let before = hub.store.tasks(session.project_id()).await.unwrap();

    session.handle(pick_up(&task)).await.unwrap();
    assert!(session.handle(drop_on("todo")).await.unwrap().is_none());

    session.handle(pick_up(&task)).await.unwrap();
    assert!(session.handle(DragEvent::Ended).await.unwrap().is_none());
    assert!(session.handle(drop_on("done")).await.unwrap().is_none());

    assert_eq!(hub.store.tasks(session.project_id()).await.unwrap(), before);
    assert_eq!(*session.drag(), DragState::Idle);
}

#[tokio::test]
async fn drop_on_unrendered_column_is_refused() {
    let Board {
        hub,
        mut session,
        task,
    } = board().await;

    session.handle(pick_up(&task)).await.unwrap();
    let err = session.handle(drop_on("archive")).await.unwrap_err();
    assert!(matches!(err, BoardError::UnknownColumn(ref c) if c.as_str() == "archive"));

    let server = hub.store.tasks(session.project_id()).await.unwrap();
    assert_eq!(server[0].column_id, ColumnId::new("todo"));
    assert_eq!(lane_titles(&session)[0].1, ["Drag me"]);
}

#[tokio::test]
async fn rejected_move_stays_in_source_column() {
    let Board {
        hub,
        mut session,
        task,
    } = board().await;
    // Someone else deleted the task; the local copy is stale.
    hub.store.delete_task(&task.id).await.unwrap();

    session.handle(pick_up(&task)).await.unwrap();
    let err = session.handle(drop_on("done")).await.unwrap_err();
    let BoardError::Store(StoreError::Rejected { source, .. }) = &err else {
        panic!("expected a store rejection, got {err:?}");
    };
    assert_eq!(source.status(), Some(404));
    assert_eq!(lane_titles(&session)[0].1, ["Drag me"]);
}
