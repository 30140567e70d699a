//! Property tests for merging realtime events into local board state.
//!
//! Uses proptest to verify:
//! 1. Applying a `task:updated` event twice equals applying it once.
//! 2. A repeated `task:created` never duplicates the task.
//! 3. A repeated `task:moved` reports no change the second time.
//! 4. A `task:deleted` for an unknown task leaves state untouched.
//! 5. An update only touches the fields present in the patch.

use proptest::prelude::*;
use taskboard::store::BoardState;
use taskboard_proto::event::{TaskCreated, TaskDeleted, TaskMoved, TaskUpdated};
use taskboard_proto::{Priority, ProjectId, ServerEvent, Task, TaskPatch};

const COLUMNS: [&str; 3] = ["todo", "in-progress", "done"];

fn project() -> ProjectId {
    ProjectId::new("p1")
}

/// A board with `n` tasks spread over the default columns.
fn board(n: usize) -> BoardState {
    let tasks = (0..n)
        .map(|i| {
            let mut task = Task::new(format!("t{i}"), "p1", COLUMNS[i % 3], format!("Task {i}"));
            task.position = u32::try_from(i / 3).unwrap();
            task
        })
        .collect();
    let mut state = BoardState::new();
    state.replace_project(project(), tasks);
    state
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
    ]
}

fn arb_patch() -> impl Strategy<Value = TaskPatch> {
    (
        proptest::option::of("[a-zA-Z ]{1,32}"),
        proptest::option::of(proptest::option::of("[a-z ]{0,32}")),
        proptest::option::of(arb_priority()),
        proptest::option::of(proptest::sample::select(COLUMNS.to_vec())),
    )
        .prop_map(|(title, description, priority, column)| TaskPatch {
            title,
            description,
            priority,
            column_id: column.map(Into::into),
            ..TaskPatch::default()
        })
}

fn updated(index: usize, patch: TaskPatch) -> ServerEvent {
    ServerEvent::TaskUpdated(TaskUpdated {
        project_id: project(),
        task_id: format!("t{index}").into(),
        updates: patch,
    })
}

proptest! {
    #[test]
    fn update_is_idempotent(n in 1usize..12, pick in any::<prop::sample::Index>(), patch in arb_patch()) {
        let event = updated(pick.index(n), patch);
        let mut once = board(n);
        once.apply_event(&event);
        let mut twice = once.clone();
        prop_assert!(!twice.apply_event(&event));
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn update_touches_only_patched_fields(
        n in 1usize..12,
        pick in any::<prop::sample::Index>(),
        priority in arb_priority(),
    ) {
        let index = pick.index(n);
        let mut state = board(n);
        let before = state.tasks(&project()).to_vec();
        state.apply_event(&updated(index, TaskPatch::default().with_priority(priority)));

        for (old, new) in before.iter().zip(state.tasks(&project())) {
            if new.id == before[index].id {
                prop_assert_eq!(new.priority, priority);
                prop_assert_eq!(&new.title, &old.title);
                prop_assert_eq!(&new.column_id, &old.column_id);
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn repeated_create_never_duplicates(n in 0usize..12, title in "[a-zA-Z ]{1,32}") {
        let mut state = board(n);
        let event = ServerEvent::TaskCreated(TaskCreated {
            project_id: project(),
            task: Task::new("fresh", "p1", "todo", title),
        });
        prop_assert!(state.apply_event(&event));
        prop_assert!(!state.apply_event(&event));
        prop_assert_eq!(state.tasks(&project()).len(), n + 1);
    }

    #[test]
    fn repeated_move_reports_no_change(
        n in 1usize..12,
        pick in any::<prop::sample::Index>(),
        column in proptest::sample::select(COLUMNS.to_vec()),
        position in 0u32..20,
    ) {
        let mut state = board(n);
        let event = ServerEvent::TaskMoved(TaskMoved {
            project_id: project(),
            task_id: format!("t{}", pick.index(n)).into(),
            column_id: column.into(),
            position,
        });
        state.apply_event(&event);
        let settled = state.clone();
        prop_assert!(!state.apply_event(&event));
        prop_assert_eq!(state, settled);
    }

    #[test]
    fn deleting_unknown_task_is_a_no_op(n in 0usize..12) {
        let mut state = board(n);
        let before = state.clone();
        let event = ServerEvent::TaskDeleted(TaskDeleted {
            project_id: project(),
            task_id: "missing".into(),
        });
        prop_assert!(!state.apply_event(&event));
        prop_assert_eq!(state, before);
    }
}
