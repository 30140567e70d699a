//! Kanban board interaction.
//!
//! [`DragState`] is a pure reducer over drag gestures. It decides whether a
//! drop produces a move; [`session::BoardSession`] carries the move out
//! through the store.

pub mod session;

pub use session::{BoardError, BoardSession, Lane};

use taskboard_proto::{ColumnId, TaskId};

/// Drag gesture input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    /// The user picked up a task from `column_id`.
    Started {
        /// Task being dragged.
        task_id: TaskId,
        /// Column it was picked up from.
        column_id: ColumnId,
    },
    /// The task was released over `column_id`.
    Dropped {
        /// Column under the pointer.
        column_id: ColumnId,
    },
    /// The gesture finished, with or without a drop.
    Ended,
}

/// Side effect requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEffect {
    /// Move `task_id` from `from` to `to`.
    MoveTask {
        /// Dragged task.
        task_id: TaskId,
        /// Source column.
        from: ColumnId,
        /// Target column.
        to: ColumnId,
    },
}

/// Current drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// Nothing is being dragged.
    #[default]
    Idle,
    /// A task is being dragged.
    Dragging {
        /// Dragged task.
        task_id: TaskId,
        /// Column it was picked up from.
        from: ColumnId,
    },
}

impl DragState {
    /// Advances the gesture.
    ///
    /// A drop onto the source column, or with nothing dragged, is a no-op.
    #[must_use]
    pub fn reduce(self, event: DragEvent) -> (Self, Option<DragEffect>) {
        match (self, event) {
            (_, DragEvent::Started { task_id, column_id }) => (
                Self::Dragging {
                    task_id,
                    from: column_id,
                },
                None,
            ),
            (Self::Dragging { task_id, from }, DragEvent::Dropped { column_id }) => {
                if from == column_id {
                    (Self::Idle, None)
                } else {
                    (
                        Self::Idle,
                        Some(DragEffect::MoveTask {
                            task_id,
                            from,
                            to: column_id,
                        }),
                    )
                }
            }
            (Self::Idle, DragEvent::Dropped { .. }) | (_, DragEvent::Ended) => (Self::Idle, None),
        }
    }

    /// Returns `true` if releasing over `column` would move the dragged task.
    #[must_use]
    pub fn accepts_drop(&self, column: &ColumnId) -> bool {
        matches!(self, Self::Dragging { from, .. } if from != column)
    }

    /// The task being dragged, if any.
    #[must_use]
    pub const fn dragged_task(&self) -> Option<&TaskId> {
        match self {
            Self::Dragging { task_id, .. } => Some(task_id),
            Self::Idle => None,
        }
    }
}
