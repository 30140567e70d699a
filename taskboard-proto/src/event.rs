//! Realtime events exchanged over the project WebSocket.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`. Server→client events are
//! [`ServerEvent`]; client→server requests are [`ClientEvent`].

use serde::{Deserialize, Serialize};

use crate::board::Comment;
use crate::ids::{ColumnId, ProjectId, TaskId};
use crate::presence::PresenceMessage;
use crate::task::{Task, TaskPatch};
use crate::typing::TypingMessage;

/// Payload of `task:created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    /// Project the task was created in.
    pub project_id: ProjectId,
    /// The full task as stored by the server.
    pub task: Task,
}

/// Payload of `task:updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdated {
    /// Project of the task.
    pub project_id: ProjectId,
    /// Updated task.
    pub task_id: TaskId,
    /// Changed fields only.
    pub updates: TaskPatch,
}

/// Payload of `task:deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    /// Project of the task.
    pub project_id: ProjectId,
    /// Removed task.
    pub task_id: TaskId,
}

/// Payload of `task:moved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMoved {
    /// Project of the task.
    pub project_id: ProjectId,
    /// Moved task.
    pub task_id: TaskId,
    /// Destination column.
    pub column_id: ColumnId,
    /// Destination position.
    pub position: u32,
}

/// Payload of `comment:created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    /// Project of the commented task.
    pub project_id: ProjectId,
    /// Commented task.
    pub task_id: TaskId,
    /// The new comment.
    pub comment: Comment,
}

/// Events pushed by the server to members of a project room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A task was created.
    #[serde(rename = "task:created")]
    TaskCreated(TaskCreated),
    /// Some fields of a task changed.
    #[serde(rename = "task:updated")]
    TaskUpdated(TaskUpdated),
    /// A task was deleted.
    #[serde(rename = "task:deleted")]
    TaskDeleted(TaskDeleted),
    /// A task changed column or position.
    #[serde(rename = "task:moved")]
    TaskMoved(TaskMoved),
    /// A user's presence changed.
    #[serde(rename = "presence:changed")]
    PresenceChanged(PresenceMessage),
    /// A user started or stopped typing.
    #[serde(rename = "typing:changed")]
    TypingChanged(TypingMessage),
    /// A comment was posted.
    #[serde(rename = "comment:created")]
    CommentCreated(CommentCreated),
}

/// Discriminant of [`ServerEvent`], used as the handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `task:created`
    TaskCreated,
    /// `task:updated`
    TaskUpdated,
    /// `task:deleted`
    TaskDeleted,
    /// `task:moved`
    TaskMoved,
    /// `presence:changed`
    PresenceChanged,
    /// `typing:changed`
    TypingChanged,
    /// `comment:created`
    CommentCreated,
}

impl EventKind {
    /// Every event kind, in wire-name order.
    pub const ALL: [Self; 7] = [
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TaskMoved,
        Self::PresenceChanged,
        Self::TypingChanged,
        Self::CommentCreated,
    ];

    /// The event name used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TaskCreated => "task:created",
            Self::TaskUpdated => "task:updated",
            Self::TaskDeleted => "task:deleted",
            Self::TaskMoved => "task:moved",
            Self::PresenceChanged => "presence:changed",
            Self::TypingChanged => "typing:changed",
            Self::CommentCreated => "comment:created",
        }
    }

    /// Returns `true` for the four task lifecycle events.
    #[must_use]
    pub const fn is_task_event(self) -> bool {
        matches!(
            self,
            Self::TaskCreated | Self::TaskUpdated | Self::TaskDeleted | Self::TaskMoved
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ServerEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TaskCreated(_) => EventKind::TaskCreated,
            Self::TaskUpdated(_) => EventKind::TaskUpdated,
            Self::TaskDeleted(_) => EventKind::TaskDeleted,
            Self::TaskMoved(_) => EventKind::TaskMoved,
            Self::PresenceChanged(_) => EventKind::PresenceChanged,
            Self::TypingChanged(_) => EventKind::TypingChanged,
            Self::CommentCreated(_) => EventKind::CommentCreated,
        }
    }

    /// The project this event is scoped to. Presence is user-scoped.
    #[must_use]
    pub const fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::TaskCreated(e) => Some(&e.project_id),
            Self::TaskUpdated(e) => Some(&e.project_id),
            Self::TaskDeleted(e) => Some(&e.project_id),
            Self::TaskMoved(e) => Some(&e.project_id),
            Self::TypingChanged(e) => Some(&e.project_id),
            Self::CommentCreated(e) => Some(&e.project_id),
            Self::PresenceChanged(_) => None,
        }
    }
}

/// Requests sent by the client over the realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to a project room.
    #[serde(rename = "join:project")]
    JoinProject(ProjectId),
    /// Unsubscribe from a project room.
    #[serde(rename = "leave:project")]
    LeaveProject(ProjectId),
}
