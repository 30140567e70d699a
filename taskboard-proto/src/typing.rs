//! Typing indicators for task comments.

use serde::{Deserialize, Serialize};

use crate::ids::{ProjectId, TaskId, UserId};

/// Payload of `typing:changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingMessage {
    /// The user who is typing (or stopped typing).
    pub user_id: UserId,
    /// Project the user is in.
    pub project_id: ProjectId,
    /// Task being commented on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Whether the user is currently typing (`true`) or stopped (`false`).
    pub is_typing: bool,
}
