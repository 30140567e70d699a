//! Projects, columns and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ColumnId, CommentId, ProjectId, TaskId, UserId};

/// A project: the scope of a board and of a realtime room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Server-assigned identifier.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional accent color (CSS hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Project {
    /// A project with only a name.
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            color: None,
        }
    }
}

/// A named workflow state within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column identifier, unique within the project.
    pub id: ColumnId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Display title.
    pub title: String,
    /// Accent color (CSS hex).
    pub color: String,
    /// Left-to-right order.
    pub position: u32,
}

/// The fixed column set used before a project's columns are loaded, and
/// seeded into new projects by the hub.
#[must_use]
pub fn default_columns(project_id: &ProjectId) -> Vec<Column> {
    [
        ("todo", "To Do", "#94a3b8"),
        ("in-progress", "In Progress", "#3b82f6"),
        ("done", "Done", "#22c55e"),
    ]
    .into_iter()
    .zip(0u32..)
    .map(|((id, title, color), position)| Column {
        id: ColumnId::new(id),
        project_id: project_id.clone(),
        title: title.to_string(),
        color: color.to_string(),
        position,
    })
    .collect()
}

/// A comment attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server-assigned identifier.
    pub id: CommentId,
    /// Task the comment belongs to.
    pub task_id: TaskId,
    /// Author.
    pub author_id: UserId,
    /// Comment text.
    pub body: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
