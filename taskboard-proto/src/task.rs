//! Task model and request bodies.
//!
//! `Task` is the server's representation, mirrored client-side. `TaskDraft`,
//! `TaskPatch` and `MoveTask` are the bodies of the create, update and move
//! endpoints. `TaskPatch` doubles as the payload of realtime `task:updated`
//! events, where it is applied as a shallow merge.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{ColumnId, ProjectId, TaskId, UserId};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Needs attention first.
    High,
    /// The default for new tasks.
    #[default]
    Medium,
    /// Can wait.
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// A unit of work on a project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Column the task currently sits in. Always a column of `project_id`.
    pub column_id: ColumnId,
    /// Short title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordering key within the column (lower sorts first).
    #[serde(default)]
    pub position: u32,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Assigned user, if any.
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    /// Due date, if any.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Completion timestamp; `None` while the task is open.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates an open, medium-priority task at position 0.
    pub fn new(
        id: impl Into<TaskId>,
        project_id: impl Into<ProjectId>,
        column_id: impl Into<ColumnId>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_id: project_id.into(),
            column_id: column_id.into(),
            title: title.into(),
            description: None,
            position: 0,
            priority: Priority::default(),
            tags: BTreeSet::new(),
            assignee_id: None,
            due_date: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the task has a completion timestamp.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Body of `POST /tasks/projects/{projectId}/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Task title (required, non-empty).
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target column; the backend picks the first column when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Initial assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<UserId>,
    /// Due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    /// A draft with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Places the new task in `column`.
    #[must_use]
    pub fn in_column(mut self, column: impl Into<ColumnId>) -> Self {
        self.column_id = Some(column.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Title validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Title is empty or only whitespace.
    #[error("task title cannot be empty")]
    Empty,
    /// Title exceeds [`MAX_TASK_TITLE_LENGTH`] characters.
    #[error("task title too long (max {MAX_TASK_TITLE_LENGTH} characters)")]
    TooLong,
}

/// Checks a task title against the length rules.
///
/// # Errors
///
/// Returns [`TitleError::Empty`] or [`TitleError::TooLong`].
pub fn validate_title(title: &str) -> Result<(), TitleError> {
    if title.trim().is_empty() {
        return Err(TitleError::Empty);
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(TitleError::TooLong);
    }
    Ok(())
}

/// Partial task update.
///
/// Absent fields are left untouched. Nullable fields are tri-state: absent
/// (`None`), explicitly cleared (`Some(None)`, wire `null`), or set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description, or `null` to clear.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub description: Option<Option<String>>,
    /// New column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
    /// New position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// New assignee, or `null` to unassign.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub assignee_id: Option<Option<UserId>>,
    /// New due date, or `null` to clear.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// New completion timestamp, or `null` to reopen.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    /// Server modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Maps a present JSON value (including `null`) to `Some`, so that a
/// missing field (handled by `default`) stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets or clears the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Sets or clears the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: Option<UserId>) -> Self {
        self.assignee_id = Some(assignee);
        self
    }

    /// Sets or clears the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due: Option<DateTime<Utc>>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merges the present fields into `task`.
    ///
    /// Applying the same patch twice leaves the task as after one application.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(column_id) = &self.column_id {
            task.column_id = column_id.clone();
        }
        if let Some(position) = self.position {
            task.position = position;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tags) = &self.tags {
            task.tags.clone_from(tags);
        }
        if let Some(assignee_id) = &self.assignee_id {
            task.assignee_id.clone_from(assignee_id);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(updated_at) = self.updated_at {
            task.updated_at = updated_at;
        }
    }
}

/// Body of `PATCH /tasks/{taskId}/move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTask {
    /// Destination column.
    pub column_id: ColumnId,
    /// Destination position within the column.
    pub position: u32,
}
