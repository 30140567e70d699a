//! In-memory projects, columns and tasks.
//!
//! Every project gets the default column set on creation. Ids are UUID v7
//! strings, so they sort by creation time.

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use taskboard_proto::task::validate_title;
use taskboard_proto::{
    Column, ColumnId, MoveTask, Project, ProjectId, Task, TaskDraft, TaskId, TaskPatch,
    default_columns,
};

use crate::error::HubError;

#[derive(Debug)]
struct ProjectEntry {
    project: Project,
    columns: Vec<Column>,
    tasks: Vec<Task>,
}

impl ProjectEntry {
    fn has_column(&self, column_id: &ColumnId) -> bool {
        self.columns.iter().any(|c| c.id == *column_id)
    }

    fn next_position(&self, column_id: &ColumnId) -> u32 {
        let count = self.tasks.iter().filter(|t| t.column_id == *column_id).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Result of a task update: the stored task and the patch to broadcast.
#[derive(Debug, Clone)]
pub struct Updated {
    /// Project of the task.
    pub project_id: ProjectId,
    /// The task after the update.
    pub task: Task,
    /// Fields that changed, including the new `updatedAt`.
    pub patch: TaskPatch,
}

/// Thread-safe board data, in project creation order.
#[derive(Debug, Default)]
pub struct BoardStore {
    projects: RwLock<Vec<ProjectEntry>>,
}

fn new_id() -> String {
    Uuid::now_v7().to_string()
}

impl BoardStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a project with the default columns.
    pub async fn create_project(&self, name: &str) -> Result<Project, HubError> {
        if name.trim().is_empty() {
            return Err(HubError::Validation("Project name cannot be empty".to_string()));
        }
        let project = Project::new(new_id(), name.trim());
        let columns = default_columns(&project.id);
        self.projects.write().await.push(ProjectEntry {
            project: project.clone(),
            columns,
            tasks: Vec::new(),
        });
        tracing::info!(project_id = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    /// All projects.
    pub async fn projects(&self) -> Vec<Project> {
        self.projects
            .read()
            .await
            .iter()
            .map(|e| e.project.clone())
            .collect()
    }

    /// Columns of a project.
    pub async fn columns(&self, project_id: &ProjectId) -> Result<Vec<Column>, HubError> {
        let projects = self.projects.read().await;
        let entry = find_project(&projects, project_id)?;
        Ok(entry.columns.clone())
    }

    /// Tasks of a project.
    pub async fn tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, HubError> {
        let projects = self.projects.read().await;
        let entry = find_project(&projects, project_id)?;
        Ok(entry.tasks.clone())
    }

    /// Creates a task at the end of its column (the first column by default).
    pub async fn create_task(
        &self,
        project_id: &ProjectId,
        draft: TaskDraft,
    ) -> Result<Task, HubError> {
        validate_title(&draft.title).map_err(|e| HubError::Validation(e.to_string()))?;

        let mut projects = self.projects.write().await;
        let entry = find_project_mut(&mut projects, project_id)?;
        let column_id = match draft.column_id {
            Some(column_id) if entry.has_column(&column_id) => column_id,
            Some(column_id) => return Err(HubError::InvalidColumn(column_id)),
            None => entry
                .columns
                .first()
                .map(|c| c.id.clone())
                .ok_or_else(|| HubError::Validation("Project has no columns".to_string()))?,
        };

        let mut task = Task::new(new_id(), project_id.clone(), column_id, draft.title);
        task.position = entry.next_position(&task.column_id);
        task.description = draft.description;
        task.priority = draft.priority;
        task.tags = draft.tags;
        task.assignee_id = draft.assignee_id;
        task.due_date = draft.due_date;
        entry.tasks.push(task.clone());
        tracing::debug!(task_id = %task.id, %project_id, "task created");
        Ok(task)
    }

    /// Applies a client patch. `updatedAt` is set by the server.
    pub async fn update_task(&self, task_id: &TaskId, patch: TaskPatch) -> Result<Updated, HubError> {
        if let Some(title) = &patch.title {
            validate_title(title).map_err(|e| HubError::Validation(e.to_string()))?;
        }
        let mut projects = self.projects.write().await;
        let entry = find_task_project(&mut projects, task_id)?;
        if let Some(column_id) = &patch.column_id
            && !entry.has_column(column_id)
        {
            return Err(HubError::InvalidColumn(column_id.clone()));
        }
        let patch = TaskPatch {
            updated_at: Some(Utc::now()),
            ..patch
        };
        let project_id = entry.project.id.clone();
        let task = task_mut(entry, task_id)?;
        patch.apply_to(task);
        Ok(Updated {
            project_id,
            task: task.clone(),
            patch,
        })
    }

    /// Moves a task. The column must belong to the task's project.
    pub async fn move_task(&self, task_id: &TaskId, target: &MoveTask) -> Result<Task, HubError> {
        let mut projects = self.projects.write().await;
        let entry = find_task_project(&mut projects, task_id)?;
        if !entry.has_column(&target.column_id) {
            return Err(HubError::InvalidColumn(target.column_id.clone()));
        }
        let task = task_mut(entry, task_id)?;
        task.column_id = target.column_id.clone();
        task.position = target.position;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Removes a task, returning its project.
    pub async fn delete_task(&self, task_id: &TaskId) -> Result<ProjectId, HubError> {
        let mut projects = self.projects.write().await;
        let entry = find_task_project(&mut projects, task_id)?;
        entry.tasks.retain(|t| t.id != *task_id);
        Ok(entry.project.id.clone())
    }

    /// Sets or clears the completion timestamp.
    pub async fn set_completed(&self, task_id: &TaskId, completed: bool) -> Result<Updated, HubError> {
        let now = Utc::now();
        let patch = TaskPatch {
            completed_at: Some(completed.then_some(now)),
            updated_at: Some(now),
            ..TaskPatch::default()
        };
        let mut projects = self.projects.write().await;
        let entry = find_task_project(&mut projects, task_id)?;
        let project_id = entry.project.id.clone();
        let task = task_mut(entry, task_id)?;
        patch.apply_to(task);
        Ok(Updated {
            project_id,
            task: task.clone(),
            patch,
        })
    }

    /// Creates a demo project with one task per column.
    pub async fn seed_demo(&self) -> Result<Project, HubError> {
        let project = self.create_project("Demo").await?;
        for (title, column) in [
            ("Sketch the board layout", "todo"),
            ("Wire up realtime sync", "in-progress"),
            ("Set up the repository", "done"),
        ] {
            self.create_task(&project.id, TaskDraft::new(title).in_column(column))
                .await?;
        }
        Ok(project)
    }
}

fn find_project<'a>(
    projects: &'a [ProjectEntry],
    project_id: &ProjectId,
) -> Result<&'a ProjectEntry, HubError> {
    projects
        .iter()
        .find(|e| e.project.id == *project_id)
        .ok_or_else(|| HubError::ProjectNotFound(project_id.clone()))
}

fn find_project_mut<'a>(
    projects: &'a mut [ProjectEntry],
    project_id: &ProjectId,
) -> Result<&'a mut ProjectEntry, HubError> {
    projects
        .iter_mut()
        .find(|e| e.project.id == *project_id)
        .ok_or_else(|| HubError::ProjectNotFound(project_id.clone()))
}

fn find_task_project<'a>(
    projects: &'a mut [ProjectEntry],
    task_id: &TaskId,
) -> Result<&'a mut ProjectEntry, HubError> {
    projects
        .iter_mut()
        .find(|e| e.tasks.iter().any(|t| t.id == *task_id))
        .ok_or_else(|| HubError::TaskNotFound(task_id.clone()))
}

fn task_mut<'a>(entry: &'a mut ProjectEntry, task_id: &TaskId) -> Result<&'a mut Task, HubError> {
    entry
        .tasks
        .iter_mut()
        .find(|t| t.id == *task_id)
        .ok_or_else(|| HubError::TaskNotFound(task_id.clone()))
}
