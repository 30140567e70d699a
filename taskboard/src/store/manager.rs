//! Optimistic task store.
//!
//! Every mutation follows the same cycle: apply locally, issue the request,
//! then either keep the change (and announce it) or roll back exactly the
//! task that was touched (and report the failure). The state lock is only
//! held for the synchronous apply and rollback steps.

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use parking_lot::Mutex;

use taskboard_proto::task::{TitleError, validate_title};
use taskboard_proto::{
    Column, ColumnId, MoveTask, ProjectId, ServerEvent, Task, TaskDraft, TaskId, TaskPatch, UserId,
};

use super::messages::{MutationKind, Notice, Notifier, TracingNotifier, describe_failure};
use super::state::{BoardState, Mutation};
use crate::api::{ApiError, ApiResult, TaskApi};

/// Errors returned by [`TaskStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The server rejected the request; local state was rolled back.
    #[error("{message}")]
    Rejected {
        /// Which operation failed.
        kind: MutationKind,
        /// The message shown to the user.
        message: String,
        /// The underlying API failure.
        #[source]
        source: ApiError,
    },

    /// The draft was refused before any request was made.
    #[error("invalid task: {0}")]
    InvalidTitle(#[from] TitleError),
}

impl StoreError {
    /// The API failure behind a rejection.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Rejected { source, .. } => Some(source),
            Self::InvalidTitle(_) => None,
        }
    }
}

/// Client-side cache of project tasks with optimistic mutations.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct TaskStore<A, N = TracingNotifier> {
    api: A,
    notifier: N,
    state: Mutex<BoardState>,
    columns: Mutex<HashMap<ProjectId, Vec<Column>>>,
}

impl<A, N> std::fmt::Debug for TaskStore<A, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<A: TaskApi, N: Notifier> TaskStore<A, N> {
    /// Creates an empty store.
    pub fn new(api: A, notifier: N) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(BoardState::new()),
            columns: Mutex::new(HashMap::new()),
        }
    }

    /// The API this store talks to.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Fetches a project's tasks and replaces the local list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] if the request fails; the previous
    /// list is kept.
    pub async fn load_project(&self, project_id: &ProjectId) -> Result<Vec<Task>, StoreError> {
        match self.api.list_tasks(project_id).await {
            Ok(tasks) => {
                tracing::debug!(%project_id, count = tasks.len(), "tasks loaded");
                self.state
                    .lock()
                    .replace_project(project_id.clone(), tasks.clone());
                Ok(tasks)
            }
            Err(err) => Err(self.reject(MutationKind::LoadTasks, err)),
        }
    }

    /// Fetches a project's columns, ordered by position.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] if the request fails.
    pub async fn load_columns(&self, project_id: &ProjectId) -> Result<Vec<Column>, StoreError> {
        match self.api.list_columns(project_id).await {
            Ok(mut columns) => {
                columns.sort_by_key(|c| c.position);
                self.columns
                    .lock()
                    .insert(project_id.clone(), columns.clone());
                Ok(columns)
            }
            Err(err) => Err(self.reject(MutationKind::LoadColumns, err)),
        }
    }

    /// Creates a task. Not optimistic: the server's task is inserted once
    /// the request succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTitle`] without a request for a bad
    /// title, or [`StoreError::Rejected`] if the server refuses.
    pub async fn create_task(
        &self,
        project_id: &ProjectId,
        draft: TaskDraft,
    ) -> Result<Task, StoreError> {
        validate_title(&draft.title)?;
        match self.api.create_task(project_id, &draft).await {
            Ok(task) => {
                self.state.lock().upsert(project_id, task.clone());
                self.announce(MutationKind::Create);
                Ok(task)
            }
            Err(err) => Err(self.reject(MutationKind::Create, err)),
        }
    }

    /// Updates task fields optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after rolling the task back.
    pub async fn update_task(&self, task_id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let request = self.api.update_task(task_id, &patch);
        let mutation = Mutation::Update {
            task_id: task_id.clone(),
            patch: patch.clone(),
        };
        self.run_optimistic(MutationKind::Update, mutation, request)
            .await
    }

    /// Assigns or unassigns a task. An update that only touches the assignee.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after rolling the task back.
    pub async fn assign_task(
        &self,
        task_id: &TaskId,
        assignee: Option<UserId>,
    ) -> Result<Task, StoreError> {
        self.update_task(task_id, TaskPatch::default().with_assignee(assignee))
            .await
    }

    /// Moves a task to `column_id` at `position` optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after moving the task back.
    pub async fn move_task(
        &self,
        task_id: &TaskId,
        column_id: ColumnId,
        position: u32,
    ) -> Result<Task, StoreError> {
        let target = MoveTask {
            column_id: column_id.clone(),
            position,
        };
        let request = self.api.move_task(task_id, &target);
        let mutation = Mutation::Move {
            task_id: task_id.clone(),
            column_id,
            position,
        };
        self.run_optimistic(MutationKind::Move, mutation, request)
            .await
    }

    /// Deletes a task optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after re-inserting the task.
    pub async fn delete_task(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let mutation = Mutation::Delete {
            task_id: task_id.clone(),
        };
        self.run_optimistic(MutationKind::Delete, mutation, self.api.delete_task(task_id))
            .await
    }

    /// Marks a task completed now, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after rolling the task back.
    pub async fn complete_task(&self, task_id: &TaskId) -> Result<Task, StoreError> {
        let mutation = Mutation::Complete {
            task_id: task_id.clone(),
            at: Utc::now(),
        };
        self.run_optimistic(
            MutationKind::Complete,
            mutation,
            self.api.complete_task(task_id),
        )
        .await
    }

    /// Reopens a completed task, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] after rolling the task back.
    pub async fn uncomplete_task(&self, task_id: &TaskId) -> Result<Task, StoreError> {
        let mutation = Mutation::Uncomplete {
            task_id: task_id.clone(),
        };
        self.run_optimistic(
            MutationKind::Uncomplete,
            mutation,
            self.api.uncomplete_task(task_id),
        )
        .await
    }

    /// Merges a realtime event into local state. Returns `true` if anything
    /// changed.
    pub fn apply_remote(&self, event: &ServerEvent) -> bool {
        let changed = self.state.lock().apply_event(event);
        if changed {
            tracing::trace!(kind = %event.kind(), "remote event applied");
        }
        changed
    }

    /// Current tasks of a project.
    #[must_use]
    pub fn tasks(&self, project_id: &ProjectId) -> Vec<Task> {
        self.state.lock().tasks(project_id).to_vec()
    }

    /// Looks up a single task.
    #[must_use]
    pub fn task(&self, task_id: &TaskId) -> Option<Task> {
        self.state.lock().find(task_id).cloned()
    }

    /// Loaded columns of a project, if any.
    #[must_use]
    pub fn columns(&self, project_id: &ProjectId) -> Option<Vec<Column>> {
        self.columns.lock().get(project_id).cloned()
    }

    /// A copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> BoardState {
        self.state.lock().clone()
    }

    async fn run_optimistic<T, F>(
        &self,
        kind: MutationKind,
        mutation: Mutation,
        request: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = ApiResult<T>> + Send,
    {
        let rollback = self.state.lock().apply(&mutation);
        tracing::debug!(%kind, task_id = %mutation.task_id(), "optimistic change applied");

        match request.await {
            Ok(value) => {
                self.announce(kind);
                Ok(value)
            }
            Err(err) => {
                self.state.lock().rollback(rollback);
                Err(self.reject(kind, err))
            }
        }
    }

    fn announce(&self, kind: MutationKind) {
        if let Some(message) = kind.success_message() {
            self.notifier.notify(Notice::success(message));
        }
    }

    fn reject(&self, kind: MutationKind, source: ApiError) -> StoreError {
        let message = describe_failure(kind, &source);
        tracing::warn!(%kind, err = %source, "request failed");
        self.notifier.notify(Notice::error(message.clone()));
        StoreError::Rejected {
            kind,
            message,
            source,
        }
    }
}
