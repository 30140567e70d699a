//! A board view of one project.

use std::sync::Arc;

use taskboard_proto::{Column, ColumnId, ProjectId, Task, default_columns};

use super::{DragEffect, DragEvent, DragState};
use crate::api::TaskApi;
use crate::store::{Notifier, StoreError, TaskStore};

/// Errors from board interactions.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The drop target is not one of the rendered columns.
    #[error("unknown column: {0}")]
    UnknownColumn(ColumnId),

    /// The store refused the move and rolled it back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One rendered column and its tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    /// The column.
    pub column: Column,
    /// Its tasks, ordered by position.
    pub tasks: Vec<Task>,
}

/// Rendered columns, drag state and the store behind one project board.
pub struct BoardSession<A, N> {
    project_id: ProjectId,
    columns: Vec<Column>,
    drag: DragState,
    store: Arc<TaskStore<A, N>>,
}

impl<A: TaskApi, N: Notifier> BoardSession<A, N> {
    /// Opens a board with the default column set.
    pub fn new(project_id: ProjectId, store: Arc<TaskStore<A, N>>) -> Self {
        let columns = default_columns(&project_id);
        Self {
            project_id,
            columns,
            drag: DragState::Idle,
            store,
        }
    }

    /// Loads columns and tasks. Columns fall back to the defaults when the
    /// server has none or the column request fails.
    ///
    /// # Errors
    ///
    /// Returns the task load failure. A column load failure alone is logged.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        match self.store.load_columns(&self.project_id).await {
            Ok(columns) if !columns.is_empty() => self.columns = columns,
            Ok(_) => tracing::debug!(project_id = %self.project_id, "no columns, keeping defaults"),
            Err(e) => tracing::warn!(project_id = %self.project_id, err = %e, "keeping default columns"),
        }
        self.store.load_project(&self.project_id).await?;
        Ok(())
    }

    /// The board's project.
    #[must_use]
    pub const fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// The rendered columns, left to right.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Current drag gesture.
    #[must_use]
    pub const fn drag(&self) -> &DragState {
        &self.drag
    }

    /// Feeds a drag event through the reducer and submits the resulting
    /// move, if any, at position 0. Returns the server's task for a move.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::UnknownColumn`] for a drop outside the rendered
    /// columns, or [`BoardError::Store`] if the move was rejected.
    pub async fn handle(&mut self, event: DragEvent) -> Result<Option<Task>, BoardError> {
        let (next, effect) = std::mem::take(&mut self.drag).reduce(event);
        self.drag = next;

        let Some(DragEffect::MoveTask { task_id, from, to }) = effect else {
            return Ok(None);
        };
        if !self.columns.iter().any(|c| c.id == to) {
            tracing::warn!(%task_id, column_id = %to, "drop on unknown column");
            return Err(BoardError::UnknownColumn(to));
        }
        tracing::debug!(%task_id, %from, %to, "moving task");
        let task = self.store.move_task(&task_id, to, 0).await?;
        Ok(Some(task))
    }

    /// Tasks grouped into the rendered columns. Tasks in columns that are
    /// not rendered are left out.
    #[must_use]
    pub fn lanes(&self) -> Vec<Lane> {
        let tasks = self.store.tasks(&self.project_id);
        self.columns
            .iter()
            .map(|column| {
                let mut lane: Vec<Task> = tasks
                    .iter()
                    .filter(|t| t.column_id == column.id)
                    .cloned()
                    .collect();
                lane.sort_by_key(|t| t.position);
                Lane {
                    column: column.clone(),
                    tasks: lane,
                }
            })
            .collect()
    }
}

impl<A, N> std::fmt::Debug for BoardSession<A, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("project_id", &self.project_id)
            .field("columns", &self.columns.len())
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}
