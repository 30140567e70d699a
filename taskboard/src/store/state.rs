//! Pure board state with per-task undo.
//!
//! [`BoardState::apply`] performs an optimistic [`Mutation`] and hands back
//! a [`Rollback`] that captures only the task it touched. Restoring a
//! rollback never disturbs other tasks, so concurrent mutations and
//! realtime merges on different tasks survive each other's failures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use taskboard_proto::{ColumnId, ProjectId, ServerEvent, Task, TaskId, TaskPatch};

/// An optimistic change to a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Shallow-merge `patch` into the task.
    Update {
        /// Target task.
        task_id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Move the task to another column.
    Move {
        /// Target task.
        task_id: TaskId,
        /// Destination column.
        column_id: ColumnId,
        /// Destination position.
        position: u32,
    },
    /// Remove the task.
    Delete {
        /// Target task.
        task_id: TaskId,
    },
    /// Mark the task completed at `at`.
    Complete {
        /// Target task.
        task_id: TaskId,
        /// Completion time.
        at: DateTime<Utc>,
    },
    /// Clear the completion timestamp.
    Uncomplete {
        /// Target task.
        task_id: TaskId,
    },
}

impl Mutation {
    /// The task this mutation targets.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Update { task_id, .. }
            | Self::Move { task_id, .. }
            | Self::Delete { task_id }
            | Self::Complete { task_id, .. }
            | Self::Uncomplete { task_id } => task_id,
        }
    }
}

/// Undo token returned by [`BoardState::apply`].
#[must_use = "dropping a rollback makes the optimistic change permanent"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// The task was not known locally; nothing to undo.
    Untouched,
    /// Put back the previous version of a task that still exists.
    Restore {
        /// Project holding the task.
        project_id: ProjectId,
        /// Version before the mutation.
        task: Task,
    },
    /// Re-insert a deleted task at its old index.
    Reinsert {
        /// Project the task was removed from.
        project_id: ProjectId,
        /// Index the task occupied.
        index: usize,
        /// The removed task.
        task: Task,
    },
}

/// Task lists keyed by project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    projects: HashMap<ProjectId, Vec<Task>>,
}

impl BoardState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks of `project_id` in server order; empty if the project is not loaded.
    #[must_use]
    pub fn tasks(&self, project_id: &ProjectId) -> &[Task] {
        self.projects.get(project_id).map_or(&[], Vec::as_slice)
    }

    /// Looks a task up by id across all projects.
    #[must_use]
    pub fn find(&self, task_id: &TaskId) -> Option<&Task> {
        self.projects
            .values()
            .flat_map(|tasks| tasks.iter())
            .find(|task| task.id == *task_id)
    }

    /// Replaces a project's task list with a freshly loaded one.
    pub fn replace_project(&mut self, project_id: ProjectId, tasks: Vec<Task>) {
        self.projects.insert(project_id, tasks);
    }

    /// Inserts `task` into its project, replacing any task with the same id.
    /// Returns `true` if the task was new.
    pub fn upsert(&mut self, project_id: &ProjectId, task: Task) -> bool {
        let tasks = self.projects.entry(project_id.clone()).or_default();
        if let Some(existing) = tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
            false
        } else {
            tasks.push(task);
            true
        }
    }

    fn locate(&self, task_id: &TaskId) -> Option<(&ProjectId, usize)> {
        self.projects.iter().find_map(|(project_id, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == *task_id)
                .map(|index| (project_id, index))
        })
    }

    fn task_mut(&mut self, task_id: &TaskId) -> Option<&mut Task> {
        self.projects
            .values_mut()
            .flat_map(|tasks| tasks.iter_mut())
            .find(|task| task.id == *task_id)
    }

    /// Applies `mutation` and returns the token that undoes it.
    pub fn apply(&mut self, mutation: &Mutation) -> Rollback {
        let Some((project_id, index)) = self.locate(mutation.task_id()) else {
            tracing::debug!(task_id = %mutation.task_id(), "mutation on unknown task");
            return Rollback::Untouched;
        };
        let project_id = project_id.clone();
        let Some(tasks) = self.projects.get_mut(&project_id) else {
            return Rollback::Untouched;
        };

        if let Mutation::Delete { .. } = mutation {
            let task = tasks.remove(index);
            return Rollback::Reinsert {
                project_id,
                index,
                task,
            };
        }

        let task = &mut tasks[index];
        let previous = task.clone();
        match mutation {
            Mutation::Update { patch, .. } => patch.apply_to(task),
            Mutation::Move {
                column_id,
                position,
                ..
            } => {
                task.column_id = column_id.clone();
                task.position = *position;
            }
            Mutation::Complete { at, .. } => task.completed_at = Some(*at),
            Mutation::Uncomplete { .. } => task.completed_at = None,
            Mutation::Delete { .. } => {}
        }
        Rollback::Restore {
            project_id,
            task: previous,
        }
    }

    /// Undoes a previous [`apply`](Self::apply).
    ///
    /// A restored task is only written back if it still exists; a task
    /// deleted remotely in the meantime stays deleted. A re-inserted task is
    /// skipped if a task with its id reappeared.
    pub fn rollback(&mut self, rollback: Rollback) {
        match rollback {
            Rollback::Untouched => {}
            Rollback::Restore { project_id, task } => {
                if let Some(slot) = self
                    .projects
                    .get_mut(&project_id)
                    .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task.id))
                {
                    *slot = task;
                }
            }
            Rollback::Reinsert {
                project_id,
                index,
                task,
            } => {
                let tasks = self.projects.entry(project_id).or_default();
                if tasks.iter().all(|t| t.id != task.id) {
                    let index = index.min(tasks.len());
                    tasks.insert(index, task);
                }
            }
        }
    }

    /// Merges a realtime event. Returns `true` if local state changed.
    ///
    /// Only the four task lifecycle events are merged; others are ignored.
    pub fn apply_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::TaskCreated(created) => {
                let before = self.find(&created.task.id).cloned();
                self.upsert(&created.project_id, created.task.clone());
                before.as_ref() != Some(&created.task)
            }
            ServerEvent::TaskUpdated(updated) => {
                let mut changed = false;
                for task in self
                    .projects
                    .values_mut()
                    .flat_map(|tasks| tasks.iter_mut())
                    .filter(|task| task.id == updated.task_id)
                {
                    let before = task.clone();
                    updated.updates.apply_to(task);
                    changed |= *task != before;
                }
                changed
            }
            ServerEvent::TaskDeleted(deleted) => {
                let mut changed = false;
                for tasks in self.projects.values_mut() {
                    let len = tasks.len();
                    tasks.retain(|t| t.id != deleted.task_id);
                    changed |= tasks.len() != len;
                }
                changed
            }
            ServerEvent::TaskMoved(moved) => self.task_mut(&moved.task_id).is_some_and(|task| {
                let changed = task.column_id != moved.column_id || task.position != moved.position;
                task.column_id = moved.column_id.clone();
                task.position = moved.position;
                changed
            }),
            ServerEvent::PresenceChanged(_)
            | ServerEvent::TypingChanged(_)
            | ServerEvent::CommentCreated(_) => false,
        }
    }
}
