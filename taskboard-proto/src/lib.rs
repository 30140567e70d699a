//! Shared data model and realtime wire format for taskboard.

pub mod board;
pub mod codec;
pub mod event;
pub mod ids;
pub mod presence;
pub mod rest;
pub mod task;
pub mod typing;

pub use board::{Column, Comment, Project, default_columns};
pub use event::{ClientEvent, EventKind, ServerEvent};
pub use ids::{ColumnId, CommentId, ProjectId, TaskId, UserId};
pub use task::{MoveTask, Priority, Task, TaskDraft, TaskPatch};
