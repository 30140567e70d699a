//! Client-side task cache with optimistic updates and realtime merging.

pub mod manager;
pub mod messages;
pub mod state;

pub use manager::{StoreError, TaskStore};
pub use messages::{ChannelNotifier, MutationKind, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use state::{BoardState, Mutation, Rollback};
