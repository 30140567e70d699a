//! User-facing notices for store operations.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::ApiError;

/// The store operations that report outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Task list load.
    LoadTasks,
    /// Column list load.
    LoadColumns,
    /// Task creation.
    Create,
    /// Field update (including reassignment).
    Update,
    /// Column move.
    Move,
    /// Deletion.
    Delete,
    /// Marking completed.
    Complete,
    /// Reopening.
    Uncomplete,
}

impl MutationKind {
    /// Message shown when the request fails without a server message.
    #[must_use]
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::LoadTasks => "Failed to load tasks",
            Self::LoadColumns => "Failed to load columns",
            Self::Create => "Failed to create task",
            Self::Update => "Failed to update task",
            Self::Move => "Failed to move task",
            Self::Delete => "Failed to delete task",
            Self::Complete => "Failed to complete task",
            Self::Uncomplete => "Failed to reopen task",
        }
    }

    /// Message shown on success, if the operation announces success at all.
    #[must_use]
    pub const fn success_message(self) -> Option<&'static str> {
        match self {
            Self::Create => Some("Task created"),
            Self::Update => Some("Task updated"),
            Self::Delete => Some("Task deleted"),
            Self::Complete => Some("Task completed"),
            Self::Uncomplete => Some("Task reopened"),
            Self::LoadTasks | Self::LoadColumns | Self::Move => None,
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LoadTasks => "load_tasks",
            Self::LoadColumns => "load_columns",
            Self::Create => "create",
            Self::Update => "update",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::Complete => "complete",
            Self::Uncomplete => "uncomplete",
        };
        f.write_str(name)
    }
}

/// Derives the single human-readable message for a failed operation.
#[must_use]
pub fn describe_failure(kind: MutationKind, err: &ApiError) -> String {
    if let ApiError::RateLimited { retry_after } = err {
        return rate_limit_message(*retry_after);
    }
    err.server_message()
        .map_or_else(|| kind.fallback_message().to_string(), str::to_string)
}

fn rate_limit_message(retry_after: Duration) -> String {
    let secs = retry_after.as_secs();
    let (n, unit) = if secs >= 60 {
        (secs.div_ceil(60), "minute")
    } else {
        (secs.max(1), "second")
    };
    let plural = if n == 1 { "" } else { "s" };
    format!("Too many requests. Please try again in {n} {unit}{plural}.")
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The operation succeeded.
    Success,
    /// The operation failed and was rolled back.
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Display text.
    pub message: String,
}

impl Notice {
    /// A success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// An error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for store notices.
pub trait Notifier: Send + Sync + 'static {
    /// Delivers one notice. Must not block.
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(message = %notice.message, "notice"),
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "notice"),
        }
    }
}

/// Forwards notices over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("notice receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_proto::rest::codes;

    fn limited(secs: u64) -> ApiError {
        ApiError::RateLimited {
            retry_after: Duration::from_secs(secs),
        }
    }

    #[test]
    fn rate_limit_uses_seconds_under_a_minute() {
        assert_eq!(
            describe_failure(MutationKind::Move, &limited(30)),
            "Too many requests. Please try again in 30 seconds."
        );
        assert_eq!(
            describe_failure(MutationKind::Move, &limited(1)),
            "Too many requests. Please try again in 1 second."
        );
    }

    #[test]
    fn rate_limit_rounds_minutes_up() {
        assert_eq!(
            describe_failure(MutationKind::Update, &limited(60)),
            "Too many requests. Please try again in 1 minute."
        );
        assert_eq!(
            describe_failure(MutationKind::Update, &limited(61)),
            "Too many requests. Please try again in 2 minutes."
        );
    }

    #[test]
    fn server_message_wins_over_fallback() {
        let err = ApiError::status_error(400, codes::INVALID_COLUMN, "Column does not exist");
        assert_eq!(
            describe_failure(MutationKind::Move, &err),
            "Column does not exist"
        );
    }

    #[test]
    fn fallback_per_operation() {
        let err = ApiError::Network("connection reset".to_string());
        assert_eq!(
            describe_failure(MutationKind::Uncomplete, &err),
            "Failed to reopen task"
        );
        assert_eq!(
            describe_failure(MutationKind::LoadColumns, &ApiError::Timeout),
            "Failed to load columns"
        );
    }

    #[test]
    fn moves_are_silent_on_success() {
        assert_eq!(MutationKind::Move.success_message(), None);
        assert_eq!(MutationKind::Uncomplete.success_message(), Some("Task reopened"));
    }

    #[tokio::test]
    async fn channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notice::success("Task created"));
        notifier.notify(Notice::error("Failed to move task"));
        assert_eq!(rx.recv().await, Some(Notice::success("Task created")));
        assert_eq!(rx.recv().await.map(|n| n.level), Some(NoticeLevel::Error));
    }
}
