//! REST API access.
//!
//! [`TaskApi`] is the seam between the optimistic store and the network.
//! [`http::HttpTaskApi`] implements it over reqwest; tests substitute
//! in-memory fakes.

pub mod http;

pub use http::{HttpApiConfig, HttpTaskApi};

use std::future::Future;
use std::time::Duration;

use futures_util::future::{AbortRegistration, Abortable};

use taskboard_proto::rest::codes;
use taskboard_proto::{Column, MoveTask, Project, ProjectId, Task, TaskDraft, TaskId, TaskPatch};

/// Result alias for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Typed failure of an API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the client timeout.
    #[error("request timed out")]
    Timeout,

    /// The server kept answering 429 after one retry.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Server-suggested wait.
        retry_after: Duration,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("request failed"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Machine-readable error code from the body, if any.
        code: Option<String>,
        /// Human-readable message from the body, if any.
        message: Option<String>,
    },

    /// A request or response body was not the expected JSON.
    #[error("invalid JSON payload: {0}")]
    Json(String),

    /// The caller aborted the request.
    #[error("request aborted")]
    Aborted,
}

impl ApiError {
    /// HTTP status, for [`ApiError::Status`] and [`ApiError::RateLimited`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            Self::RateLimited { .. } => Some(codes::RATE_LIMITED),
            _ => None,
        }
    }

    /// Message supplied by the server, suitable for display.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }

    /// Convenience constructor for a status error.
    pub fn status_error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: Some(code.to_string()),
            message: Some(message.into()),
        }
    }
}

/// Task board REST operations.
pub trait TaskApi: Send + Sync + 'static {
    /// `GET /projects`
    fn list_projects(&self) -> impl Future<Output = ApiResult<Vec<Project>>> + Send;

    /// `GET /tasks/projects/{projectId}/tasks`
    fn list_tasks(&self, project_id: &ProjectId)
    -> impl Future<Output = ApiResult<Vec<Task>>> + Send;

    /// `GET /tasks/projects/{projectId}/columns`
    fn list_columns(
        &self,
        project_id: &ProjectId,
    ) -> impl Future<Output = ApiResult<Vec<Column>>> + Send;

    /// `POST /tasks/projects/{projectId}/tasks`
    fn create_task(
        &self,
        project_id: &ProjectId,
        draft: &TaskDraft,
    ) -> impl Future<Output = ApiResult<Task>> + Send;

    /// `PATCH /tasks/{taskId}`
    fn update_task(
        &self,
        task_id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = ApiResult<Task>> + Send;

    /// `PATCH /tasks/{taskId}/move`
    fn move_task(
        &self,
        task_id: &TaskId,
        target: &MoveTask,
    ) -> impl Future<Output = ApiResult<Task>> + Send;

    /// `DELETE /tasks/{taskId}`
    fn delete_task(&self, task_id: &TaskId) -> impl Future<Output = ApiResult<()>> + Send;

    /// `PATCH /tasks/{taskId}/complete`
    fn complete_task(&self, task_id: &TaskId) -> impl Future<Output = ApiResult<Task>> + Send;

    /// `PATCH /tasks/{taskId}/uncomplete`
    fn uncomplete_task(&self, task_id: &TaskId) -> impl Future<Output = ApiResult<Task>> + Send;
}

/// Fetches the project list, resolving to [`ApiError::Aborted`] as soon as
/// the paired `AbortHandle` is triggered.
///
/// # Errors
///
/// Returns the underlying [`ApiError`], or [`ApiError::Aborted`].
pub async fn fetch_projects<A: TaskApi>(
    api: &A,
    registration: AbortRegistration,
) -> ApiResult<Vec<Project>> {
    Abortable::new(api.list_projects(), registration)
        .await
        .map_err(|_| {
            tracing::debug!("project list fetch aborted");
            ApiError::Aborted
        })?
}
