//! Hub error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use taskboard_proto::rest::{ErrorBody, codes};
use taskboard_proto::{ColumnId, ProjectId, TaskId};

/// Failures of hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Missing or malformed bearer token.
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    /// No project with this id.
    #[error("Project {0} not found")]
    ProjectNotFound(ProjectId),

    /// No task with this id.
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    /// The column does not belong to the task's project.
    #[error("Column {0} does not exist in this project")]
    InvalidColumn(ColumnId),

    /// The request body failed validation.
    #[error("{0}")]
    Validation(String),
}

impl HubError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ProjectNotFound(_) | Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidColumn(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => codes::UNAUTHORIZED,
            Self::ProjectNotFound(_) | Self::TaskNotFound(_) => codes::NOT_FOUND,
            Self::InvalidColumn(_) => codes::INVALID_COLUMN,
            Self::Validation(_) => codes::VALIDATION,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), err = %self, "request rejected");
        (status, Json(ErrorBody::new(self.code(), self.to_string()))).into_response()
    }
}
