//! REST routes under `/api`.
//!
//! Every route requires a bearer token. Task mutations are applied to the
//! [`BoardStore`](crate::store::BoardStore) and then broadcast to the
//! project room as the matching `task:*` event.

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch};
use serde::Deserialize;

use taskboard_proto::event::{TaskCreated, TaskDeleted, TaskMoved, TaskUpdated};
use taskboard_proto::{
    Column, MoveTask, Project, ProjectId, ServerEvent, Task, TaskDraft, TaskId, TaskPatch,
};

use crate::error::HubError;
use crate::hub::{SharedState, bearer_token};
use crate::store::Updated;

type ApiResult<T> = Result<Json<T>, HubError>;

/// Body of `POST /api/projects`.
#[derive(Debug, Deserialize)]
struct NewProject {
    name: String,
}

/// The `/api` router. Nest it under `/api` and supply [`SharedState`].
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/tasks/projects/{project_id}/tasks",
            get(list_tasks).post(create_task),
        )
        .route("/tasks/projects/{project_id}/columns", get(list_columns))
        .route("/tasks/{task_id}", patch(update_task).delete(delete_task))
        .route("/tasks/{task_id}/move", patch(move_task))
        .route("/tasks/{task_id}/complete", patch(complete_task))
        .route("/tasks/{task_id}/uncomplete", patch(uncomplete_task))
        .route_layer(middleware::from_fn(require_bearer))
}

async fn require_bearer(request: Request, next: Next) -> Result<Response, HubError> {
    if bearer_token(request.headers()).is_none() {
        return Err(HubError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Turns a body rejection into the shared `{code, message}` error shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HubError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| HubError::Validation(rejection.body_text()))
}

async fn list_projects(State(state): State<SharedState>) -> ApiResult<Vec<Project>> {
    Ok(Json(state.store.projects().await))
}

async fn create_project(
    State(state): State<SharedState>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), HubError> {
    let NewProject { name } = body(payload)?;
    let project = state.store.create_project(&name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_tasks(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Vec<Task>> {
    Ok(Json(state.store.tasks(&project_id).await?))
}

async fn list_columns(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Vec<Column>> {
    Ok(Json(state.store.columns(&project_id).await?))
}

async fn create_task(
    State(state): State<SharedState>,
    Path(project_id): Path<ProjectId>,
    payload: Result<Json<TaskDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), HubError> {
    let draft = body(payload)?;
    let task = state.store.create_task(&project_id, draft).await?;
    state
        .broadcast(&ServerEvent::TaskCreated(TaskCreated {
            project_id,
            task: task.clone(),
        }))
        .await;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<SharedState>,
    Path(task_id): Path<TaskId>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> ApiResult<Task> {
    let patch = body(payload)?;
    let updated = state.store.update_task(&task_id, patch).await?;
    Ok(Json(announce_update(&state, updated).await))
}

async fn move_task(
    State(state): State<SharedState>,
    Path(task_id): Path<TaskId>,
    payload: Result<Json<MoveTask>, JsonRejection>,
) -> ApiResult<Task> {
    let target = body(payload)?;
    let task = state.store.move_task(&task_id, &target).await?;
    state
        .broadcast(&ServerEvent::TaskMoved(TaskMoved {
            project_id: task.project_id.clone(),
            task_id,
            column_id: task.column_id.clone(),
            position: task.position,
        }))
        .await;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, HubError> {
    let project_id = state.store.delete_task(&task_id).await?;
    state
        .broadcast(&ServerEvent::TaskDeleted(TaskDeleted {
            project_id,
            task_id,
        }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_task(
    State(state): State<SharedState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Task> {
    let updated = state.store.set_completed(&task_id, true).await?;
    Ok(Json(announce_update(&state, updated).await))
}

async fn uncomplete_task(
    State(state): State<SharedState>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Task> {
    let updated = state.store.set_completed(&task_id, false).await?;
    Ok(Json(announce_update(&state, updated).await))
}

async fn announce_update(state: &SharedState, updated: Updated) -> Task {
    let Updated {
        project_id,
        task,
        patch,
    } = updated;
    state
        .broadcast(&ServerEvent::TaskUpdated(TaskUpdated {
            project_id,
            task_id: task.id.clone(),
            updates: patch,
        }))
        .await;
    task
}
