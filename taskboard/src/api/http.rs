//! reqwest implementation of [`TaskApi`].

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use taskboard_proto::rest::ErrorBody;
use taskboard_proto::{Column, MoveTask, Project, ProjectId, Task, TaskDraft, TaskId, TaskPatch};

use super::{ApiError, ApiResult, TaskApi};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9100/api";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest wait honoured before the single rate-limit retry.
pub const DEFAULT_RATE_LIMIT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Assumed wait when a 429 carries no usable `Retry-After`.
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApiConfig {
    /// Base URL that endpoint paths are appended to.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Cap on the wait before retrying a 429.
    pub rate_limit_max_wait: Duration,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_limit_max_wait: DEFAULT_RATE_LIMIT_MAX_WAIT,
        }
    }
}

/// Bearer-authenticated JSON client for the task board REST API.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    token: String,
    rate_limit_max_wait: Duration,
}

impl HttpTaskApi {
    /// Builds a client from `config` that authenticates with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the underlying client cannot be built.
    pub fn new(config: &HttpApiConfig, token: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            rate_limit_max_wait: config.rate_limit_max_wait,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    /// Sends a request built by `build`, retrying exactly once on 429.
    async fn send<F>(&self, build: F) -> ApiResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retried = false;
        loop {
            let response = build().send().await.map_err(map_transport_error)?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after(&response);
                if retried {
                    tracing::warn!(retry_after_secs = retry_after.as_secs(), "still rate limited");
                    return Err(ApiError::RateLimited { retry_after });
                }
                let wait = retry_after.min(self.rate_limit_max_wait);
                tracing::info!(wait_ms = wait.as_millis(), "rate limited, retrying once");
                tokio::time::sleep(wait).await;
                retried = true;
                continue;
            }
            return Err(status_error(response).await);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(|| self.request(Method::GET, path)).await?;
        read_json(response).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .send(|| self.request(method.clone(), path).json(body))
            .await?;
        read_json(response).await
    }

    async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(|| self.request(Method::PATCH, path)).await?;
        read_json(response).await
    }
}

impl TaskApi for HttpTaskApi {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.get_json("/projects").await
    }

    async fn list_tasks(&self, project_id: &ProjectId) -> ApiResult<Vec<Task>> {
        self.get_json(&format!("/tasks/projects/{project_id}/tasks"))
            .await
    }

    async fn list_columns(&self, project_id: &ProjectId) -> ApiResult<Vec<Column>> {
        self.get_json(&format!("/tasks/projects/{project_id}/columns"))
            .await
    }

    async fn create_task(&self, project_id: &ProjectId, draft: &TaskDraft) -> ApiResult<Task> {
        self.send_json(
            Method::POST,
            &format!("/tasks/projects/{project_id}/tasks"),
            draft,
        )
        .await
    }

    async fn update_task(&self, task_id: &TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        self.send_json(Method::PATCH, &format!("/tasks/{task_id}"), patch)
            .await
    }

    async fn move_task(&self, task_id: &TaskId, target: &MoveTask) -> ApiResult<Task> {
        self.send_json(Method::PATCH, &format!("/tasks/{task_id}/move"), target)
            .await
    }

    async fn delete_task(&self, task_id: &TaskId) -> ApiResult<()> {
        let path = format!("/tasks/{task_id}");
        self.send(|| self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn complete_task(&self, task_id: &TaskId) -> ApiResult<Task> {
        self.patch_empty(&format!("/tasks/{task_id}/complete"))
            .await
    }

    async fn uncomplete_task(&self, task_id: &TaskId) -> ApiResult<Task> {
        self.patch_empty(&format!("/tasks/{task_id}/uncomplete"))
            .await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Json(e.to_string()))
}

/// Parses `Retry-After` as whole seconds.
fn retry_after(response: &Response) -> Duration {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map_or(FALLBACK_RETRY_AFTER, Duration::from_secs)
}

/// Maps a non-success response to [`ApiError::Status`], reading the
/// `{code, message}` body when there is one.
async fn status_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice::<ErrorBody>(&bytes).ok())
        .unwrap_or_default();
    tracing::debug!(status, code = ?body.code, "API request failed");
    ApiError::Status {
        status,
        code: body.code,
        message: body.message,
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_decode() {
        ApiError::Json(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus, header};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, patch};

    use taskboard_proto::rest::codes;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn api(base_url: String) -> HttpTaskApi {
        let config = HttpApiConfig {
            base_url,
            timeout: Duration::from_secs(5),
            rate_limit_max_wait: Duration::from_millis(50),
        };
        HttpTaskApi::new(&config, "secret").unwrap()
    }

    fn too_many(retry_after: &str) -> AxumResponse {
        (
            AxumStatus::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after.to_string())],
            Json(ErrorBody::new(codes::RATE_LIMITED, "slow down")),
        )
            .into_response()
    }

    #[tokio::test]
    async fn retries_once_after_rate_limit() {
        let hits = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/projects",
                get(|State(hits): State<Arc<AtomicU32>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        too_many("0")
                    } else {
                        Json(vec![Project::new("p1", "Launch")]).into_response()
                    }
                }),
            )
            .with_state(Arc::clone(&hits));
        let api = api(serve(router).await);

        let projects = api.list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_rate_limit_is_surfaced() {
        let hits = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/projects",
                get(|State(hits): State<Arc<AtomicU32>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    too_many("120")
                }),
            )
            .with_state(Arc::clone(&hits));
        let api = api(serve(router).await);

        let err = api.list_projects().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::RateLimited {
                retry_after: Duration::from_secs(120)
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_body_is_mapped() {
        let router = Router::new().route(
            "/tasks/{id}/complete",
            patch(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(ErrorBody::new(codes::NOT_FOUND, "Task not found")),
                )
            }),
        );
        let api = api(serve(router).await);

        let err = api.complete_task(&TaskId::new("t9")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.code(), Some(codes::NOT_FOUND));
        assert_eq!(err.server_message(), Some("Task not found"));
    }

    #[tokio::test]
    async fn non_json_error_body_has_no_message() {
        let router = Router::new().route(
            "/projects",
            get(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }),
        );
        let api = api(serve(router).await);

        let err = api.list_projects().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 502,
                code: None,
                message: None
            }
        );
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let router = Router::new().route(
            "/projects",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth == "Bearer secret" {
                    Json(Vec::<Project>::new()).into_response()
                } else {
                    AxumStatus::UNAUTHORIZED.into_response()
                }
            }),
        );
        let api = api(serve(router).await);
        assert!(api.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let api = api("http://127.0.0.1:1".to_string());
        assert!(matches!(
            api.list_projects().await,
            Err(ApiError::Network(_) | ApiError::Timeout)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = api("http://localhost:9100/api/".to_string());
        assert_eq!(api.base_url, "http://localhost:9100/api");
    }
}
