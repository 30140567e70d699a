//! Hub core: shared state, WebSocket handler and room broadcast.
//!
//! Each WebSocket connection gets a [`ConnId`] and a writer channel. Clients
//! send `join:project` / `leave:project` to manage room membership; the REST
//! handlers call [`HubState::broadcast`] after every task mutation, which
//! sends the event to every member of the project room, including the
//! client that made the change.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use taskboard_proto::{ClientEvent, ServerEvent, codec};

use crate::api;
use crate::error::HubError;
use crate::rooms::{ConnId, RoomRegistry};
use crate::store::BoardStore;

/// Default largest accepted realtime frame in bytes (64 KB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// State shared by every handler.
pub type SharedState = Arc<HubState>;

/// Connection registry, room membership and board data.
#[derive(Debug)]
pub struct HubState {
    connections: RwLock<HashMap<ConnId, mpsc::UnboundedSender<Message>>>,
    next_conn: AtomicU64,
    /// Project room membership.
    pub rooms: RoomRegistry,
    /// Board data.
    pub store: BoardStore,
    max_message_size: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Creates a hub with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_MESSAGE_SIZE, BoardStore::new())
    }

    /// Creates a hub with a custom frame limit and store.
    #[must_use]
    pub fn with_config(max_message_size: usize, store: BoardStore) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_conn: AtomicU64::new(1),
            rooms: RoomRegistry::new(),
            store,
            max_message_size,
        }
    }

    async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnId {
        let conn = ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        self.connections.write().await.insert(conn, sender);
        conn
    }

    async fn unregister(&self, conn: ConnId) {
        self.connections.write().await.remove(&conn);
        self.rooms.remove_connection(conn).await;
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends `event` to every member of its project room. Returns the number
    /// of connections it was queued for.
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(project_id) = event.project_id() else {
            return 0;
        };
        let text = match codec::encode(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode event");
                return 0;
            }
        };

        let members = self.rooms.members(project_id).await;
        let conns = self.connections.read().await;
        let mut sent = 0;
        for conn in members {
            if let Some(sender) = conns.get(&conn)
                && sender.send(Message::Text(text.clone().into())).is_ok()
            {
                sent += 1;
            }
        }
        tracing::debug!(%project_id, kind = %event.kind(), sent, "event broadcast");
        sent
    }

    /// Send a WebSocket Close frame to every connection.
    ///
    /// Each writer task sends the frame and stops, so clients observe a
    /// server-side disconnect.
    pub async fn close_all_connections(&self) {
        let conns = self.connections.read().await;
        for (conn, sender) in conns.iter() {
            tracing::info!(%conn, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Extracts a non-empty bearer token from the `Authorization` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Handles an upgraded WebSocket connection.
///
/// The connection lifecycle:
/// 1. Register the connection and spawn its writer task.
/// 2. Process `join:project` / `leave:project` frames until the socket closes.
/// 3. Unregister, which also drops all room memberships.
pub async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn = state.register(tx).await;
    tracing::info!(%conn, "client connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(%conn, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_frame(conn, text.as_str(), &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(%conn, "received close frame");
                    break;
                }
                _ => {
                    // Binary, ping and pong frames carry nothing for the hub.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(conn).await;
    tracing::info!(%conn, "client disconnected");
}

async fn handle_text_frame(conn: ConnId, text: &str, state: &HubState) {
    if text.len() > state.max_message_size {
        tracing::warn!(
            %conn,
            size = text.len(),
            max = state.max_message_size,
            "frame exceeds size limit, dropped"
        );
        return;
    }
    match codec::decode::<ClientEvent>(text) {
        Ok(ClientEvent::JoinProject(project_id)) => {
            if state.rooms.join(&project_id, conn).await {
                tracing::info!(%conn, %project_id, "joined project room");
            }
        }
        Ok(ClientEvent::LeaveProject(project_id)) => {
            if state.rooms.leave(&project_id, conn).await {
                tracing::info!(%conn, %project_id, "left project room");
            }
        }
        Err(e) => {
            tracing::warn!(%conn, error = %e, "malformed client frame");
        }
    }
}

/// axum handler that checks the bearer token and upgrades to a WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, HubError> {
    if bearer_token(&headers).is_none() {
        tracing::warn!("WebSocket upgrade without bearer token");
        return Err(HubError::Unauthorized);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// The full hub router: REST under `/api`, realtime at `/ws`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .nest("/api", api::router())
        .with_state(state)
}

/// Starts the hub with a pre-configured [`HubState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: SharedState,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}
