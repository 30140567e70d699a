//! Realtime transport: a reconnecting, event-subscribing WebSocket client.
//!
//! The pieces:
//! - [`machine::ReconnectMachine`] decides *what* to do (pure).
//! - A [`Connector`] performs the socket open ([`socket::WsConnector`] in
//!   production, [`loopback::LoopbackConnector`] in tests).
//! - [`client::RealtimeClient`] is the supervisor task that wires the two
//!   together and dispatches incoming events to registered handlers.

pub mod client;
pub mod handlers;
pub mod loopback;
pub mod machine;
pub mod socket;

pub use client::RealtimeClient;
pub use handlers::HandlerId;
pub use machine::{BackoffPolicy, LinkState};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskboard_proto::{ClientEvent, ServerEvent};

/// Errors that can occur while opening or using a realtime connection.
///
/// These never reach callers of [`RealtimeClient`]; they are logged by the
/// supervisor and turned into reconnect decisions.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("transport operation timed out")]
    Timeout,

    /// The server could not be reached.
    #[error("server {0} is unreachable")]
    Unreachable(String),

    /// The WebSocket handshake was rejected (bad token, wrong path).
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// The configured URL or token cannot form a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens authenticated realtime connections.
pub trait Connector: Send + Sync + 'static {
    /// Opens one connection authenticated with `token`.
    fn open(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Link, TransportError>> + Send;
}

/// An open connection, as channels.
///
/// The link is closed when `incoming` yields `None`. Dropping the link
/// closes `outgoing`, which tells the connector's writer to shut the socket,
/// and aborts any background tasks registered with [`Link::with_task`].
#[derive(Debug)]
pub struct Link {
    outgoing: mpsc::Sender<ClientEvent>,
    incoming: mpsc::Receiver<ServerEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    /// Wraps the two directions of a connection.
    #[must_use]
    pub const fn new(
        outgoing: mpsc::Sender<ClientEvent>,
        incoming: mpsc::Receiver<ServerEvent>,
    ) -> Self {
        Self {
            outgoing,
            incoming,
            tasks: Vec::new(),
        }
    }

    /// Ties a background task's lifetime to this link.
    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Queues a client event for sending.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the writer has gone away.
    pub async fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.outgoing
            .send(event)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Waits for the next server event; `None` once the connection closed.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.incoming.recv().await
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
