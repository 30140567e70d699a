//! WebSocket connector.
//!
//! Opens a `ws://` or `wss://` connection with the bearer token in the
//! handshake's `Authorization` header, then splits the stream into a
//! reader task (JSON text frames to [`ServerEvent`]) and a writer task
//! ([`ClientEvent`] to JSON text frames).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskboard_proto::{ClientEvent, ServerEvent, codec};

use super::{Connector, Link, TransportError};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-direction channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Production [`Connector`] over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: url::Url,
    connect_timeout: Duration,
    channel_capacity: usize,
}

impl WsConnector {
    /// Creates a connector for the realtime endpoint at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if `url` does not parse or
    /// is not a `ws`/`wss` URL.
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let parsed =
            url::Url::parse(url).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidRequest(format!(
                "expected ws:// or wss:// URL, got {url}"
            )));
        }
        Ok(Self {
            url: parsed,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        })
    }

    /// Overrides the handshake timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the per-direction channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The endpoint this connector dials.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl Connector for WsConnector {
    async fn open(&self, token: &str) -> Result<Link, TransportError> {
        let request = build_request(self.url.as_str(), token)?;
        let url = self.url.as_str();

        let (ws_stream, _response) =
            tokio::time::timeout(self.connect_timeout, connect_async(request))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "realtime connect timed out");
                    TransportError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, err = %e, "realtime connect failed");
                    map_ws_connect_error(e)
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let (frame_tx, frame_rx) = mpsc::channel(self.channel_capacity);

        let reader = tokio::spawn(reader_loop(ws_reader, event_tx));
        tokio::spawn(writer_loop(ws_sender, frame_rx));

        tracing::info!(url, "realtime socket open");
        Ok(Link::new(frame_tx, event_rx).with_task(reader))
    }
}

/// Builds the handshake request with the bearer token attached.
fn build_request(url: &str, token: &str) -> Result<Request, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| TransportError::InvalidRequest(format!("token: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    Ok(request)
}

/// Reads frames until the socket closes. Malformed frames are logged and
/// skipped; they never end the connection.
async fn reader_loop(mut ws_reader: WsReader, tx: mpsc::Sender<ServerEvent>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match codec::decode::<ServerEvent>(text.as_str()) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        // Link dropped.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed realtime frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("realtime socket closed by server");
                break;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!("ignoring binary realtime frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "realtime socket read error");
                break;
            }
        }
    }
    tracing::debug!("realtime reader task exiting");
}

/// Sends queued client events until the link is dropped, then closes the socket.
async fn writer_loop(mut ws_sender: WsSender, mut rx: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = rx.recv().await {
        let text = match codec::encode(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(err = %e, ?event, "failed to encode client event");
                continue;
            }
        };
        if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
            tracing::warn!(err = %e, "realtime socket write failed");
            break;
        }
    }
    let _ = ws_sender.close().await;
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(io_err.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => {
            TransportError::Handshake(format!("status {}", response.status()))
        }
        other => TransportError::Io(std::io::Error::other(format!(
            "realtime connection error: {other}"
        ))),
    }
}
