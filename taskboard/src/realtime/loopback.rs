//! In-process connector for testing.
//!
//! [`LoopbackConnector`] hands out [`Link`]s backed by `tokio::sync::mpsc`
//! channels. The paired [`LoopbackControl`] plays the server: it receives a
//! [`LoopbackPeer`] for every accepted open, can refuse opens, and records
//! when each open was attempted.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use taskboard_proto::{ClientEvent, ServerEvent};

use super::{Connector, Link, TransportError};

/// Server side of a loopback link.
#[derive(Debug)]
pub struct LoopbackPeer {
    events: mpsc::Sender<ServerEvent>,
    frames: mpsc::Receiver<ClientEvent>,
}

impl LoopbackPeer {
    /// Pushes an event to the client. Returns `false` if the client dropped
    /// the link.
    pub async fn push(&self, event: ServerEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Next frame sent by the client; `None` once the client dropped the link.
    pub async fn next_frame(&mut self) -> Option<ClientEvent> {
        self.frames.recv().await
    }

    /// Returns `true` once the client side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Creates a connected client link and its server-side peer.
#[must_use]
pub fn link_pair(capacity: usize) -> (Link, LoopbackPeer) {
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let (frame_tx, frame_rx) = mpsc::channel(capacity);
    (
        Link::new(frame_tx, event_rx),
        LoopbackPeer {
            events: event_tx,
            frames: frame_rx,
        },
    )
}

#[derive(Debug)]
struct Shared {
    capacity: usize,
    refusals: Mutex<u32>,
    attempts: Mutex<Vec<(Instant, String)>>,
    peers: mpsc::UnboundedSender<LoopbackPeer>,
}

/// A [`Connector`] that never touches the network.
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    shared: Arc<Shared>,
}

/// Test-side handle of a [`LoopbackConnector`].
#[derive(Debug)]
pub struct LoopbackControl {
    shared: Arc<Shared>,
    peers: mpsc::UnboundedReceiver<LoopbackPeer>,
}

impl LoopbackConnector {
    /// Creates a connector whose links buffer `capacity` messages per direction.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, LoopbackControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            capacity,
            refusals: Mutex::new(0),
            attempts: Mutex::new(Vec::new()),
            peers: tx,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LoopbackControl { shared, peers: rx },
        )
    }
}

impl Connector for LoopbackConnector {
    async fn open(&self, token: &str) -> Result<Link, TransportError> {
        self.shared
            .attempts
            .lock()
            .push((Instant::now(), token.to_string()));

        {
            let mut refusals = self.shared.refusals.lock();
            if *refusals > 0 {
                *refusals -= 1;
                return Err(TransportError::Unreachable("loopback".to_string()));
            }
        }

        let (link, peer) = link_pair(self.shared.capacity);
        self.shared
            .peers
            .send(peer)
            .map_err(|_| TransportError::Unreachable("loopback".to_string()))?;
        Ok(link)
    }
}

impl LoopbackControl {
    /// Refuses the next `n` opens.
    pub fn refuse_next(&self, n: u32) {
        *self.shared.refusals.lock() = n;
    }

    /// Refuses every open until [`accept_all`](Self::accept_all) is called.
    pub fn refuse_all(&self) {
        self.refuse_next(u32::MAX);
    }

    /// Accepts every open from now on.
    pub fn accept_all(&self) {
        self.refuse_next(0);
    }

    /// When each open was attempted, in order.
    #[must_use]
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.shared.attempts.lock().iter().map(|(t, _)| *t).collect()
    }

    /// Tokens presented by each open attempt, in order.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.shared
            .attempts
            .lock()
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// Waits for the next accepted connection.
    pub async fn next_peer(&mut self) -> Option<LoopbackPeer> {
        self.peers.recv().await
    }
}
