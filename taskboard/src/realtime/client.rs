//! Public realtime client and its supervisor task.
//!
//! [`RealtimeClient`] methods never block and never fail: they post a
//! command to the supervisor, which owns the [`Link`], the
//! [`ReconnectMachine`] and the retry timer. Transport errors are logged
//! there and turned into reconnect decisions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use taskboard_proto::event::{CommentCreated, TaskCreated, TaskDeleted, TaskMoved, TaskUpdated};
use taskboard_proto::presence::PresenceMessage;
use taskboard_proto::typing::TypingMessage;
use taskboard_proto::{ClientEvent, EventKind, ProjectId, ServerEvent};

use super::handlers::{HandlerId, HandlerRegistry};
use super::machine::{BackoffPolicy, LinkEffect, LinkInput, LinkState, ReconnectMachine};
use super::{Connector, Link};

/// Requests from the public handle to the supervisor.
#[derive(Debug)]
enum Command {
    Connect(String),
    Disconnect,
    Join(ProjectId),
    Leave(ProjectId),
}

/// Handle to a realtime connection.
///
/// Must be created inside a Tokio runtime. Dropping the handle stops the
/// supervisor and closes the socket.
#[derive(Debug)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<LinkState>,
    handlers: Arc<HandlerRegistry>,
    supervisor: JoinHandle<()>,
}

impl RealtimeClient {
    /// Starts a disconnected client that opens sockets through `connector`.
    pub fn spawn<C: Connector>(connector: C, policy: BackoffPolicy) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(LinkState::Disconnected);
        let handlers = Arc::new(HandlerRegistry::new());

        let supervisor = Supervisor {
            connector,
            machine: ReconnectMachine::new(policy),
            token: None,
            link: None,
            retry_at: None,
            rooms: BTreeSet::new(),
            state_tx,
            handlers: Arc::clone(&handlers),
        };
        let supervisor = tokio::spawn(supervisor.run(command_rx));

        Self {
            commands,
            state,
            handlers,
            supervisor,
        }
    }

    /// Opens the connection. No-op while already connecting or connected.
    pub fn connect(&self, token: impl Into<String>) {
        self.post(Command::Connect(token.into()));
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Subscribes to a project's room. Dropped with a warning when not connected.
    pub fn join_project(&self, project_id: &ProjectId) {
        if !self.is_connected() {
            tracing::warn!(project_id = %project_id, "not connected, join:project dropped");
            return;
        }
        self.post(Command::Join(project_id.clone()));
    }

    /// Unsubscribes from a project's room. Dropped with a warning when not connected.
    pub fn leave_project(&self, project_id: &ProjectId) {
        if !self.is_connected() {
            tracing::warn!(project_id = %project_id, "not connected, leave:project dropped");
            return;
        }
        self.post(Command::Leave(project_id.clone()));
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Returns `true` while the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// A receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Registers a handler for any event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.handlers.add(kind, handler)
    }

    /// Removes one handler of `kind`, or all of them when `id` is `None`.
    pub fn off(&self, kind: EventKind, id: Option<HandlerId>) -> usize {
        self.handlers.remove(kind, id)
    }

    /// Registers a `task:created` handler.
    pub fn on_task_created<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TaskCreated) + Send + Sync + 'static,
    {
        self.on(EventKind::TaskCreated, move |event| {
            if let ServerEvent::TaskCreated(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `task:updated` handler.
    pub fn on_task_updated<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TaskUpdated) + Send + Sync + 'static,
    {
        self.on(EventKind::TaskUpdated, move |event| {
            if let ServerEvent::TaskUpdated(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `task:deleted` handler.
    pub fn on_task_deleted<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TaskDeleted) + Send + Sync + 'static,
    {
        self.on(EventKind::TaskDeleted, move |event| {
            if let ServerEvent::TaskDeleted(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `task:moved` handler.
    pub fn on_task_moved<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TaskMoved) + Send + Sync + 'static,
    {
        self.on(EventKind::TaskMoved, move |event| {
            if let ServerEvent::TaskMoved(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `presence:changed` handler.
    pub fn on_presence_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&PresenceMessage) + Send + Sync + 'static,
    {
        self.on(EventKind::PresenceChanged, move |event| {
            if let ServerEvent::PresenceChanged(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `typing:changed` handler.
    pub fn on_typing_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TypingMessage) + Send + Sync + 'static,
    {
        self.on(EventKind::TypingChanged, move |event| {
            if let ServerEvent::TypingChanged(payload) = event {
                handler(payload);
            }
        })
    }

    /// Registers a `comment:created` handler.
    pub fn on_comment_created<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&CommentCreated) + Send + Sync + 'static,
    {
        self.on(EventKind::CommentCreated, move |event| {
            if let ServerEvent::CommentCreated(payload) = event {
                handler(payload);
            }
        })
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("realtime supervisor has stopped");
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

/// Owns the connection and drives the reconnect machine.
struct Supervisor<C> {
    connector: C,
    machine: ReconnectMachine,
    token: Option<String>,
    link: Option<Link>,
    retry_at: Option<Instant>,
    /// Rooms joined while connected; re-joined after a reconnect.
    rooms: BTreeSet<ProjectId>,
    state_tx: watch::Sender<LinkState>,
    handlers: Arc<HandlerRegistry>,
}

impl<C: Connector> Supervisor<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command).await;
                }
                incoming = next_event(self.link.as_mut()) => {
                    if let Some(event) = incoming {
                        let handled = self.handlers.dispatch(&event);
                        tracing::trace!(event = %event.kind(), handled, "realtime event dispatched");
                    } else {
                        tracing::warn!("realtime connection lost");
                        self.link = None;
                        self.feed(LinkInput::Closed).await;
                    }
                }
                () = retry_timer(self.retry_at) => {
                    self.retry_at = None;
                    self.feed(LinkInput::RetryElapsed).await;
                }
            }
        }
        tracing::debug!("realtime supervisor exiting");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(token) => {
                self.token = Some(token);
                self.feed(LinkInput::ConnectRequested).await;
            }
            Command::Disconnect => {
                self.rooms.clear();
                self.feed(LinkInput::DisconnectRequested).await;
            }
            Command::Join(project_id) => {
                if self.emit(ClientEvent::JoinProject(project_id.clone())).await {
                    tracing::info!(project_id = %project_id, "joined project room");
                    self.rooms.insert(project_id);
                }
            }
            Command::Leave(project_id) => {
                self.rooms.remove(&project_id);
                if self.emit(ClientEvent::LeaveProject(project_id.clone())).await {
                    tracing::info!(project_id = %project_id, "left project room");
                }
            }
        }
    }

    /// Sends on the current link; `false` (with a warning) when there is none.
    async fn emit(&self, event: ClientEvent) -> bool {
        let Some(link) = &self.link else {
            tracing::warn!(?event, "not connected, dropping client event");
            return false;
        };
        match link.send(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(err = %e, "failed to emit client event");
                false
            }
        }
    }

    /// Runs an input through the machine, performing effects until quiescent.
    async fn feed(&mut self, input: LinkInput) {
        let mut next = Some(input);
        while let Some(input) = next.take() {
            let effect = self.machine.step(input);
            self.state_tx.send_replace(self.machine.state());
            if input == LinkInput::Opened && self.machine.state().is_connected() {
                tracing::info!("realtime connected");
                self.rejoin_rooms().await;
            }
            if let Some(effect) = effect {
                next = self.perform(effect).await;
            }
        }
    }

    async fn perform(&mut self, effect: LinkEffect) -> Option<LinkInput> {
        match effect {
            LinkEffect::Open => {
                let Some(token) = self.token.clone() else {
                    tracing::warn!("no token available for realtime connect");
                    return Some(LinkInput::OpenFailed);
                };
                match self.connector.open(&token).await {
                    Ok(link) => {
                        self.link = Some(link);
                        Some(LinkInput::Opened)
                    }
                    Err(e) => {
                        tracing::warn!(err = %e, "realtime connect error");
                        Some(LinkInput::OpenFailed)
                    }
                }
            }
            LinkEffect::Close => {
                self.link = None;
                tracing::info!("realtime disconnected");
                None
            }
            LinkEffect::ScheduleRetry { attempt, delay } => {
                tracing::info!(
                    attempt,
                    max_attempts = self.machine.policy().max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling realtime reconnect"
                );
                self.retry_at = Some(deadline_after(delay));
                None
            }
            LinkEffect::CancelRetry => {
                self.retry_at = None;
                None
            }
            LinkEffect::GiveUp { attempts } => {
                tracing::warn!(attempts, "realtime reconnect attempts exhausted, giving up");
                self.retry_at = None;
                self.link = None;
                None
            }
        }
    }

    async fn rejoin_rooms(&self) {
        for project_id in &self.rooms {
            if self.emit(ClientEvent::JoinProject(project_id.clone())).await {
                tracing::info!(project_id = %project_id, "re-joined project room");
            }
        }
    }
}

/// Next event from the link, or never when there is no link.
async fn next_event(link: Option<&mut Link>) -> Option<ServerEvent> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

/// Completes at `deadline`, or never when no retry is armed.
async fn retry_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}
