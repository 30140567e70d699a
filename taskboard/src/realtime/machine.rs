//! Connection lifecycle as a pure state machine.
//!
//! [`ReconnectMachine::step`] consumes one [`LinkInput`] and returns at most
//! one [`LinkEffect`] for the driver to perform. It never touches sockets or
//! timers, so backoff behaviour is testable without I/O.
//!
//! ```text
//! Disconnected --ConnectRequested--> Connecting --Opened--> Connected
//!                                        |                      |
//!                                   OpenFailed               Closed
//!                                        v                      v
//!                      Reconnecting{n} <-------- attempts < max
//!                            |
//!                      RetryElapsed --> Connecting
//! ```
//!
//! A failure with all attempts spent moves to `Disconnected` and emits
//! [`LinkEffect::GiveUp`]; only a new `ConnectRequested` leaves that state.

use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before attempt 1; each later attempt doubles it.
    pub base_delay: Duration,
    /// Attempts allowed after a failure before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection and no retry pending.
    Disconnected,
    /// A socket open is in flight.
    Connecting,
    /// The socket is open.
    Connected,
    /// Waiting to start reconnect attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
}

impl LinkState {
    /// Returns `true` only in [`LinkState::Connected`].
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

/// Things that happen to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInput {
    /// Caller asked to connect.
    ConnectRequested,
    /// The socket opened.
    Opened,
    /// Opening the socket failed.
    OpenFailed,
    /// An open socket closed or errored.
    Closed,
    /// The pending retry delay elapsed.
    RetryElapsed,
    /// Caller asked to disconnect.
    DisconnectRequested,
}

/// Work the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEffect {
    /// Open a socket, then feed back `Opened` or `OpenFailed`.
    Open,
    /// Close the current socket.
    Close,
    /// Arm a timer for `delay`, then feed back `RetryElapsed`.
    ScheduleRetry {
        /// Attempt the timer leads to.
        attempt: u32,
        /// How long to wait.
        delay: Duration,
    },
    /// Disarm the pending retry timer.
    CancelRetry,
    /// All attempts are spent.
    GiveUp {
        /// Attempts that were made.
        attempts: u32,
    },
}

/// Reconnect state machine. See the module docs for the transition table.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: LinkState,
    attempts: u32,
    policy: BackoffPolicy,
}

impl ReconnectMachine {
    /// Creates a machine in [`LinkState::Disconnected`].
    #[must_use]
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: LinkState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Reconnect attempts used since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The backoff policy in force.
    #[must_use]
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Applies one input and returns the effect to perform, if any.
    pub fn step(&mut self, input: LinkInput) -> Option<LinkEffect> {
        match (self.state, input) {
            (LinkState::Disconnected, LinkInput::ConnectRequested) => {
                self.attempts = 0;
                self.state = LinkState::Connecting;
                Some(LinkEffect::Open)
            }
            (LinkState::Connecting, LinkInput::Opened) => {
                self.attempts = 0;
                self.state = LinkState::Connected;
                None
            }
            (LinkState::Connecting, LinkInput::OpenFailed)
            | (LinkState::Connected, LinkInput::Closed) => Some(self.fail()),
            (LinkState::Reconnecting { .. }, LinkInput::RetryElapsed) => {
                self.state = LinkState::Connecting;
                Some(LinkEffect::Open)
            }
            (state, LinkInput::DisconnectRequested) => {
                self.attempts = 0;
                self.state = LinkState::Disconnected;
                match state {
                    LinkState::Connected | LinkState::Connecting => Some(LinkEffect::Close),
                    LinkState::Reconnecting { .. } => Some(LinkEffect::CancelRetry),
                    LinkState::Disconnected => None,
                }
            }
            // Repeated connects, stale timers and late socket reports.
            _ => None,
        }
    }

    fn fail(&mut self) -> LinkEffect {
        if self.attempts >= self.policy.max_attempts {
            let attempts = self.attempts;
            self.state = LinkState::Disconnected;
            return LinkEffect::GiveUp { attempts };
        }
        self.attempts += 1;
        let attempt = self.attempts;
        self.state = LinkState::Reconnecting { attempt };
        LinkEffect::ScheduleRetry {
            attempt,
            delay: self.policy.delay_for(attempt),
        }
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
