//! The reconciliation state machine.
//!
//! ```text
//! Disconnected --Start/ReconnectDue--> Connecting --TransportOpened--> Connected
//! Connected --Resync--> Resyncing --graph_state--> Connected
//! Connecting/Connected/Resyncing --TransportClosed/pong timeout--> Disconnected
//! ```
//!
//! [`SyncState::reduce`] is a pure function of `(state, event)`: it returns
//! the next state and the [`Command`]s the driver must perform. It never
//! touches a socket or a clock, which keeps every transition testable
//! without a live transport.
//!
//! Reconnects are bounded. Each loss of transport counts one attempt;
//! after `max_reconnect_attempts` the machine stays `Disconnected` with a
//! persistent error until [`Event::RetryRequested`]. The count resets
//! once a connection has delivered its initial `graph_state`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use topowatch_types::{ClientMessage, GraphUpdate, ServerMessage};

use crate::error::SyncError;
use crate::mirror::{Applied, GraphMirror};

/// Default reconnect cap.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No transport.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Transport open and mirror live.
    Connected,
    /// Transport open, a fresh `graph_state` has been requested.
    Resyncing,
}

impl ConnectionStatus {
    /// Whether a transport is open.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Resyncing)
    }

    /// The tri-state indicator shown to users.
    pub const fn indicator(self) -> Indicator {
        match self {
            Self::Disconnected => Indicator::Disconnected,
            Self::Connecting => Indicator::Connecting,
            Self::Connected | Self::Resyncing => Indicator::Connected,
        }
    }
}

/// User-facing connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Live.
    Connected,
    /// Trying.
    Connecting,
    /// Not connected; see the error string if reconnects are exhausted.
    Disconnected,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The owner wants a connection.
    Start,
    /// A scheduled reconnect delay elapsed.
    ReconnectDue,
    /// The owner re-triggers connecting after exhaustion.
    RetryRequested,
    /// The transport opened.
    TransportOpened,
    /// The transport failed to open or closed.
    TransportClosed {
        /// Human-readable cause.
        reason: String,
    },
    /// A parsed frame from the server.
    Inbound(ServerMessage),
    /// Periodic or explicit request for a fresh snapshot.
    Resync,
    /// Time to probe liveness.
    PingTick,
    /// The pong for ping `seq` did not arrive in time.
    PongDeadline {
        /// The probe that timed out.
        seq: u64,
    },
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open the transport.
    Connect,
    /// Send a control frame.
    Send(ClientMessage),
    /// Start the pong deadline for ping `seq`.
    ArmPongDeadline {
        /// The probe to watch.
        seq: u64,
    },
    /// Wait, then deliver [`Event::ReconnectDue`].
    ScheduleReconnect {
        /// 1-based reconnect attempt number.
        attempt: u32,
    },
    /// Tear the transport down.
    CloseTransport,
}

/// Everything the reconciliation engine owns.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    status: ConnectionStatus,
    /// Copied on write, so published views share it until the next change.
    mirror: Arc<GraphMirror>,
    session_id: Option<String>,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    awaiting_initial_state: bool,
    pending_ping: Option<u64>,
    next_ping_seq: u64,
    last_updated: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }
}

impl SyncState {
    /// A disconnected state with an empty mirror.
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            mirror: Arc::new(GraphMirror::new()),
            session_id: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            awaiting_initial_state: false,
            pending_ping: None,
            next_ping_seq: 1,
            last_updated: None,
            error: None,
        }
    }

    /// Current lifecycle position.
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The mirrored graph.
    pub fn mirror(&self) -> &GraphMirror {
        &self.mirror
    }

    /// A shared handle on the mirrored graph.
    ///
    /// The handle stays valid after later events; a write to the mirror
    /// goes to a fresh copy whenever a handle is outstanding.
    pub fn shared_mirror(&self) -> Arc<GraphMirror> {
        Arc::clone(&self.mirror)
    }

    /// Session id confirmed by the server.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Reconnect attempts since the last good connection.
    pub const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Server time of the last change applied to the mirror.
    pub const fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Persistent error, set once reconnects are exhausted.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Ping awaiting its pong.
    pub const fn pending_ping(&self) -> Option<u64> {
        self.pending_ping
    }

    /// Advance the machine by one event.
    #[must_use]
    pub fn reduce(mut self, event: Event) -> (Self, Vec<Command>) {
        let commands = self.step(event);
        (self, commands)
    }

    fn step(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Start | Event::ReconnectDue => self.begin_connect(),
            Event::RetryRequested => {
                if self.status != ConnectionStatus::Disconnected {
                    return Vec::new();
                }
                info!("reconnect re-triggered");
                self.error = None;
                self.reconnect_attempts = 0;
                self.begin_connect()
            }
            Event::TransportOpened => {
                if self.status != ConnectionStatus::Connecting {
                    return Vec::new();
                }
                self.status = ConnectionStatus::Connected;
                self.awaiting_initial_state = true;
                self.error = None;
                Vec::new()
            }
            Event::TransportClosed { reason } => {
                if self.status == ConnectionStatus::Disconnected {
                    return Vec::new();
                }
                self.lose_transport(&reason)
            }
            Event::Inbound(message) => {
                if !self.status.is_open() {
                    debug!(kind = message.kind(), "frame for a closed transport ignored");
                    return Vec::new();
                }
                self.receive(message)
            }
            Event::Resync => {
                if !self.status.is_open() {
                    return Vec::new();
                }
                self.status = ConnectionStatus::Resyncing;
                vec![Command::Send(ClientMessage::RequestGraphState)]
            }
            Event::PingTick => {
                if !self.status.is_open() || self.pending_ping.is_some() {
                    return Vec::new();
                }
                let seq = self.next_ping_seq;
                self.next_ping_seq = seq.wrapping_add(1);
                self.pending_ping = Some(seq);
                vec![
                    Command::Send(ClientMessage::Ping { timestamp: None }),
                    Command::ArmPongDeadline { seq },
                ]
            }
            Event::PongDeadline { seq } => {
                if !self.status.is_open() || self.pending_ping != Some(seq) {
                    return Vec::new();
                }
                warn!(seq, "no pong before deadline, dropping transport");
                let mut commands = vec![Command::CloseTransport];
                commands.extend(self.lose_transport("pong timeout"));
                commands
            }
        }
    }

    fn begin_connect(&mut self) -> Vec<Command> {
        if self.status != ConnectionStatus::Disconnected || self.error.is_some() {
            return Vec::new();
        }
        self.status = ConnectionStatus::Connecting;
        vec![Command::Connect]
    }

    fn lose_transport(&mut self, reason: &str) -> Vec<Command> {
        self.status = ConnectionStatus::Disconnected;
        self.pending_ping = None;
        self.awaiting_initial_state = false;
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);

        if self.reconnect_attempts > self.max_reconnect_attempts {
            let exhausted = SyncError::ReconnectExhausted {
                attempts: self.max_reconnect_attempts,
            };
            warn!(reason, "{exhausted}");
            self.error = Some(format!("{exhausted}: {reason}"));
            return Vec::new();
        }

        let attempt = self.reconnect_attempts;
        info!(attempt, max = self.max_reconnect_attempts, reason, "transport lost, reconnect scheduled");
        vec![Command::ScheduleReconnect { attempt }]
    }

    fn receive(&mut self, message: ServerMessage) -> Vec<Command> {
        match message {
            ServerMessage::ConnectionEstablished { session_id, .. } => {
                debug!(session_id, "connection established");
                self.session_id = Some(session_id);
                Vec::new()
            }
            ServerMessage::GraphState(state) => {
                let timestamp = state.timestamp;
                let applied = Arc::make_mut(&mut self.mirror).apply_snapshot(state);
                debug!(?applied, "snapshot applied");
                self.status = ConnectionStatus::Connected;
                if self.awaiting_initial_state {
                    self.awaiting_initial_state = false;
                    self.reconnect_attempts = 0;
                }
                self.last_updated = Some(timestamp);
                Vec::new()
            }
            ServerMessage::GraphUpdate(update) => {
                self.apply_delta(&update);
                Vec::new()
            }
            ServerMessage::Ping { timestamp } => {
                vec![Command::Send(ClientMessage::Pong { timestamp })]
            }
            ServerMessage::Pong { .. } => {
                if let Some(seq) = self.pending_ping.take() {
                    debug!(seq, "pong received");
                }
                Vec::new()
            }
        }
    }

    fn apply_delta(&mut self, update: &GraphUpdate) {
        let applied: Applied = Arc::make_mut(&mut self.mirror).apply_update(update);
        if applied.changed() {
            self.last_updated = Some(update.timestamp);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn run(state: SyncState, events: impl IntoIterator<Item = Event>) -> (SyncState, Vec<Command>) {
        events.into_iter().fold((state, Vec::new()), |(s, mut all), e| {
            let (next, cmds) = s.reduce(e);
            all.extend(cmds);
            (next, all)
        })
    }

    #[test]
    fn start_connects_once() {
        let (state, cmds) = run(SyncState::default(), [Event::Start, Event::Start]);
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert_eq!(cmds, [Command::Connect]);
    }

    #[test]
    fn resync_round_trip() {
        let (state, _) = run(SyncState::default(), [Event::Start, Event::TransportOpened]);
        let (state, cmds) = state.reduce(Event::Resync);
        assert_eq!(state.status(), ConnectionStatus::Resyncing);
        assert_eq!(cmds, [Command::Send(ClientMessage::RequestGraphState)]);
        assert_eq!(state.status().indicator(), Indicator::Connected);

        let (state, _) = state.reduce(Event::Inbound(ServerMessage::GraphState(
            topowatch_types::GraphState::default(),
        )));
        assert_eq!(state.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn resync_ignored_while_disconnected() {
        let (_, cmds) = SyncState::default().reduce(Event::Resync);
        assert!(cmds.is_empty());
    }

    #[test]
    fn server_ping_is_answered() {
        let (state, _) = run(SyncState::default(), [Event::Start, Event::TransportOpened]);
        let (_, cmds) = state.reduce(Event::Inbound(ServerMessage::Ping { timestamp: None }));
        assert_eq!(cmds, [Command::Send(ClientMessage::Pong { timestamp: None })]);
    }

    #[test]
    fn missed_pong_drops_transport() {
        let (state, _) = run(SyncState::default(), [Event::Start, Event::TransportOpened]);
        let (state, cmds) = state.reduce(Event::PingTick);
        assert_eq!(cmds.len(), 2);
        let seq = state.pending_ping().unwrap();

        // A second tick while waiting does not stack probes.
        let (state, cmds) = state.reduce(Event::PingTick);
        assert!(cmds.is_empty());

        let (state, cmds) = state.reduce(Event::PongDeadline { seq });
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            cmds,
            [Command::CloseTransport, Command::ScheduleReconnect { attempt: 1 }]
        );
    }

    #[test]
    fn pong_clears_the_deadline() {
        let (state, _) = run(
            SyncState::default(),
            [Event::Start, Event::TransportOpened, Event::PingTick],
        );
        let seq = state.pending_ping().unwrap();
        let (state, _) = state.reduce(Event::Inbound(ServerMessage::Pong { timestamp: None }));
        assert!(state.pending_ping().is_none());
        let (state, cmds) = state.reduce(Event::PongDeadline { seq });
        assert!(cmds.is_empty());
        assert_eq!(state.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn close_after_disconnect_is_a_no_op() {
        let (state, cmds) = SyncState::default().reduce(Event::TransportClosed {
            reason: "late".to_owned(),
        });
        assert!(cmds.is_empty());
        assert_eq!(state.reconnect_attempts(), 0);
    }
}
