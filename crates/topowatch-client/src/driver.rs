//! Connection driver.
//!
//! [`SyncClient::spawn`] starts one task that owns the socket, the timers,
//! and the [`SyncState`]. Every input (frame, timer, control request)
//! becomes an [`Event`] fed through [`SyncState::reduce`]; the returned
//! [`Command`]s are the only place the driver touches the outside world.
//!
//! Observers read immutable [`SyncView`]s from a `watch` channel. The
//! task, and with it every reconnect, resync, ping, and pong timer, ends
//! when the [`SyncHandle`] is shut down or dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use topowatch_types::{ClientMessage, ServerMessage};

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::mirror::GraphMirror;
use crate::state::{Command, ConnectionStatus, Event, SyncState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An immutable snapshot of the engine for observers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncView {
    /// Lifecycle position.
    pub status: ConnectionStatus,
    /// The mirrored graph at this instant.
    pub graph: Arc<GraphMirror>,
    /// Server time of the last applied change.
    pub last_updated: Option<DateTime<Utc>>,
    /// Persistent error after reconnects are exhausted.
    pub error: Option<String>,
    /// Session id confirmed by the server.
    pub session_id: Option<String>,
}

impl SyncView {
    fn of(state: &SyncState) -> Self {
        Self {
            status: state.status(),
            graph: state.shared_mirror(),
            last_updated: state.last_updated(),
            error: state.error().map(str::to_owned),
            session_id: state.session_id().map(str::to_owned),
        }
    }

    /// Whether `other` shows the same thing. Graphs compare by identity:
    /// the mirror is only replaced when it is written.
    fn same_as(&self, other: &Self) -> bool {
        self.status == other.status
            && Arc::ptr_eq(&self.graph, &other.graph)
            && self.last_updated == other.last_updated
            && self.error == other.error
            && self.session_id == other.session_id
    }
}

/// Requests from the handle to the driver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Resync,
    Retry,
    Shutdown,
}

/// Entry point for the sync client.
#[derive(Debug, Clone, Copy)]
pub struct SyncClient;

impl SyncClient {
    /// Start mirroring the session named in `config`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if [`ClientConfig::validate`] rejects
    /// the config. Nothing is spawned in that case.
    pub fn spawn(config: ClientConfig) -> Result<SyncHandle, SyncError> {
        Self::spawn_with_rng(config, StdRng::from_os_rng())
    }

    /// Like [`SyncClient::spawn`] with a caller-chosen jitter source.
    ///
    /// # Errors
    ///
    /// Same as [`SyncClient::spawn`].
    pub fn spawn_with_rng(config: ClientConfig, rng: StdRng) -> Result<SyncHandle, SyncError> {
        config.validate()?;
        let state = SyncState::new(config.reconnect.max_attempts);
        let (view_tx, view_rx) = watch::channel(SyncView::of(&state));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            config,
            rng,
            state,
            socket: None,
            reconnect_at: None,
            pong_deadline: None,
            view_tx,
            control_rx,
        };
        let task = tokio::spawn(driver.run());
        Ok(SyncHandle {
            view: view_rx,
            control: control_tx,
            task,
        })
    }
}

/// Owner's handle on a running client. Dropping it stops the client.
#[derive(Debug)]
pub struct SyncHandle {
    view: watch::Receiver<SyncView>,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// The most recent view.
    pub fn view(&self) -> SyncView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<SyncView> {
        self.view.clone()
    }

    /// Ask for a fresh snapshot now instead of at the next resync tick.
    pub fn request_resync(&self) {
        let _ = self.control.send(Control::Resync);
    }

    /// Start connecting again after reconnects were exhausted.
    pub fn retry(&self) {
        let _ = self.control.send(Control::Retry);
    }

    /// Close the transport and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Err(e) = (&mut self.task).await {
            debug!(error = %e, "sync task ended abnormally");
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Driver {
    config: ClientConfig,
    rng: StdRng,
    state: SyncState,
    socket: Option<Socket>,
    reconnect_at: Option<Instant>,
    pong_deadline: Option<(u64, Instant)>,
    view_tx: watch::Sender<SyncView>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl Driver {
    async fn run(mut self) {
        info!(url = %self.config.session_url(), "sync client starting");
        let mut resync = periodic(self.config.resync_interval);
        let mut ping = periodic(self.config.ping_interval);

        self.dispatch(Event::Start).await;

        loop {
            tokio::select! {
                control = self.control_rx.recv() => match control {
                    Some(Control::Resync) => self.dispatch(Event::Resync).await,
                    Some(Control::Retry) => self.dispatch(Event::RetryRequested).await,
                    Some(Control::Shutdown) | None => break,
                },
                frame = next_frame(&mut self.socket) => {
                    if let Some(event) = self.on_frame(frame) {
                        self.dispatch(event).await;
                    }
                }
                _ = resync.tick() => self.dispatch(Event::Resync).await,
                _ = ping.tick() => self.dispatch(Event::PingTick).await,
                seq = wait_pong(self.pong_deadline) => {
                    self.pong_deadline = None;
                    self.dispatch(Event::PongDeadline { seq }).await;
                }
                () = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.dispatch(Event::ReconnectDue).await;
                }
            }
        }

        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        info!("sync client stopped");
    }

    /// Translate one transport read into an event.
    fn on_frame(
        &mut self,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Option<Event> {
        match frame {
            Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                Ok(message) => Some(Event::Inbound(message)),
                Err(e) => {
                    warn!(error = %e, "dropping malformed frame");
                    None
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                self.socket = None;
                Some(Event::TransportClosed {
                    reason: "closed by server".to_owned(),
                })
            }
            Some(Err(e)) => {
                self.socket = None;
                Some(Event::TransportClosed {
                    reason: SyncError::Connection(e.to_string()).to_string(),
                })
            }
            Some(Ok(_)) => None,
        }
    }

    /// Feed an event and every follow-up event through the reducer.
    async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let (next, commands) = std::mem::take(&mut self.state).reduce(event);
            self.state = next;
            for command in commands {
                if let Some(follow_up) = self.execute(command).await {
                    queue.push_back(follow_up);
                }
            }
        }
        if self.state.pending_ping().is_none() {
            self.pong_deadline = None;
        }
        let state = &self.state;
        self.view_tx.send_if_modified(|current| {
            let next = SyncView::of(state);
            if current.same_as(&next) {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn execute(&mut self, command: Command) -> Option<Event> {
        match command {
            Command::Connect => {
                self.reconnect_at = None;
                Some(self.connect().await)
            }
            Command::Send(message) => self.send(&message).await,
            Command::ArmPongDeadline { seq } => {
                self.pong_deadline = Some((seq, deadline_after(self.config.pong_timeout)));
                None
            }
            Command::ScheduleReconnect { attempt } => {
                let delay = self.config.reconnect.delay(attempt, &mut self.rng);
                info!(attempt, delay_ms = delay.as_millis(), "reconnect scheduled");
                self.reconnect_at = Some(deadline_after(delay));
                None
            }
            Command::CloseTransport => {
                if let Some(mut socket) = self.socket.take() {
                    let _ = socket.close(None).await;
                }
                self.pong_deadline = None;
                None
            }
        }
    }

    async fn connect(&mut self) -> Event {
        let url = self.config.session_url();
        debug!(%url, "connecting");
        match tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str())).await
        {
            Ok(Ok((socket, _response))) => {
                info!(%url, "transport open");
                self.socket = Some(socket);
                Event::TransportOpened
            }
            Ok(Err(e)) => Event::TransportClosed {
                reason: SyncError::Connection(e.to_string()).to_string(),
            },
            Err(_) => Event::TransportClosed {
                reason: SyncError::Connection("connect timed out".to_owned()).to_string(),
            },
        }
    }

    async fn send(&mut self, message: &ClientMessage) -> Option<Event> {
        let Some(socket) = self.socket.as_mut() else {
            debug!(?message, "no transport, control frame dropped");
            return None;
        };
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode control frame");
                return None;
            }
        };
        if let Err(e) = socket.send(Message::text(json)).await {
            self.socket = None;
            return Some(Event::TransportClosed {
                reason: SyncError::Connection(e.to_string()).to_string(),
            });
        }
        None
    }
}

/// Parse one server frame.
///
/// # Errors
///
/// Returns [`SyncError::Protocol`] if the frame is not a known message.
pub fn parse_frame(text: &str) -> Result<ServerMessage, SyncError> {
    serde_json::from_str(text).map_err(|e| SyncError::Protocol(e.to_string()))
}

/// A ticker whose first tick is one full period away.
fn periodic(period: Duration) -> Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();
    ticker
}

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or(now)
}

async fn next_frame(
    socket: &mut Option<Socket>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match socket.as_mut() {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_pong(deadline: Option<(u64, Instant)>) -> u64 {
    match deadline {
        Some((seq, at)) => {
            sleep_until(at).await;
            seq
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
