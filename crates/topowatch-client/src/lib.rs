//! Client reconciliation engine for Topowatch.
//!
//! Keeps a local mirror of a server's topology graph consistent despite
//! dropped frames, reordering, and disconnects.
//!
//! # Architecture
//!
//! ```text
//! socket / timers / handle --> Event --> SyncState::reduce --> Command --> socket / timers
//!                                              |
//!                                              v
//!                                   watch<SyncView> --> adapter --> display
//! ```
//!
//! - [`state`] -- the pure reducer and connection state machine
//! - [`mirror`] -- snapshot/delta application with cascade deletion
//! - [`backoff`] -- bounded linear or jittered exponential reconnects
//! - [`driver`] -- the task that owns the `WebSocket` and timers
//! - [`adapter`] -- display shapes, empty-value stripping, view filters
//!
//! Periodic resync, not retransmission, is what heals lost deltas: the
//! worst-case staleness of a connected client is one resync interval
//! plus a round trip.

pub mod adapter;
pub mod backoff;
pub mod config;
pub mod driver;
pub mod error;
pub mod mirror;
pub mod state;

pub use adapter::{DisplayEdge, DisplayGraph, DisplayNode, ViewFilter};
pub use backoff::{ReconnectPolicy, ReconnectStrategy};
pub use config::ClientConfig;
pub use driver::{SyncClient, SyncHandle, SyncView, parse_frame};
pub use error::SyncError;
pub use mirror::{Applied, GraphMirror};
pub use state::{Command, ConnectionStatus, Event, Indicator, SyncState};
