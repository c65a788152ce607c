//! Topowatch server: pushes live network-topology changes to every
//! connected session over `WebSocket`.
//!
//! # Modules
//!
//! - [`hub`] -- Session Registry & Broadcast Hub
//! - [`pipeline`] -- Mutation Pipeline (commit, then broadcast)
//! - [`keepalive`] -- periodic pings to every connection
//! - [`ws`] -- the `/ws/{session_id}` socket handler
//! - [`handlers`] / [`router`] -- REST surface
//! - [`server`] / [`startup`] -- lifecycle

pub mod error;
pub mod handlers;
pub mod hub;
pub mod keepalive;
pub mod pipeline;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::{ApiError, PipelineError};
pub use hub::{ChannelSink, ConnectionId, Frame, SessionHub, SessionSink, SinkError};
pub use pipeline::{MutationOrigin, MutationPipeline};
pub use state::AppState;
