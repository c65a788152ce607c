//! Graph Store for the Topowatch sync server.
//!
//! The sync layer treats the store as a black box behind the
//! [`GraphStore`] trait. [`MemoryGraphStore`] is the in-process
//! implementation used by the daemon and by tests.

pub mod error;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryGraphStore;
pub use store::{GraphStats, GraphStore, NodeRemoval};
