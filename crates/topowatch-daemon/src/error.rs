//! Error types for the daemon binary.
//!
//! [`DaemonError`] wraps every failure mode of startup so `main` can
//! propagate with `?`.

use topowatch_store::StoreError;

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: topowatch_core::ConfigError,
    },

    /// The seed topology could not be committed.
    #[error("seed error: {source}")]
    Seed {
        /// The store's rejection.
        #[from]
        source: StoreError,
    },

    /// A seeded link names a device that is not in the seed.
    #[error("seed link {source_name} -> {target_name} names an unknown device")]
    UnknownSeedDevice {
        /// Source device name as written in the config.
        source_name: String,
        /// Target device name as written in the config.
        target_name: String,
    },

    /// The server failed to start.
    #[error("server error: {source}")]
    Server {
        /// The underlying startup error.
        #[from]
        source: topowatch_server::startup::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {0}")]
    Signal(std::io::Error),
}
