//! Configuration for the Topowatch sync server.
//!
//! The canonical configuration lives in `topowatch-config.yaml` at the
//! project root. [`config::TopologyConfig`] mirrors its structure; every
//! section is optional and falls back to the defaults documented on each
//! field.

pub mod config;

pub use config::{
    ConfigError, LoggingConfig, SeedConfig, SeedDevice, SeedLink, ServerSection, SyncConfig,
    TopologyConfig,
};
