//! Configuration loading and typed config structures.
//!
//! Mirrors the structure of `topowatch-config.yaml`. Environment
//! variables override the listen address so a deployment can move the
//! server without editing the file:
//!
//! - `TOPOWATCH_HOST` overrides `server.host`
//! - `TOPOWATCH_PORT` overrides `server.port`
//! - `RUST_LOG` takes precedence over `logging.level` at subscriber init

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use topowatch_types::{Layer, LinkType, NodeType};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopologyConfig {
    /// Listen address.
    #[serde(default)]
    pub server: ServerSection,

    /// Keepalive and per-session queue settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Topology loaded into the store at startup.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl TopologyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Listen address of the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSection {
    /// Override host and port with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `TOPOWATCH_PORT` is not a
    /// valid port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("TOPOWATCH_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("TOPOWATCH_PORT") {
            self.port = val.parse().map_err(|_parse| ConfigError::InvalidEnv {
                name: "TOPOWATCH_PORT",
                value: val.clone(),
            })?;
        }
        Ok(())
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Server-side keepalive and fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Seconds between keepalive pings broadcast to every connection.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Frames that may queue for one connection before it is treated
    /// as failed and dropped from the registry.
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
}

impl SyncConfig {
    /// Keepalive interval as a [`Duration`].
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            session_queue_capacity: default_session_queue_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Seed topology
// ---------------------------------------------------------------------------

/// Devices and links loaded into an empty store at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedConfig {
    /// Whether to seed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Devices, referenced by `name` from [`SeedLink`].
    #[serde(default)]
    pub devices: Vec<SeedDevice>,

    /// Links between seeded devices.
    #[serde(default)]
    pub links: Vec<SeedLink>,
}

/// A seeded device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedDevice {
    /// Unique device name; also written to `metadata.device_id`.
    pub name: String,
    /// Device role.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Management address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Layer the device is drawn on.
    #[serde(default)]
    pub layer: Layer,
}

/// A seeded link between two devices named in [`SeedConfig::devices`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedLink {
    /// Name of the source device.
    pub source: String,
    /// Name of the target device.
    pub target: String,
    /// Link medium.
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    /// Nominal bandwidth.
    #[serde(default)]
    pub bandwidth: Option<String>,
    /// Subnet carried by the link, stored in `metadata.subnet`.
    #[serde(default)]
    pub subnet: Option<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        let device = |name: &str, node_type, ip: Option<&str>, layer| SeedDevice {
            name: name.to_owned(),
            node_type,
            ip_address: ip.map(str::to_owned),
            layer,
        };
        let link = |source: &str, target: &str, subnet: &str| SeedLink {
            source: source.to_owned(),
            target: target.to_owned(),
            link_type: LinkType::Ethernet,
            bandwidth: Some("1Gbps".to_owned()),
            subnet: Some(subnet.to_owned()),
        };
        Self {
            enabled: true,
            devices: vec![
                device("client", NodeType::Client, Some("192.168.10.10"), Layer::Application),
                device("switch1", NodeType::Switch, None, Layer::Datalink),
                device("frr-router", NodeType::Router, Some("192.168.10.254"), Layer::Network),
                device("switch2", NodeType::Switch, None, Layer::Datalink),
                device("server", NodeType::Server, Some("192.168.30.10"), Layer::Application),
            ],
            links: vec![
                link("client", "switch1", "192.168.10.0/24"),
                link("switch1", "frr-router", "192.168.10.0/24"),
                link("frr-router", "switch2", "192.168.30.0/24"),
                link("switch2", "server", "192.168.30.0/24"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3001
}

const fn default_ping_interval_secs() -> u64 {
    30
}

const fn default_session_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TopologyConfig::default();
        assert_eq!(config.sync.ping_interval_secs, 30);
        assert_eq!(config.sync.session_queue_capacity, 256);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.seed.devices.len(), 5);
        assert_eq!(config.seed.links.len(), 4);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
sync:
  ping_interval_secs: 10
  session_queue_capacity: 32
logging:
  level: debug
  json: true
seed:
  enabled: true
  devices:
    - name: edge-fw
      type: firewall
      ip_address: 10.0.0.1
    - name: core
      type: router
  links:
    - source: edge-fw
      target: core
      type: fiber
      bandwidth: 10Gbps
"#;
        let config = TopologyConfig::parse(yaml);
        assert!(config.is_ok(), "parse failed: {config:?}");
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.sync.ping_interval_secs, 10);
        assert_eq!(config.sync.session_queue_capacity, 32);
        assert!(config.logging.json);
        assert_eq!(config.seed.devices.len(), 2);
        assert_eq!(config.seed.links.first().map(|l| l.link_type), Some(LinkType::Fiber));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "sync:\n  ping_interval_secs: 5\n";
        let config = TopologyConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.sync.ping_interval_secs, 5);
        // Everything else uses defaults
        assert_eq!(config.sync.session_queue_capacity, 256);
        assert!(config.seed.enabled);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(TopologyConfig::parse("").is_ok());
    }

    #[test]
    fn unknown_device_type_is_rejected() {
        let yaml = "seed:\n  devices:\n    - name: x\n      type: toaster\n";
        assert!(matches!(TopologyConfig::parse(yaml), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("topowatch-config.yaml");
        if path.exists() {
            let config = TopologyConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
