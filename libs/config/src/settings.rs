//! Runtime Configuration Module
//!
//! Provides configuration loading and management for Mycelium nodes.
//! Supports loading from TOML files with environment-specific overrides.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main runtime configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Node identity
    pub node: NodeSettings,

    /// Mailbox processing
    pub dispatcher: DispatcherSettings,

    /// Fault handling
    pub supervision: SupervisionSettings,

    /// Request/response defaults
    pub ask: AskSettings,

    /// Registry replication
    pub receptionist: ReceptionistSettings,

    /// Log output
    pub logging: LoggingSettings,
}

/// Node identity settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NodeSettings {
    pub node_id: String,
}

/// Dispatcher settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Messages handled per actor before yielding to the scheduler
    pub throughput: usize,
}

/// Which built-in supervisor a system installs
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SupervisionStrategy {
    #[default]
    Stop,
    Resume,
    Restart,
}

/// Supervision settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SupervisionSettings {
    pub strategy: SupervisionStrategy,
    pub max_restarts: u32,
    pub restart_window_ms: u64,
}

/// Ask settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AskSettings {
    pub default_timeout_ms: u64,
}

/// Receptionist replication settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReceptionistSettings {
    pub gossip_interval_ms: u64,
    pub full_sync_every_ticks: u32,
    pub flush_on_change: bool,
}

/// Logging settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `mycelium_actors=debug`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_id: defaults::node::NODE_ID.to_string(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            throughput: defaults::dispatcher::THROUGHPUT,
        }
    }
}

impl Default for SupervisionSettings {
    fn default() -> Self {
        Self {
            strategy: SupervisionStrategy::Stop,
            max_restarts: defaults::supervision::MAX_RESTARTS,
            restart_window_ms: defaults::supervision::RESTART_WINDOW_MS,
        }
    }
}

impl Default for AskSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: defaults::ask::DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Default for ReceptionistSettings {
    fn default() -> Self {
        Self {
            gossip_interval_ms: defaults::receptionist::GOSSIP_INTERVAL_MS,
            full_sync_every_ticks: defaults::receptionist::FULL_SYNC_EVERY_TICKS,
            flush_on_change: defaults::receptionist::FLUSH_ON_CHANGE,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            json: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from files with environment overrides
    ///
    /// Sources are layered in order: the base TOML file, an optional
    /// `environments/<name>.toml` next to it, then `MYCELIUM__*` variables
    /// (e.g. `MYCELIUM__RECEPTIONIST__GOSSIP_INTERVAL_MS=500`).
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/mycelium.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("MYCELIUM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(node_id = %config.node.node_id, "Runtime configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string, without file or environment layers
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.node.node_id.trim().is_empty() {
            bail!("node.node_id cannot be empty");
        }
        if self.dispatcher.throughput == 0 {
            bail!("dispatcher.throughput must be at least 1");
        }
        if self.ask.default_timeout_ms == 0 {
            bail!("ask.default_timeout_ms must be greater than zero");
        }
        if self.receptionist.gossip_interval_ms == 0 {
            bail!("receptionist.gossip_interval_ms must be greater than zero");
        }
        if self.receptionist.full_sync_every_ticks == 0 {
            bail!("receptionist.full_sync_every_ticks must be at least 1");
        }
        if self.supervision.strategy == SupervisionStrategy::Restart
            && self.supervision.restart_window_ms == 0
        {
            bail!("supervision.restart_window_ms must be greater than zero for restart");
        }
        Ok(())
    }

    /// Same configuration with a different node id
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node.node_id = node_id.into();
        self
    }
}

/// Convenience function to load configuration from `MYCELIUM_CONFIG` or the default path
pub fn load_config(environment: Option<&str>) -> Result<RuntimeConfig> {
    let path = std::env::var_os("MYCELIUM_CONFIG").map(PathBuf::from);
    RuntimeConfig::load(path.as_deref(), environment)
}
