//! # Mycelium Configuration
//!
//! Centralized runtime configuration and defaults for Mycelium actor
//! systems and receptionists.
//!
//! ## Features
//!
//! - **Defaults**: dispatcher throughput, ask timeouts, gossip intervals
//! - **Settings**: serde structs loaded from TOML with environment overrides
//! - **Logging**: `tracing-subscriber` initialisation driven by settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mycelium_config::{logging, RuntimeConfig};
//! use std::path::Path;
//!
//! let config = RuntimeConfig::load(Some(Path::new("config/node.toml")), None)?;
//! logging::init_tracing(&config.logging)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defaults;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use settings::{
    load_config, AskSettings, DispatcherSettings, LoggingSettings, NodeSettings,
    ReceptionistSettings, RuntimeConfig, SupervisionSettings, SupervisionStrategy,
};
