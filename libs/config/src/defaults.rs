//! Runtime defaults
//!
//! Default configuration values shared by the actor system and the
//! receptionist so every crate agrees on them.

/// Node identity defaults
pub mod node {
    /// Node id used when none is configured
    pub const NODE_ID: &str = "local";
}

/// Dispatcher defaults
pub mod dispatcher {
    /// Messages processed before an actor yields its worker thread
    pub const THROUGHPUT: usize = 32;
}

/// Supervision defaults
pub mod supervision {
    /// Restarts allowed inside one window before the actor is stopped
    pub const MAX_RESTARTS: u32 = 5;

    /// Restart counting window (milliseconds)
    pub const RESTART_WINDOW_MS: u64 = 60_000;
}

/// Ask defaults
pub mod ask {
    /// Timeout applied by helpers that do not take an explicit one (milliseconds)
    pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;
}

/// Receptionist defaults
pub mod receptionist {
    /// Well-known actor name of the receptionist on every node
    pub const ACTOR_NAME: &str = "receptionist";

    /// Delta gossip interval (milliseconds)
    pub const GOSSIP_INTERVAL_MS: u64 = 2_000;

    /// Full-state anti-entropy runs every this many gossip ticks
    pub const FULL_SYNC_EVERY_TICKS: u32 = 10;

    /// Push deltas immediately after a local change
    pub const FLUSH_ON_CHANGE: bool = true;
}

/// Logging defaults
pub mod logging {
    /// Default `EnvFilter` directive
    pub const LEVEL: &str = "info";
}
