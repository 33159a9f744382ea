//! Configuration loading and validation for the wallet transaction gateway.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `production.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use gateway::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("Ethereum RPC URL: {}", settings.ethereum.url);
//! ```

mod settings;

pub use settings::{
    ApiSettings, ApnSettings, CacheSettings, DatabaseSettings, EthereumSettings,
    GasOracleSettings, GcmSettings, HousekeeperSettings, LoggingSettings, MetricsSettings,
    PushSettings, QueueSettings, RateLimitSettings, Settings, WebSocketSettings,
};
