//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Ethereum node configuration.
    pub ethereum: EthereumSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Coordination cache configuration.
    pub cache: CacheSettings,
    /// Queue processor configuration.
    pub queue: QueueSettings,
    /// Gas price oracle configuration.
    pub gas_oracle: GasOracleSettings,
    /// Push-notification transport configuration.
    pub push: PushSettings,
    /// API server configuration.
    pub api: ApiSettings,
    /// Housekeeper configuration.
    pub housekeeper: HousekeeperSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `GATEWAY_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Ethereum
            .set_default("ethereum.url", "http://localhost:8545")?
            .set_default("ethereum.ws_url", "ws://localhost:8546")?
            .set_default("ethereum.network_id", 1)?
            .set_default("ethereum.poll_interval_ms", 1000)?
            .set_default("ethereum.max_retries", 3)?
            .set_default("ethereum.retry_delay_ms", 1000)?
            .set_default("ethereum.request_timeout_ms", 30000)?
            .set_default("ethereum.confirmations_required", 1)?
            .set_default("ethereum.reorg_max_depth", 64)?
            .set_default("ethereum.default_gas", 21000)?
            .set_default("ethereum.fallback_gas_price_wei", "20000000000")?
            .set_default("ethereum.weth_address", Option::<String>::None)?
            .set_default("ethereum.max_blocks_per_tick", 50)?
            // Database
            .set_default("database.dsn", "postgres://localhost/wallet_gateway")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            // Cache (coordination locks, nonce hints, gas floor)
            .set_default("cache.redis_url", Option::<String>::None)?
            .set_default("cache.nonce_hint_ttl_secs", 3600)?
            .set_default("cache.processing_lock_ttl_secs", 120)?
            .set_default("cache.submission_lock_ttl_secs", 5)?
            // Queue processor
            .set_default("queue.max_rerun_passes", 8)?
            // Gas price oracle
            .set_default("gas_oracle.url", Option::<String>::None)?
            .set_default("gas_oracle.poll_interval_secs", 60)?
            .set_default("gas_oracle.request_timeout_ms", 5000)?
            // Push notifications
            .set_default("push.apn.enabled", false)?
            .set_default("push.apn.team_id", "")?
            .set_default("push.apn.key_id", "")?
            .set_default("push.apn.private_key_path", "")?
            .set_default("push.apn.topic", "")?
            .set_default("push.apn.sandbox", true)?
            .set_default("push.gcm.enabled", false)?
            .set_default("push.gcm.api_key", "")?
            .set_default("push.gcm.project_id", "")?
            // API
            .set_default("api.host", "0.0.0.0")?
            .set_default("api.port", 8080)?
            .set_default("api.cors_origins", vec!["http://localhost:5173"])?
            .set_default("api.request_timeout_ms", 30000)?
            .set_default("api.websocket.max_connections", 10000)?
            .set_default("api.websocket.ping_interval_ms", 30000)?
            .set_default("api.websocket.pong_timeout_ms", 10000)?
            .set_default("api.rate_limit.requests_per_second", 100)?
            .set_default("api.rate_limit.burst_size", 200)?
            // Housekeeper
            .set_default("housekeeper.sanity_interval_secs", 60)?
            .set_default("housekeeper.stale_sender_max_age_secs", 180)?
            .set_default("housekeeper.prune_keep_blocks", 10_000)?
            // Logging
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            // Metrics
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (GATEWAY_ prefix)
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// Collects every violation rather than stopping at the first, so an
    /// operator sees the full list of fixes needed in one pass.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.ethereum.url.is_empty() {
            errors.push("ethereum.url cannot be empty".into());
        }
        if self.ethereum.network_id == 0 {
            errors.push("ethereum.network_id must be non-zero".into());
        }
        if self.ethereum.default_gas == 0 {
            errors.push("ethereum.default_gas must be non-zero".into());
        }

        if self.database.dsn.is_empty() {
            errors.push("database.dsn cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if self.cache.processing_lock_ttl_secs == 0 {
            errors.push("cache.processing_lock_ttl_secs must be non-zero".into());
        }
        if self.cache.submission_lock_ttl_secs == 0 {
            errors.push("cache.submission_lock_ttl_secs must be non-zero".into());
        }

        if self.api.port == 0 {
            errors.push("api.port must be non-zero".into());
        }
        if self.api.rate_limit.requests_per_second == 0 {
            errors.push("api.rate_limit.requests_per_second must be non-zero".into());
        }

        if self.housekeeper.sanity_interval_secs == 0 {
            errors.push("housekeeper.sanity_interval_secs must be non-zero".into());
        }

        if self.push.apn.enabled && self.push.apn.private_key_path.is_empty() {
            errors.push("push.apn.private_key_path required when push.apn.enabled".into());
        }
        if self.push.gcm.enabled && self.push.gcm.api_key.is_empty() {
            errors.push("push.gcm.api_key required when push.gcm.enabled".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Ethereum node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EthereumSettings {
    /// HTTP JSON-RPC endpoint URL.
    pub url: String,
    /// WebSocket RPC endpoint URL (for subscriptions).
    pub ws_url: String,
    /// Chain/network id, used to validate configuration at startup.
    pub network_id: u64,
    /// Block Monitor polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum retry attempts for failed node requests.
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Confirmations required before a transaction is considered final.
    pub confirmations_required: u64,
    /// Maximum reorg fork-point search depth before returning `ReorgTooDeep`.
    pub reorg_max_depth: u64,
    /// Default gas limit used when a skeleton request omits one.
    pub default_gas: u64,
    /// Fallback gas price (wei) used when the oracle has no cached value.
    pub fallback_gas_price_wei: String,
    /// The wrapped-ether contract's address, if the deployment has one.
    /// Its Deposit/Withdrawal logs get an extra synthetic ether-balance
    /// notification alongside the ordinary token-transfer one.
    pub weth_address: Option<String>,
    /// Maximum number of blocks the Block Monitor advances in a single tick.
    pub max_blocks_per_tick: u64,
}

impl EthereumSettings {
    /// Get the poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get the retry delay as a `Duration`.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection string.
    pub dsn: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Coordination cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Optional redis URL for a multi-node deployment. `None` selects the
    /// in-process `MemoryCache`, suitable for a single-node deployment only.
    pub redis_url: Option<String>,
    /// TTL for cached nonce hints, in seconds.
    pub nonce_hint_ttl_secs: u64,
    /// TTL for the per-sender processing lock, in seconds.
    pub processing_lock_ttl_secs: u64,
    /// TTL for the per-(sender, nonce) submission lock, in seconds.
    pub submission_lock_ttl_secs: u64,
}

impl CacheSettings {
    /// Get the nonce hint TTL as a `Duration`.
    #[must_use]
    pub const fn nonce_hint_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_hint_ttl_secs)
    }

    /// Get the processing lock TTL as a `Duration`.
    #[must_use]
    pub const fn processing_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.processing_lock_ttl_secs)
    }

    /// Get the submission lock TTL as a `Duration`.
    #[must_use]
    pub const fn submission_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.submission_lock_ttl_secs)
    }
}

/// Queue processor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Maximum consecutive rerun passes before a pass is forcibly
    /// rescheduled instead of looping in-process (guards against a
    /// pathological cycle of `to_address` triggers never going quiet).
    pub max_rerun_passes: u32,
}

/// Gas price oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GasOracleSettings {
    /// Oracle HTTPS endpoint. `None` disables polling; the fallback price
    /// in `ethereum.fallback_gas_price_wei` is used for every pass.
    pub url: Option<String>,
    /// Polling interval in seconds.
    pub poll_interval_secs: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl GasOracleSettings {
    /// Get the poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Push-notification transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSettings {
    /// Apple Push Notification service settings.
    pub apn: ApnSettings,
    /// Google Cloud Messaging settings.
    pub gcm: GcmSettings,
}

/// Apple Push Notification service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnSettings {
    /// Whether APN dispatch is enabled.
    pub enabled: bool,
    /// Apple Developer team id.
    pub team_id: String,
    /// APN auth key id.
    pub key_id: String,
    /// Path to the `.p8` private key file.
    pub private_key_path: String,
    /// Bundle id / push topic.
    pub topic: String,
    /// Whether to use Apple's sandbox endpoint.
    pub sandbox: bool,
}

/// Google Cloud Messaging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GcmSettings {
    /// Whether GCM dispatch is enabled.
    pub enabled: bool,
    /// FCM/GCM server API key.
    pub api_key: String,
    /// Firebase project id.
    pub project_id: String,
}

/// API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// WebSocket settings.
    pub websocket: WebSocketSettings,
    /// Rate limiting settings.
    pub rate_limit: RateLimitSettings,
}

impl ApiSettings {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Ping interval in milliseconds.
    pub ping_interval_ms: u64,
    /// Pong timeout in milliseconds.
    pub pong_timeout_ms: u64,
}

impl WebSocketSettings {
    /// Get the ping interval as a `Duration`.
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Get the pong timeout as a `Duration`.
    #[must_use]
    pub const fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum requests per second per client.
    pub requests_per_second: u32,
    /// Burst size (allows temporary spikes).
    pub burst_size: u32,
}

/// Housekeeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HousekeeperSettings {
    /// Interval between sanity sweeps, in seconds.
    pub sanity_interval_secs: u64,
    /// Age (seconds) after which a sender with pending rows is considered
    /// stale and re-queued for a Queue Processor pass.
    pub stale_sender_max_age_secs: i64,
    /// Number of most-recent blocks to retain in `block_hashes`.
    pub prune_keep_blocks: u64,
}

impl HousekeeperSettings {
    /// Get the sanity sweep interval as a `Duration`.
    #[must_use]
    pub const fn sanity_interval(&self) -> Duration {
        Duration::from_secs(self.sanity_interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Host to bind metrics server to.
    pub host: String,
    /// Port for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Get the metrics socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn ethereum_durations() {
        let ethereum = EthereumSettings {
            url: "http://localhost:8545".into(),
            ws_url: "ws://localhost:8546".into(),
            network_id: 1,
            poll_interval_ms: 1000,
            max_retries: 3,
            retry_delay_ms: 500,
            request_timeout_ms: 30000,
            confirmations_required: 1,
            reorg_max_depth: 64,
            default_gas: 21000,
            fallback_gas_price_wei: "20000000000".into(),
            weth_address: None,
            max_blocks_per_tick: 50,
        };

        assert_eq!(ethereum.poll_interval(), Duration::from_millis(1000));
        assert_eq!(ethereum.retry_delay(), Duration::from_millis(500));
        assert_eq!(ethereum.request_timeout(), Duration::from_millis(30000));
    }

    #[test]
    fn api_socket_addr() {
        let api = ApiSettings {
            host: "127.0.0.1".into(),
            port: 8080,
            cors_origins: vec![],
            request_timeout_ms: 30000,
            websocket: WebSocketSettings {
                max_connections: 1000,
                ping_interval_ms: 30000,
                pong_timeout_ms: 10000,
            },
            rate_limit: RateLimitSettings {
                requests_per_second: 100,
                burst_size: 200,
            },
        };

        assert_eq!(api.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn validation_catches_zero_connections() {
        let mut settings = create_valid_settings();
        settings.database.max_connections = 0;

        let result = settings.validate();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_connections")));
    }

    #[test]
    fn validation_catches_min_exceeds_max() {
        let mut settings = create_valid_settings();
        settings.database.min_connections = 20;
        settings.database.max_connections = 10;

        let result = settings.validate();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("min_connections")));
    }

    #[test]
    fn validation_requires_apn_key_when_enabled() {
        let mut settings = create_valid_settings();
        settings.push.apn.enabled = true;
        settings.push.apn.private_key_path = String::new();

        let result = settings.validate();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("private_key_path")));
    }

    #[test]
    fn validation_passes_for_defaults() {
        assert!(create_valid_settings().validate().is_ok());
    }

    fn create_valid_settings() -> Settings {
        Settings {
            ethereum: EthereumSettings {
                url: "http://localhost:8545".into(),
                ws_url: "ws://localhost:8546".into(),
                network_id: 1,
                poll_interval_ms: 1000,
                max_retries: 3,
                retry_delay_ms: 1000,
                request_timeout_ms: 30000,
                confirmations_required: 1,
                reorg_max_depth: 64,
                default_gas: 21000,
                fallback_gas_price_wei: "20000000000".into(),
                weth_address: None,
                max_blocks_per_tick: 50,
            },
            database: DatabaseSettings {
                dsn: "postgres://localhost/test".into(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_ms: 5000,
                idle_timeout_ms: 600_000,
            },
            cache: CacheSettings {
                redis_url: None,
                nonce_hint_ttl_secs: 3600,
                processing_lock_ttl_secs: 120,
                submission_lock_ttl_secs: 5,
            },
            queue: QueueSettings {
                max_rerun_passes: 8,
            },
            gas_oracle: GasOracleSettings {
                url: None,
                poll_interval_secs: 60,
                request_timeout_ms: 5000,
            },
            push: PushSettings {
                apn: ApnSettings {
                    enabled: false,
                    team_id: String::new(),
                    key_id: String::new(),
                    private_key_path: String::new(),
                    topic: String::new(),
                    sandbox: true,
                },
                gcm: GcmSettings {
                    enabled: false,
                    api_key: String::new(),
                    project_id: String::new(),
                },
            },
            api: ApiSettings {
                host: "0.0.0.0".into(),
                port: 8080,
                cors_origins: vec![],
                request_timeout_ms: 30000,
                websocket: WebSocketSettings {
                    max_connections: 10000,
                    ping_interval_ms: 30000,
                    pong_timeout_ms: 10000,
                },
                rate_limit: RateLimitSettings {
                    requests_per_second: 100,
                    burst_size: 200,
                },
            },
            housekeeper: HousekeeperSettings {
                sanity_interval_secs: 60,
                stale_sender_max_age_secs: 3600,
                prune_keep_blocks: 10_000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
                file_path: None,
            },
            metrics: MetricsSettings {
                enabled: true,
                host: "0.0.0.0".into(),
                port: 9090,
            },
        }
    }
}
