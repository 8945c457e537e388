//! Server Configuration
//!
//! Layered: optional `--config` file, `config/default`, `config/local`,
//! then `SPACEHUB__`-prefixed environment variables, then CLI flags.

use std::net::SocketAddr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spacehub_api::ApiConfig;
use spacehub_booking::CancellationPolicy;
use spacehub_core::ServiceConfig;
use spacehub_db::DatabaseConfig;
use spacehub_ledger::LedgerPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Cancellation cutoff and refund tiers
    #[serde(default)]
    pub policy: CancellationPolicy,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// How long in-flight requests get to drain after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {e}", self.host, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub host_share: Decimal,
    pub pending_sentinel_days: i64,
    pub withdrawal_max_retries: u32,
    /// Interval of the pending-earnings promotion sweep; 0 disables it
    pub promotion_sweep_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let policy = LedgerPolicy::default();
        Self {
            host_share: policy.host_share,
            pending_sentinel_days: policy.pending_sentinel_days,
            withdrawal_max_retries: policy.withdrawal_max_retries,
            promotion_sweep_secs: 300,
        }
    }
}

impl LedgerSettings {
    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            host_share: self.host_share,
            pending_sentinel_days: self.pending_sentinel_days,
            withdrawal_max_retries: self.withdrawal_max_retries,
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.promotion_sweep_secs > 0).then(|| Duration::from_secs(self.promotion_sweep_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error (or any `EnvFilter` directive)
    pub level: String,
    /// json or pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from files and the environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("SPACEHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let server_config: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(server_config)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            ledger: self.ledger.policy(),
            cancellation: self.policy,
        }
    }
}
