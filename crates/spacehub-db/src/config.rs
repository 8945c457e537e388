//! Database configuration

use serde::{Deserialize, Serialize};

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_postgres_url")]
    pub postgres_url: String,
    /// Maximum PostgreSQL connections
    #[serde(default = "default_max_connections")]
    pub pg_max_connections: u32,
    /// Minimum PostgreSQL connections
    #[serde(default = "default_min_connections")]
    pub pg_min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub pg_acquire_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: default_postgres_url(),
            pg_max_connections: default_max_connections(),
            pg_min_connections: default_min_connections(),
            pg_acquire_timeout_secs: default_acquire_timeout(),
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Mask the password in the PostgreSQL URL for logging
    pub fn postgres_url_masked(&self) -> String {
        mask_url(&self.postgres_url)
    }
}

fn default_postgres_url() -> String {
    "postgresql://localhost/spacehub".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.find('@'), url.find("://")) {
        let scheme = &url[..scheme_end + 3];
        let after_at = &url[at_pos..];
        let user_pass = &url[scheme_end + 3..at_pos];
        if let Some(colon_pos) = user_pass.find(':') {
            let user = &user_pass[..colon_pos];
            return format!("{}{}:***{}", scheme, user, after_at);
        }
    }
    url.to_string()
}
