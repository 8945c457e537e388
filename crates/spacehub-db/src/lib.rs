//! SpaceHub Persistence Layer
//!
//! Booking and earning stores behind two traits, [`BookingStore`] and
//! [`EarningStore`], with two implementations each:
//!
//! - **PostgreSQL** ([`PgBookingStore`], [`PgEarningStore`]): the production
//!   backend. Money columns are `BIGINT` minor units; conservation and the
//!   one-original-earning-per-booking rule are enforced by table constraints.
//! - **In-memory** ([`InMemoryBookingStore`], [`InMemoryEarningStore`]): used
//!   by tests and single-process deployments.
//!
//! Every write is conditional on the state the caller read, so concurrent
//! writers surface as [`StoreError::Conflict`] instead of lost updates.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod repos;
pub mod store;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryBookingStore, InMemoryEarningStore};
pub use models::*;
pub use repos::*;
pub use store::*;

/// PostgreSQL connection pool
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| StoreError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        let postgres = sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok();
        HealthStatus { postgres }
    }

    pub fn booking_store(&self) -> PgBookingStore {
        PgBookingStore::new(self.pg.clone())
    }

    pub fn earning_store(&self) -> PgEarningStore {
        PgEarningStore::new(self.pg.clone())
    }
}

/// Health status of the database connection
#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    pub postgres: bool,
}
