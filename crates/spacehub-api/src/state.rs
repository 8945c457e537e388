//! Application state shared across handlers

use std::sync::Arc;

use spacehub_core::BookingService;
use spacehub_db::Database;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    /// Present when running on PostgreSQL; used by the readiness check.
    pub database: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(service: Arc<BookingService>, database: Option<Arc<Database>>) -> Self {
        Self { service, database }
    }
}
