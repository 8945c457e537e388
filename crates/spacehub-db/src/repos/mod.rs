//! PostgreSQL repository implementations

mod booking;
mod earning;

pub use booking::PgBookingStore;
pub use earning::PgEarningStore;
