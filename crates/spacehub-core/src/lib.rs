//! SpaceHub Core - the booking & earnings service
//!
//! This crate wires the pure booking state machine and the earnings ledger
//! to persistence, and is the only place that:
//!
//! - Serializes writers per booking and per host
//! - Orders booking writes against ledger writes (and compensates when a
//!   booking write loses a race)
//! - Publishes a [`DomainEvent`](spacehub_types::DomainEvent) after each commit
//!
//! # Example
//!
//! ```ignore
//! use spacehub_core::{BookingService, ServiceConfig};
//!
//! let service = BookingService::in_memory(ServiceConfig::default())?;
//! let booking = service.create_booking(request).await?;
//! service.capture_payment(booking.id, &guest, details).await?;
//! ```

pub mod clock;
pub mod locks;
pub mod notifier;
pub mod request;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use locks::KeyedLocks;
pub use notifier::{BroadcastNotifier, FanoutNotifier, Notifier, TracingNotifier};
pub use request::{CreateBookingRequest, PaymentDetails, WithdrawalMethod, WithdrawalRequest};
pub use service::{BookingService, ServiceConfig};

pub use spacehub_booking::{CancellationPolicy, CancellationPreview};
pub use spacehub_ledger::{EarningsSummary, LedgerPolicy, MonthlyEarnings, Withdrawal, WithdrawalReceipt};
