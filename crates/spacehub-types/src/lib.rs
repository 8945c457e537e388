//! SpaceHub Types - Canonical domain types for the booking & earnings core
//!
//! This crate has zero dependencies on other spacehub crates. It defines:
//!
//! - Identity types (BookingId, UserId, EarningId, WithdrawalId, ...)
//! - `Money`, a fixed-point amount in currency minor units
//! - The `Booking` and `Earning` records and their status vocabularies
//! - `Actor` / `Role` for authorization decisions
//! - `DomainEvent`, published after every committed state change
//! - `CoreError`, the error taxonomy every core operation returns
//!
//! # Lifecycle
//!
//! ```text
//! Booking:  pending ──► confirmed ──► completed
//!              │            │
//!              ├──► rejected └──► cancelled
//!              └──► cancelled
//!
//! Earning:  pending ──► available ──► paid_out
//!                           │
//!                           └──► (split) available remainder + paid_out fragment
//! ```

pub mod identity;
pub mod money;
pub mod actor;
pub mod booking;
pub mod earning;
pub mod event;
pub mod error;

pub use identity::*;
pub use money::*;
pub use actor::*;
pub use booking::*;
pub use earning::*;
pub use event::*;
pub use error::*;
