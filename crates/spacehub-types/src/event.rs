//! Domain events published after a state change commits.
//!
//! Events are informational: they feed notifications and activity feeds and
//! never participate in core correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookingId, EarningId, Money, Party, UserId, WithdrawalId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    BookingCreated {
        booking_id: BookingId,
        guest_id: UserId,
        host_id: UserId,
        total_price: Money,
        timestamp: DateTime<Utc>,
    },

    PaymentCaptured {
        booking_id: BookingId,
        amount: Money,
        method: String,
        timestamp: DateTime<Utc>,
    },

    BookingConfirmed {
        booking_id: BookingId,
        guest_id: UserId,
        timestamp: DateTime<Utc>,
    },

    BookingRejected {
        booking_id: BookingId,
        guest_id: UserId,
        reason: String,
        refund_amount: Money,
        timestamp: DateTime<Utc>,
    },

    BookingCompleted {
        booking_id: BookingId,
        host_id: UserId,
        timestamp: DateTime<Utc>,
    },

    BookingCancelled {
        booking_id: BookingId,
        cancelled_by: Party,
        refund_amount: Money,
        refund_percentage: u8,
        timestamp: DateTime<Utc>,
    },

    EarningRecorded {
        earning_id: EarningId,
        booking_id: BookingId,
        host_id: UserId,
        host_payout: Money,
        available: bool,
        timestamp: DateTime<Utc>,
    },

    EarningPromoted {
        earning_id: EarningId,
        host_id: UserId,
        host_payout: Money,
        timestamp: DateTime<Utc>,
    },

    WithdrawalProcessed {
        withdrawal_id: WithdrawalId,
        host_id: UserId,
        amount: Money,
        method: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated { .. } => "booking_created",
            DomainEvent::PaymentCaptured { .. } => "payment_captured",
            DomainEvent::BookingConfirmed { .. } => "booking_confirmed",
            DomainEvent::BookingRejected { .. } => "booking_rejected",
            DomainEvent::BookingCompleted { .. } => "booking_completed",
            DomainEvent::BookingCancelled { .. } => "booking_cancelled",
            DomainEvent::EarningRecorded { .. } => "earning_recorded",
            DomainEvent::EarningPromoted { .. } => "earning_promoted",
            DomainEvent::WithdrawalProcessed { .. } => "withdrawal_processed",
        }
    }
}
