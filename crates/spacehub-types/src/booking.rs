//! Booking record and its status vocabularies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Actor, BookingId, Money, RoomId, UserId};

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "rejected" => Ok(BookingStatus::Rejected),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// Payment state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// How the guest pays.
///
/// `Card` and `EWallet` are captured online when the booking is paid;
/// `PayAtProperty` is settled on site and marked received by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    EWallet,
    PayAtProperty,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::PayAtProperty => "pay_at_property",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::EWallet)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "e_wallet" => Ok(PaymentMethod::EWallet),
            "pay_at_property" => Ok(PaymentMethod::PayAtProperty),
            other => Err(format!("unsupported payment method '{other}'")),
        }
    }
}

/// Who a booking-level action is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Guest,
    Host,
    Admin,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Guest => "guest",
            Party::Host => "host",
            Party::Admin => "admin",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Party::Guest),
            "host" => Ok(Party::Host),
            "admin" => Ok(Party::Admin),
            other => Err(format!("unknown party '{other}'")),
        }
    }
}

/// Price components. `base_price` is the ledger's revenue base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: Money,
    pub cleaning_fee: Money,
    pub service_fee: Money,
    pub tax: Money,
}

/// Set when a booking enters `cancelled` or `rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDetails {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Party,
    pub reason: String,
    pub refund_amount: Money,
    pub refund_percentage: u8,
}

/// A reservation of a room across a check-in/check-out interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub guest_id: UserId,
    pub host_id: UserId,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub total_price: Money,
    pub price_breakdown: PriceBreakdown,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    /// Fixed at creation.
    pub is_cancellable: bool,
    pub cancellation_deadline: DateTime<Utc>,
    pub cancellation: Option<CancellationDetails>,
    /// Optimistic concurrency counter, bumped by every persisted update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// How `actor` relates to this booking, or `None` if it has no standing.
    ///
    /// Admin role wins over ownership.
    pub fn party_of(&self, actor: &Actor) -> Option<Party> {
        if actor.is_admin() {
            Some(Party::Admin)
        } else if actor.user_id == self.host_id {
            Some(Party::Host)
        } else if actor.user_id == self.guest_id {
            Some(Party::Guest)
        } else {
            None
        }
    }

    /// `cancellation` is present iff the booking is cancelled or rejected.
    pub fn cancellation_is_consistent(&self) -> bool {
        let closed = matches!(self.status, BookingStatus::Cancelled | BookingStatus::Rejected);
        closed == self.cancellation.is_some()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}
