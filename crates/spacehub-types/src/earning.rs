//! Earning ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BookingId, EarningId, Money, PaymentMethod, UserId, WithdrawalId};

/// Ledger state of an earning record. Advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    Pending,
    Available,
    PaidOut,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Pending => "pending",
            EarningStatus::Available => "available",
            EarningStatus::PaidOut => "paid_out",
        }
    }
}

impl fmt::Display for EarningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EarningStatus {
    type Err = String;

    /// There is exactly one payable state; `ready` is not an alias for it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EarningStatus::Pending),
            "available" => Ok(EarningStatus::Available),
            "paid_out" => Ok(EarningStatus::PaidOut),
            other => Err(format!("unknown earning status '{other}'")),
        }
    }
}

/// One booking's revenue, split into host payout and platform fee.
///
/// Invariant: `amount == platform_fee + host_payout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earning {
    pub id: EarningId,
    pub booking_id: BookingId,
    pub host_id: UserId,
    pub amount: Money,
    pub platform_fee: Money,
    pub host_payout: Money,
    pub status: EarningStatus,
    pub payment_method: PaymentMethod,
    /// When a pending record becomes eligible for payout.
    pub available_date: DateTime<Utc>,
    pub payout_id: Option<WithdrawalId>,
    pub paid_out_at: Option<DateTime<Utc>>,
    /// Set on paid-out fragments carved from an available record.
    pub split_from: Option<EarningId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Earning {
    pub fn is_conserved(&self) -> bool {
        self.platform_fee.checked_add(self.host_payout) == Some(self.amount)
    }

    pub fn is_fragment(&self) -> bool {
        self.split_from.is_some()
    }

    pub fn is_payable(&self) -> bool {
        self.status == EarningStatus::Available
    }
}
