//! Cancellation refund policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use spacehub_types::{CoreError, Money, Party, PaymentStatus, Result};

const SECONDS_PER_DAY: i64 = 86_400;

/// Upper bound on any configured window, ten years.
const MAX_WINDOW_DAYS: i64 = 3_650;

/// Refund owed for a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundQuote {
    pub refund_amount: Money,
    pub refund_percentage: u8,
}

impl RefundQuote {
    pub const NONE: RefundQuote = RefundQuote {
        refund_amount: Money::ZERO,
        refund_percentage: 0,
    };
}

/// Cutoff and refund tiers.
///
/// The default is the reference policy: guests may cancel bookings made at
/// least 24 hours before check-in; a guest cancellation 7+ days out refunds
/// everything, 3 to 7 days out refunds half, later refunds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancellationPolicy {
    pub cancellation_cutoff_hours: i64,
    pub full_refund_days: i64,
    pub partial_refund_days: i64,
    pub partial_refund_percent: u8,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            cancellation_cutoff_hours: 24,
            full_refund_days: 7,
            partial_refund_days: 3,
            partial_refund_percent: 50,
        }
    }
}

impl CancellationPolicy {
    /// Reject tiers that would refund more than the price or refund more
    /// as check-in gets closer.
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_WINDOW_DAYS * 24).contains(&self.cancellation_cutoff_hours) {
            return Err(CoreError::validation(
                "cancellation_cutoff_hours",
                format!("must be between 0 and {}", MAX_WINDOW_DAYS * 24),
            ));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.full_refund_days) {
            return Err(CoreError::validation(
                "full_refund_days",
                format!("must be between 0 and {MAX_WINDOW_DAYS}"),
            ));
        }
        if self.partial_refund_days < 0 || self.partial_refund_days > self.full_refund_days {
            return Err(CoreError::validation(
                "partial_refund_days",
                "must be between 0 and full_refund_days",
            ));
        }
        if self.partial_refund_percent > 100 {
            return Err(CoreError::validation("partial_refund_percent", "must be at most 100"));
        }
        Ok(())
    }

    /// Latest moment a guest may still cancel.
    pub fn cancellation_deadline(&self, check_in: DateTime<Utc>) -> DateTime<Utc> {
        check_in - Duration::hours(self.cancellation_cutoff_hours)
    }

    /// Whether a booking created at `created_at` is guest-cancellable at all.
    /// Fixed once at creation.
    pub fn is_cancellable(&self, created_at: DateTime<Utc>, check_in: DateTime<Utc>) -> bool {
        check_in - created_at >= Duration::hours(self.cancellation_cutoff_hours)
    }

    /// Percentage a guest gets back when cancelling at `now`.
    pub fn guest_refund_percent(&self, check_in: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
        let seconds_before = (check_in - now).num_seconds();
        if seconds_before >= self.full_refund_days * SECONDS_PER_DAY {
            100
        } else if seconds_before >= self.partial_refund_days * SECONDS_PER_DAY {
            self.partial_refund_percent
        } else {
            0
        }
    }

    /// Refund for cancelling a booking at `now`.
    ///
    /// Nothing is refunded unless the booking was paid. Host and admin
    /// cancellations refund the full price; guest cancellations follow the
    /// day tiers.
    pub fn compute_refund(
        &self,
        total_price: Money,
        payment_status: PaymentStatus,
        cancelled_by: Party,
        check_in: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RefundQuote {
        if payment_status != PaymentStatus::Paid {
            return RefundQuote::NONE;
        }

        let percent = match cancelled_by {
            Party::Host | Party::Admin => 100,
            Party::Guest => self.guest_refund_percent(check_in, now),
        };
        let refund_amount = total_price.percent(percent);

        RefundQuote {
            refund_amount,
            refund_percentage: refund_amount.percentage_of(total_price),
        }
    }
}
