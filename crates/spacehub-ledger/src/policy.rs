//! Revenue split and ledger timing.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use spacehub_types::{CoreError, Money, Result};

/// A hundred years; keeps the sentinel date inside chrono's range.
const MAX_SENTINEL_DAYS: i64 = 36_500;

/// Ledger policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Host's share of an earning's gross amount, in `[0, 1]`.
    pub host_share: Decimal,
    /// How far out a pay-at-property record's `available_date` is parked
    /// until the stay completes.
    pub pending_sentinel_days: i64,
    /// Attempts a withdrawal makes when a concurrent writer changes the
    /// records it planned against.
    pub withdrawal_max_retries: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            host_share: dec!(0.8),
            pending_sentinel_days: 365,
            withdrawal_max_retries: 3,
        }
    }
}

impl LedgerPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.host_share < Decimal::ZERO || self.host_share > Decimal::ONE {
            return Err(CoreError::validation("host_share", "must be between 0 and 1"));
        }
        if !(1..=MAX_SENTINEL_DAYS).contains(&self.pending_sentinel_days) {
            return Err(CoreError::validation(
                "pending_sentinel_days",
                format!("must be between 1 and {MAX_SENTINEL_DAYS}"),
            ));
        }
        if self.withdrawal_max_retries == 0 {
            return Err(CoreError::validation("withdrawal_max_retries", "must be at least 1"));
        }
        Ok(())
    }

    /// `(platform_fee, host_payout)` for a gross amount.
    ///
    /// The host payout is rounded half up; the fee takes the remainder so the
    /// two always add back to `amount`.
    pub fn split(&self, amount: Money) -> Result<(Money, Money)> {
        let host_payout = amount
            .mul_ratio(self.host_share)
            .filter(|payout| *payout <= amount)
            .ok_or_else(|| CoreError::validation("host_share", "does not produce a valid payout"))?;
        let platform_fee = amount.saturating_sub(host_payout);
        Ok((platform_fee, host_payout))
    }

    /// Parking date for a pending record created at `now`.
    pub fn pending_sentinel(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.pending_sentinel_days)
    }
}
