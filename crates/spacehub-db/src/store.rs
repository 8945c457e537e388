//! Repository traits consumed by the booking and ledger components.
//!
//! Every mutating method is a conditional write: it states what it expects
//! the stored row to look like and fails with [`StoreError::Conflict`] when a
//! concurrent writer got there first.
//!
//! [`StoreError::Conflict`]: crate::StoreError::Conflict

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spacehub_types::{Booking, BookingId, Earning, EarningId, Money, UserId, WithdrawalId};

use crate::StoreResult;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking. Fails with `Conflict` if the id exists.
    async fn insert(&self, booking: &Booking) -> StoreResult<()>;

    async fn find_by_id(&self, id: BookingId) -> StoreResult<Option<Booking>>;

    /// Persist `booking` if the stored version equals `booking.version`.
    ///
    /// Returns the stored record with its version bumped.
    async fn update(&self, booking: &Booking) -> StoreResult<Booking>;

    /// Physically delete a booking. Refused while it is `confirmed`.
    async fn delete(&self, id: BookingId) -> StoreResult<()>;

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Booking>>;
}

/// An earning to be paid out whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPayout {
    pub earning_id: EarningId,
    /// The host payout the allocator saw; the write is refused if it changed.
    pub expected_host_payout: Money,
}

/// An available earning to be split: `fragment` is carved out and paid,
/// the original keeps the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSplit {
    pub original_id: EarningId,
    pub expected_host_payout: Money,
    /// New `paid_out` record; the original is reduced by its
    /// amount, platform fee and host payout.
    pub fragment: Earning,
}

/// Everything one withdrawal writes, applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPlan {
    pub withdrawal_id: WithdrawalId,
    pub host_id: UserId,
    pub paid_out_at: DateTime<Utc>,
    pub full: Vec<PlannedPayout>,
    pub split: Option<PlannedSplit>,
}

impl WithdrawalPlan {
    /// Sum of host payouts this plan pays out.
    pub fn total(&self) -> Money {
        let full: Money = self.full.iter().map(|p| p.expected_host_payout).sum();
        match &self.split {
            Some(split) => full.saturating_add(split.fragment.host_payout),
            None => full,
        }
    }
}

#[async_trait]
pub trait EarningStore: Send + Sync {
    /// Insert an original earning unless one already exists for its booking.
    ///
    /// Returns the stored record and whether this call created it.
    async fn insert_if_absent(&self, earning: &Earning) -> StoreResult<(Earning, bool)>;

    /// The original record and any paid-out fragments of a booking.
    async fn find_by_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>>;

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>>;

    /// Available records of a host, oldest `available_date` first.
    async fn list_available_for_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>>;

    /// `pending → available` with `available_date = now`.
    ///
    /// Returns `None` when the record is not pending (nothing changed).
    async fn promote(&self, id: EarningId, now: DateTime<Utc>) -> StoreResult<Option<Earning>>;

    /// Promote every pending record whose `available_date <= now`.
    async fn promote_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Earning>>;

    /// Apply a withdrawal atomically; returns the records now carrying its id.
    async fn apply_withdrawal(&self, plan: &WithdrawalPlan) -> StoreResult<Vec<Earning>>;

    /// Remove the unpaid records of a booking.
    ///
    /// Refused with `Conflict` if any record of the booking is paid out.
    async fn void_for_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>>;

    /// Re-insert records previously removed by `void_for_booking`.
    async fn restore(&self, earnings: &[Earning]) -> StoreResult<()>;

    async fn list_by_payout(
        &self,
        host_id: UserId,
        payout_id: WithdrawalId,
    ) -> StoreResult<Vec<Earning>>;
}
