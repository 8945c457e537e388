//! In-memory store implementations.
//!
//! Used by tests and by the `memory` storage backend. Each store keeps its
//! rows behind a single `RwLock`, so every trait method is atomic with respect
//! to the others, matching the transactional guarantees of the PostgreSQL
//! repositories.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spacehub_types::{
    Booking, BookingId, BookingStatus, Earning, EarningId, EarningStatus, UserId, WithdrawalId,
};
use tokio::sync::RwLock;

use crate::store::{BookingStore, EarningStore, WithdrawalPlan};
use crate::{StoreError, StoreResult};

/// Bookings keyed by id.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking) -> StoreResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let stored = bookings
            .get_mut(&booking.id)
            .ok_or_else(|| StoreError::NotFound(booking.id.to_string()))?;

        if stored.version != booking.version {
            return Err(StoreError::Conflict(format!(
                "booking {} was modified concurrently (expected version {}, found {})",
                booking.id, booking.version, stored.version
            )));
        }

        let mut next = booking.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete(&self, id: BookingId) -> StoreResult<()> {
        let mut bookings = self.bookings.write().await;
        match bookings.get(&id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(b) if b.status == BookingStatus::Confirmed => Err(StoreError::Constraint(
                format!("booking {id} is confirmed and cannot be deleted"),
            )),
            Some(_) => {
                bookings.remove(&id);
                Ok(())
            }
        }
    }

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut list: Vec<Booking> = bookings
            .values()
            .filter(|b| b.host_id == host_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[derive(Default)]
struct EarningTable {
    rows: HashMap<EarningId, Earning>,
    /// Stands in for the unique index on originals.
    originals: HashMap<BookingId, EarningId>,
}

impl EarningTable {
    fn sorted(&self, mut pred: impl FnMut(&Earning) -> bool) -> Vec<Earning> {
        let mut list: Vec<Earning> = self.rows.values().filter(|e| pred(e)).cloned().collect();
        list.sort_by_key(|e| (e.created_at, e.id.0));
        list
    }

    fn check_available(
        &self,
        plan: &WithdrawalPlan,
        id: &EarningId,
        expected: spacehub_types::Money,
    ) -> StoreResult<&Earning> {
        let row = self
            .rows
            .get(id)
            .ok_or_else(|| StoreError::Conflict(format!("earning {id} no longer exists")))?;
        if row.host_id != plan.host_id
            || row.status != EarningStatus::Available
            || row.host_payout != expected
        {
            return Err(StoreError::Conflict(format!(
                "earning {id} changed since it was read"
            )));
        }
        Ok(row)
    }
}

/// Earning ledger records.
#[derive(Clone, Default)]
pub struct InMemoryEarningStore {
    table: Arc<RwLock<EarningTable>>,
}

impl InMemoryEarningStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EarningStore for InMemoryEarningStore {
    async fn insert_if_absent(&self, earning: &Earning) -> StoreResult<(Earning, bool)> {
        if earning.is_fragment() {
            return Err(StoreError::Constraint(
                "fragments are only created by withdrawals".to_string(),
            ));
        }

        let mut table = self.table.write().await;
        if let Some(existing_id) = table.originals.get(&earning.booking_id) {
            let existing = table
                .rows
                .get(existing_id)
                .cloned()
                .ok_or_else(|| StoreError::Decode(format!("dangling index for {existing_id}")))?;
            return Ok((existing, false));
        }
        if table.rows.contains_key(&earning.id) {
            return Err(StoreError::Conflict(format!("earning {} already exists", earning.id)));
        }

        table.originals.insert(earning.booking_id, earning.id);
        table.rows.insert(earning.id, earning.clone());
        Ok((earning.clone(), true))
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>> {
        Ok(self.table.read().await.sorted(|e| e.booking_id == booking_id))
    }

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>> {
        Ok(self.table.read().await.sorted(|e| e.host_id == host_id))
    }

    async fn list_available_for_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>> {
        let table = self.table.read().await;
        let mut list = table.sorted(|e| e.host_id == host_id && e.status == EarningStatus::Available);
        list.sort_by_key(|e| (e.available_date, e.created_at, e.id.0));
        Ok(list)
    }

    async fn promote(&self, id: EarningId, now: DateTime<Utc>) -> StoreResult<Option<Earning>> {
        let mut table = self.table.write().await;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if row.status != EarningStatus::Pending {
            return Ok(None);
        }
        row.status = EarningStatus::Available;
        row.available_date = now;
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Earning>> {
        let mut table = self.table.write().await;
        let mut promoted = Vec::new();
        for row in table.rows.values_mut() {
            if row.status == EarningStatus::Pending && row.available_date <= now {
                row.status = EarningStatus::Available;
                row.updated_at = now;
                promoted.push(row.clone());
            }
        }
        Ok(promoted)
    }

    async fn apply_withdrawal(&self, plan: &WithdrawalPlan) -> StoreResult<Vec<Earning>> {
        let mut table = self.table.write().await;

        // Validate everything before touching anything.
        let mut seen = HashSet::new();
        for payout in &plan.full {
            if !seen.insert(payout.earning_id) {
                return Err(StoreError::Conflict(format!(
                    "earning {} listed twice in withdrawal {}",
                    payout.earning_id, plan.withdrawal_id
                )));
            }
            table.check_available(plan, &payout.earning_id, payout.expected_host_payout)?;
        }
        if let Some(split) = &plan.split {
            if !seen.insert(split.original_id) {
                return Err(StoreError::Conflict(format!(
                    "earning {} listed twice in withdrawal {}",
                    split.original_id, plan.withdrawal_id
                )));
            }
            let original =
                table.check_available(plan, &split.original_id, split.expected_host_payout)?;
            let fragment = &split.fragment;
            if fragment.host_payout >= original.host_payout
                || fragment.amount > original.amount
                || fragment.platform_fee > original.platform_fee
                || table.rows.contains_key(&fragment.id)
            {
                return Err(StoreError::Constraint(format!(
                    "invalid split of earning {}",
                    split.original_id
                )));
            }
        }

        let mut paid = Vec::with_capacity(plan.full.len() + 1);
        for payout in &plan.full {
            if let Some(row) = table.rows.get_mut(&payout.earning_id) {
                row.status = EarningStatus::PaidOut;
                row.payout_id = Some(plan.withdrawal_id);
                row.paid_out_at = Some(plan.paid_out_at);
                row.updated_at = plan.paid_out_at;
                paid.push(row.clone());
            }
        }
        if let Some(split) = &plan.split {
            let fragment = &split.fragment;
            if let Some(row) = table.rows.get_mut(&split.original_id) {
                row.amount = row.amount.saturating_sub(fragment.amount);
                row.platform_fee = row.platform_fee.saturating_sub(fragment.platform_fee);
                row.host_payout = row.host_payout.saturating_sub(fragment.host_payout);
                row.updated_at = plan.paid_out_at;
            }
            table.rows.insert(fragment.id, fragment.clone());
            paid.push(fragment.clone());
        }
        Ok(paid)
    }

    async fn void_for_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>> {
        let mut table = self.table.write().await;
        let ids: Vec<EarningId> = table
            .rows
            .values()
            .filter(|e| e.booking_id == booking_id)
            .map(|e| e.id)
            .collect();

        if ids
            .iter()
            .filter_map(|id| table.rows.get(id))
            .any(|e| e.status == EarningStatus::PaidOut)
        {
            return Err(StoreError::Conflict(format!(
                "earnings of booking {booking_id} have already been paid out"
            )));
        }

        let removed: Vec<Earning> = ids.iter().filter_map(|id| table.rows.remove(id)).collect();
        table.originals.remove(&booking_id);
        Ok(removed)
    }

    async fn restore(&self, earnings: &[Earning]) -> StoreResult<()> {
        let mut table = self.table.write().await;
        for earning in earnings {
            if !earning.is_fragment() {
                if let Some(existing) = table.originals.get(&earning.booking_id) {
                    if *existing != earning.id {
                        return Err(StoreError::Conflict(format!(
                            "booking {} already has earning {existing}",
                            earning.booking_id
                        )));
                    }
                }
                table.originals.insert(earning.booking_id, earning.id);
            }
            table.rows.entry(earning.id).or_insert_with(|| earning.clone());
        }
        Ok(())
    }

    async fn list_by_payout(
        &self,
        host_id: UserId,
        payout_id: WithdrawalId,
    ) -> StoreResult<Vec<Earning>> {
        Ok(self
            .table
            .read()
            .await
            .sorted(|e| e.host_id == host_id && e.payout_id == Some(payout_id)))
    }
}
