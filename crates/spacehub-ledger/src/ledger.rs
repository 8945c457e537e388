//! Earnings ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use spacehub_db::EarningStore;
use spacehub_types::{
    Booking, BookingId, BookingStatus, CoreError, Earning, EarningId, EarningStatus, Money,
    PaymentMethod, Result, UserId,
};
use tracing::{debug, info};

use crate::policy::LedgerPolicy;
use crate::summary::EarningsSummary;

/// Creates, promotes and voids earning records.
#[derive(Clone)]
pub struct EarningsLedger {
    store: Arc<dyn EarningStore>,
    policy: LedgerPolicy,
}

impl EarningsLedger {
    pub fn new(store: Arc<dyn EarningStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub(crate) fn store(&self) -> &Arc<dyn EarningStore> {
        &self.store
    }

    fn build_record(&self, booking: &Booking, available: bool, now: DateTime<Utc>) -> Result<Earning> {
        let amount = booking.price_breakdown.base_price;
        let (platform_fee, host_payout) = self.policy.split(amount)?;
        let (status, available_date) = if available {
            (EarningStatus::Available, now)
        } else {
            (EarningStatus::Pending, self.policy.pending_sentinel(now))
        };

        Ok(Earning {
            id: EarningId::new(),
            booking_id: booking.id,
            host_id: booking.host_id,
            amount,
            platform_fee,
            host_payout,
            status,
            payment_method: booking.payment_method,
            available_date,
            payout_id: None,
            paid_out_at: None,
            split_from: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert(&self, record: Earning) -> Result<(Earning, bool)> {
        let (earning, created) = self.store.insert_if_absent(&record).await?;
        if created {
            info!(
                earning_id = %earning.id,
                booking_id = %earning.booking_id,
                host_id = %earning.host_id,
                host_payout = %earning.host_payout,
                status = %earning.status,
                "Earning recorded"
            );
        } else {
            debug!(booking_id = %earning.booking_id, "Earning already exists, returning it");
        }
        Ok((earning, created))
    }

    /// Record the earning of a booking whose payment was just captured.
    ///
    /// Online payments are available immediately; pay-at-property payments
    /// stay pending until the stay completes. Idempotent per booking: the
    /// second call returns the first record and `false`.
    pub async fn create_earning_record(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<(Earning, bool)> {
        if !booking.is_paid() {
            return Err(CoreError::conflict(format!(
                "booking {} has not been paid",
                booking.id
            )));
        }
        let available = booking.payment_method != PaymentMethod::PayAtProperty;
        self.insert(self.build_record(booking, available, now)?).await
    }

    /// Make a completed booking's earning payable.
    ///
    /// Returns the record that became available, or `None` when there was
    /// nothing to do (already available, or payment not yet received).
    pub async fn promote_on_completion(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<Option<Earning>> {
        if booking.status != BookingStatus::Completed {
            return Err(CoreError::conflict(format!(
                "booking {} is {}, not completed",
                booking.id, booking.status
            )));
        }

        let original = self
            .store
            .find_by_booking(booking.id)
            .await?
            .into_iter()
            .find(|e| !e.is_fragment());

        match original {
            Some(e) if e.status == EarningStatus::Pending => {
                let promoted = self.store.promote(e.id, now).await?;
                if let Some(p) = &promoted {
                    info!(
                        earning_id = %p.id,
                        booking_id = %p.booking_id,
                        host_payout = %p.host_payout,
                        "Earning promoted on completion"
                    );
                }
                Ok(promoted)
            }
            Some(_) => Ok(None),
            None if booking.is_paid() => {
                let (earning, created) = self.insert(self.build_record(booking, true, now)?).await?;
                Ok(created.then_some(earning))
            }
            None => Ok(None),
        }
    }

    /// Promote every pending record whose `available_date` has passed.
    /// Safe to run repeatedly.
    pub async fn promote_pending_by_date(&self, now: DateTime<Utc>) -> Result<Vec<Earning>> {
        let promoted = self.store.promote_due(now).await?;
        if !promoted.is_empty() {
            info!(count = promoted.len(), "Promoted pending earnings by date");
        }
        Ok(promoted)
    }

    /// Remove the unpaid earnings of a booking that is being cancelled.
    pub async fn void_for_booking(&self, booking_id: BookingId) -> Result<Vec<Earning>> {
        let voided = self.store.void_for_booking(booking_id).await?;
        if !voided.is_empty() {
            info!(booking_id = %booking_id, count = voided.len(), "Earnings voided");
        }
        Ok(voided)
    }

    /// Undo [`void_for_booking`](Self::void_for_booking).
    pub async fn restore(&self, earnings: &[Earning]) -> Result<()> {
        if earnings.is_empty() {
            return Ok(());
        }
        self.store.restore(earnings).await?;
        Ok(())
    }

    pub async fn earnings_for_booking(&self, booking_id: BookingId) -> Result<Vec<Earning>> {
        Ok(self.store.find_by_booking(booking_id).await?)
    }

    pub async fn available_balance(&self, host_id: UserId) -> Result<Money> {
        let available = self.store.list_available_for_host(host_id).await?;
        Ok(available.iter().map(|e| e.host_payout).sum())
    }

    pub async fn summary(&self, host_id: UserId) -> Result<EarningsSummary> {
        let earnings = self.store.list_by_host(host_id).await?;
        Ok(EarningsSummary::from_earnings(host_id, &earnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use spacehub_db::InMemoryEarningStore;
    use spacehub_types::{PaymentStatus, PriceBreakdown, RoomId};

    fn ledger() -> EarningsLedger {
        EarningsLedger::new(Arc::new(InMemoryEarningStore::new()), LedgerPolicy::default())
    }

    fn paid_booking(method: PaymentMethod, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId::new(),
            room_id: RoomId::new(),
            guest_id: UserId::new(),
            host_id: UserId::new(),
            check_in: now + Duration::days(3),
            check_out: now + Duration::days(5),
            total_price: Money::from_minor(12_000),
            price_breakdown: PriceBreakdown {
                base_price: Money::from_minor(10_000),
                cleaning_fee: Money::from_minor(1_000),
                service_fee: Money::from_minor(500),
                tax: Money::from_minor(500),
            },
            payment_status: PaymentStatus::Paid,
            payment_method: method,
            status,
            is_cancellable: true,
            cancellation_deadline: now + Duration::days(2),
            cancellation: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_online_payment_is_available_immediately() {
        let ledger = ledger();
        let booking = paid_booking(PaymentMethod::Card, BookingStatus::Confirmed);
        let now = Utc::now();

        let (earning, created) = ledger.create_earning_record(&booking, now).await.unwrap();
        assert!(created);
        assert_eq!(earning.status, EarningStatus::Available);
        assert_eq!(earning.available_date, now);
        assert_eq!(earning.amount, Money::from_minor(10_000));
        assert_eq!(earning.host_payout, Money::from_minor(8_000));
        assert!(earning.is_conserved());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let ledger = ledger();
        let booking = paid_booking(PaymentMethod::EWallet, BookingStatus::Confirmed);

        let (first, _) = ledger.create_earning_record(&booking, Utc::now()).await.unwrap();
        let (second, created) = ledger.create_earning_record(&booking, Utc::now()).await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(ledger.earnings_for_booking(booking.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_at_property_waits_for_completion() {
        let ledger = ledger();
        let mut booking = paid_booking(PaymentMethod::PayAtProperty, BookingStatus::Confirmed);
        let now = Utc::now();

        let (earning, _) = ledger.create_earning_record(&booking, now).await.unwrap();
        assert_eq!(earning.status, EarningStatus::Pending);
        assert_eq!(earning.available_date, now + Duration::days(365));
        assert_eq!(ledger.available_balance(booking.host_id).await.unwrap(), Money::ZERO);
        assert!(ledger.promote_pending_by_date(now).await.unwrap().is_empty());

        booking.status = BookingStatus::Completed;
        let later = now + Duration::days(5);
        let promoted = ledger.promote_on_completion(&booking, later).await.unwrap().unwrap();
        assert_eq!(promoted.status, EarningStatus::Available);
        assert_eq!(promoted.available_date, later);
        assert_eq!(
            ledger.available_balance(booking.host_id).await.unwrap(),
            Money::from_minor(8_000)
        );

        // Second completion signal changes nothing
        assert!(ledger.promote_on_completion(&booking, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completion_creates_missing_record() {
        let ledger = ledger();
        let booking = paid_booking(PaymentMethod::PayAtProperty, BookingStatus::Completed);

        let created = ledger.promote_on_completion(&booking, Utc::now()).await.unwrap().unwrap();
        assert_eq!(created.status, EarningStatus::Available);
    }

    #[tokio::test]
    async fn test_unpaid_booking_gets_no_record() {
        let ledger = ledger();
        let mut booking = paid_booking(PaymentMethod::PayAtProperty, BookingStatus::Completed);
        booking.payment_status = PaymentStatus::Pending;

        assert!(ledger.create_earning_record(&booking, Utc::now()).await.is_err());
        assert!(ledger.promote_on_completion(&booking, Utc::now()).await.unwrap().is_none());
        assert!(ledger.earnings_for_booking(booking.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_promotes_due_records_once() {
        let ledger = ledger();
        let booking = paid_booking(PaymentMethod::PayAtProperty, BookingStatus::Confirmed);
        let now = Utc::now();
        ledger.create_earning_record(&booking, now).await.unwrap();

        let due = now + Duration::days(366);
        assert_eq!(ledger.promote_pending_by_date(due).await.unwrap().len(), 1);
        assert!(ledger.promote_pending_by_date(due).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_void_then_restore() {
        let ledger = ledger();
        let booking = paid_booking(PaymentMethod::Card, BookingStatus::Confirmed);
        ledger.create_earning_record(&booking, Utc::now()).await.unwrap();

        let voided = ledger.void_for_booking(booking.id).await.unwrap();
        assert_eq!(voided.len(), 1);
        assert_eq!(ledger.available_balance(booking.host_id).await.unwrap(), Money::ZERO);

        ledger.restore(&voided).await.unwrap();
        assert_eq!(
            ledger.available_balance(booking.host_id).await.unwrap(),
            Money::from_minor(8_000)
        );
    }
}
