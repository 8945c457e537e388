//! End-to-end tests of the booking & earnings service against in-memory stores.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use spacehub_core::{
    BookingService, BroadcastNotifier, Clock, CreateBookingRequest, FixedClock, PaymentDetails,
    ServiceConfig, WithdrawalMethod, WithdrawalRequest,
};
use spacehub_db::{
    BookingStore, InMemoryBookingStore, InMemoryEarningStore, StoreError, StoreResult,
};
use spacehub_types::{
    Actor, Booking, BookingId, BookingStatus, CoreError, DomainEvent, EarningStatus, Money,
    PaymentMethod, PaymentStatus, PriceBreakdown, RoomId, UserId,
};

struct Harness {
    service: BookingService,
    clock: Arc<FixedClock>,
    events: BroadcastNotifier,
    guest: Actor,
    host: Actor,
    admin: Actor,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn harness_with(bookings: Arc<dyn BookingStore>) -> Harness {
    let clock = Arc::new(FixedClock::new(start()));
    let events = BroadcastNotifier::new(64);
    let service = BookingService::new(
        bookings,
        Arc::new(InMemoryEarningStore::new()),
        clock.clone(),
        Arc::new(events.clone()),
        ServiceConfig::default(),
    )
    .unwrap();

    Harness {
        service,
        clock,
        events,
        guest: Actor::guest(UserId::new()),
        host: Actor::host(UserId::new()),
        admin: Actor::admin(UserId::new()),
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(InMemoryBookingStore::new()))
}

impl Harness {
    fn request(&self, method: PaymentMethod, base: u64, check_in_days: i64) -> CreateBookingRequest {
        let check_in = self.clock.now() + Duration::days(check_in_days);
        CreateBookingRequest {
            room_id: RoomId::new(),
            guest_id: self.guest.user_id,
            host_id: self.host.user_id,
            check_in,
            check_out: check_in + Duration::days(2),
            total_price: Money::from_minor(base + 2_000),
            price_breakdown: PriceBreakdown {
                base_price: Money::from_minor(base),
                cleaning_fee: Money::from_minor(1_000),
                service_fee: Money::from_minor(500),
                tax: Money::from_minor(500),
            },
            payment_method: method,
        }
    }

    async fn paid_card_booking(&self, base: u64, check_in_days: i64) -> Booking {
        let booking = self
            .service
            .create_booking(self.request(PaymentMethod::Card, base, check_in_days))
            .await
            .unwrap();
        self.service
            .capture_payment(booking.id, &self.guest, card())
            .await
            .unwrap()
    }

    fn withdrawal(&self, amount: u64) -> WithdrawalRequest {
        WithdrawalRequest {
            host_id: self.host.user_id,
            amount: Money::from_minor(amount),
            method: WithdrawalMethod::BankTransfer {
                bank_name: "BDO".into(),
                account_number: "001234567890".into(),
                account_holder: "Host".into(),
            },
        }
    }

    async fn available(&self) -> Money {
        self.service
            .get_earnings_summary(self.host.user_id)
            .await
            .unwrap()
            .available
    }
}

fn card() -> PaymentDetails {
    PaymentDetails::Card {
        card_number: "4242 4242 4242 4242".into(),
        card_holder: "Guest".into(),
        expiry: "12/30".into(),
    }
}

fn at_property() -> PaymentDetails {
    PaymentDetails::PayAtProperty { note: None }
}

/// Total 10000 with a 10-day lead time, cancelled by the guest at `days_before`.
async fn guest_cancels_at(days_before: i64) -> Booking {
    let h = harness();
    let booking = h.paid_card_booking(8_000, 10).await;
    assert_eq!(booking.total_price, Money::from_minor(10_000));

    h.clock.advance(Duration::days(10 - days_before));
    h.service
        .cancel_booking(booking.id, &h.guest, "change of plans")
        .await
        .unwrap()
}

// ============================================================================
// Cancellation refunds
// ============================================================================

#[tokio::test]
async fn test_guest_cancels_ten_days_out_full_refund() {
    let booking = guest_cancels_at(10).await;
    let details = booking.cancellation.unwrap();
    assert_eq!(details.refund_amount, Money::from_minor(10_000));
    assert_eq!(details.refund_percentage, 100);
    assert_eq!(booking.payment_status, PaymentStatus::Refunded);
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_guest_cancels_five_days_out_half_refund() {
    let booking = guest_cancels_at(5).await;
    let details = booking.cancellation.unwrap();
    assert_eq!(details.refund_amount, Money::from_minor(5_000));
    assert_eq!(details.refund_percentage, 50);
}

#[tokio::test]
async fn test_guest_cancels_one_day_out_no_refund() {
    let booking = guest_cancels_at(1).await;
    let details = booking.cancellation.unwrap();
    assert_eq!(details.refund_amount, Money::ZERO);
    assert_eq!(details.refund_percentage, 0);
}

#[tokio::test]
async fn test_cancelled_booking_leaves_nothing_payable() {
    let h = harness();
    let booking = h.paid_card_booking(8_000, 10).await;
    assert_eq!(h.available().await, Money::from_minor(6_400));

    h.service
        .cancel_booking(booking.id, &h.guest, "change of plans")
        .await
        .unwrap();

    let summary = h.service.get_earnings_summary(h.host.user_id).await.unwrap();
    assert_eq!(summary.total, Money::ZERO);
    assert!(h.service.ledger().earnings_for_booking(booking.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preview_matches_execution() {
    let h = harness();
    let booking = h.paid_card_booking(8_000, 5).await;

    let preview = h.service.preview_cancellation(booking.id, &h.guest).await.unwrap();
    assert!(preview.can_cancel);

    let cancelled = h
        .service
        .cancel_booking(booking.id, &h.guest, "sick")
        .await
        .unwrap();
    let details = cancelled.cancellation.unwrap();
    assert_eq!(details.refund_amount, preview.refund_amount);
    assert_eq!(details.refund_percentage, preview.refund_percentage);

    let after = h.service.preview_cancellation(booking.id, &h.guest).await.unwrap();
    assert!(!after.can_cancel);
    assert!(after.reason.is_some());
}

#[tokio::test]
async fn test_guest_cannot_cancel_last_minute_booking() {
    let h = harness();
    // Less than 24h of lead time
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::PayAtProperty, 8_000, 0))
        .await
        .unwrap();
    assert!(!booking.is_cancellable);

    let err = h
        .service
        .cancel_booking(booking.id, &h.guest, "oops")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization { .. }));

    // The host still may while it is pending
    let cancelled = h
        .service
        .cancel_booking(booking.id, &h.host, "maintenance")
        .await
        .unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
}

// ============================================================================
// Ledger & payouts
// ============================================================================

#[tokio::test]
async fn test_withdrawal_splits_oldest_first() {
    let h = harness();
    // Host payouts 300, 500, 200 at an 80% share
    let first = h.paid_card_booking(375, 10).await;
    h.clock.advance(Duration::hours(1));
    let second = h.paid_card_booking(625, 10).await;
    h.clock.advance(Duration::hours(1));
    let third = h.paid_card_booking(250, 10).await;
    assert_eq!(h.available().await, Money::from_minor(1_000));

    let receipt = h.service.process_withdrawal(&h.host, h.withdrawal(650)).await.unwrap();
    assert_eq!(receipt.amount, Money::from_minor(650));
    assert_eq!(receipt.remaining_balance, Money::from_minor(350));
    assert_eq!(h.available().await, Money::from_minor(350));

    let ledger = h.service.ledger();
    let first_records = ledger.earnings_for_booking(first.id).await.unwrap();
    assert_eq!(first_records.len(), 1);
    assert_eq!(first_records[0].status, EarningStatus::PaidOut);
    assert_eq!(first_records[0].payout_id, Some(receipt.withdrawal_id));

    let second_records = ledger.earnings_for_booking(second.id).await.unwrap();
    assert_eq!(second_records.len(), 2);
    let remainder = second_records.iter().find(|e| !e.is_fragment()).unwrap();
    let fragment = second_records.iter().find(|e| e.is_fragment()).unwrap();
    assert_eq!(remainder.status, EarningStatus::Available);
    assert_eq!(remainder.host_payout, Money::from_minor(150));
    assert_eq!(fragment.status, EarningStatus::PaidOut);
    assert_eq!(fragment.host_payout, Money::from_minor(350));
    assert_eq!(
        remainder.amount.checked_add(fragment.amount),
        Some(Money::from_minor(625))
    );
    assert!(remainder.is_conserved() && fragment.is_conserved());

    let third_records = ledger.earnings_for_booking(third.id).await.unwrap();
    assert_eq!(third_records[0].status, EarningStatus::Available);
    assert_eq!(third_records[0].host_payout, Money::from_minor(200));

    let withdrawal = h
        .service
        .get_withdrawal(h.host.user_id, receipt.withdrawal_id)
        .await
        .unwrap();
    assert_eq!(withdrawal.amount, Money::from_minor(650));
    assert_eq!(withdrawal.earnings.len(), 2);
}

#[tokio::test]
async fn test_pay_at_property_becomes_available_on_completion() {
    let h = harness();
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::PayAtProperty, 10_000, 3))
        .await
        .unwrap();

    let received = h
        .service
        .capture_payment(booking.id, &h.host, at_property())
        .await
        .unwrap();
    assert_eq!(received.payment_status, PaymentStatus::Paid);
    assert_eq!(received.status, BookingStatus::Pending);

    let records = h.service.ledger().earnings_for_booking(booking.id).await.unwrap();
    assert_eq!(records[0].status, EarningStatus::Pending);
    assert_eq!(records[0].available_date, start() + Duration::days(365));
    assert_eq!(h.available().await, Money::ZERO);

    h.service.confirm_booking(booking.id, &h.host).await.unwrap();

    // Too early for the host
    let err = h.service.complete_booking(booking.id, &h.host).await.unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));

    h.clock.advance(Duration::days(5));
    let completed = h.service.complete_booking(booking.id, &h.host).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    let records = h.service.ledger().earnings_for_booking(booking.id).await.unwrap();
    assert_eq!(records[0].status, EarningStatus::Available);
    assert_eq!(records[0].available_date, h.clock.now());

    let receipt = h.service.process_withdrawal(&h.host, h.withdrawal(8_000)).await.unwrap();
    assert_eq!(receipt.remaining_balance, Money::ZERO);
}

#[tokio::test]
async fn test_insufficient_funds_reports_balance() {
    let h = harness();
    h.paid_card_booking(1_000, 10).await;

    let err = h.service.process_withdrawal(&h.host, h.withdrawal(900)).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::InsufficientFunds {
            requested: Money::from_minor(900),
            available: Money::from_minor(800),
        }
    );
    assert_eq!(h.available().await, Money::from_minor(800));
}

#[tokio::test]
async fn test_withdrawal_requires_host_or_admin() {
    let h = harness();
    h.paid_card_booking(1_000, 10).await;

    let err = h
        .service
        .process_withdrawal(&h.guest, h.withdrawal(100))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization { .. }));

    assert!(h.service.process_withdrawal(&h.admin, h.withdrawal(100)).await.is_ok());
}

#[tokio::test]
async fn test_rejecting_paid_booking_refunds_in_full() {
    let h = harness();
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::PayAtProperty, 8_000, 10))
        .await
        .unwrap();
    h.service
        .capture_payment(booking.id, &h.host, at_property())
        .await
        .unwrap();

    let rejected = h
        .service
        .reject_booking(booking.id, &h.host, "double booked")
        .await
        .unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert_eq!(rejected.payment_status, PaymentStatus::Refunded);
    assert_eq!(
        rejected.cancellation.unwrap().refund_amount,
        Money::from_minor(10_000)
    );
    assert!(h.service.ledger().earnings_for_booking(booking.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_promotion_sweep_is_idempotent() {
    let h = harness();
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::PayAtProperty, 1_000, 3))
        .await
        .unwrap();
    h.service
        .capture_payment(booking.id, &h.host, at_property())
        .await
        .unwrap();

    assert!(h.service.run_promotion_sweep().await.unwrap().is_empty());
    h.clock.advance(Duration::days(366));
    assert_eq!(h.service.run_promotion_sweep().await.unwrap().len(), 1);
    assert!(h.service.run_promotion_sweep().await.unwrap().is_empty());
    assert_eq!(h.available().await, Money::from_minor(800));
}

// ============================================================================
// Validation, authorization, deletion
// ============================================================================

#[tokio::test]
async fn test_capture_rejects_mismatched_method() {
    let h = harness();
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::Card, 1_000, 10))
        .await
        .unwrap();

    let err = h
        .service
        .capture_payment(booking.id, &h.guest, at_property())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(h.service.ledger().earnings_for_booking(booking.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_strangers_and_missing_bookings() {
    let h = harness();
    let booking = h.paid_card_booking(1_000, 10).await;
    let stranger = Actor::guest(UserId::new());

    let err = h.service.get_booking(booking.id, &stranger).await.unwrap_err();
    assert!(matches!(err, CoreError::Authorization { .. }));

    let err = h.service.get_booking(BookingId::new(), &h.guest).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "Booking", .. }));
}

#[tokio::test]
async fn test_confirm_on_terminal_booking_conflicts() {
    let h = harness();
    let booking = h.paid_card_booking(1_000, 10).await;
    h.service.cancel_booking(booking.id, &h.admin, "fraud").await.unwrap();
    let err = h.service.confirm_booking(booking.id, &h.host).await.unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));
}

#[tokio::test]
async fn test_delete_rules() {
    let h = harness();
    let confirmed = h.paid_card_booking(1_000, 10).await;
    let err = h.service.delete_booking(confirmed.id, &h.guest).await.unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));

    let pending = h
        .service
        .create_booking(h.request(PaymentMethod::Card, 1_000, 10))
        .await
        .unwrap();
    let err = h.service.delete_booking(pending.id, &h.host).await.unwrap_err();
    assert!(matches!(err, CoreError::Authorization { .. }));

    h.service.delete_booking(pending.id, &h.guest).await.unwrap();
    let err = h.service.get_booking(pending.id, &h.guest).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_paid_pending_booking_must_be_cancelled_before_delete() {
    let h = harness();
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::PayAtProperty, 5_000, 10))
        .await
        .unwrap();
    let paid = h
        .service
        .capture_payment(booking.id, &h.host, at_property())
        .await
        .unwrap();
    assert_eq!(paid.status, BookingStatus::Pending);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let err = h.service.delete_booking(booking.id, &h.guest).await.unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));
    let summary = h.service.get_earnings_summary(h.host.user_id).await.unwrap();
    assert_eq!(summary.pending, Money::from_minor(4_000));

    let cancelled = h
        .service
        .cancel_booking(booking.id, &h.guest, "plans changed")
        .await
        .unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert_eq!(
        cancelled.cancellation.as_ref().unwrap().refund_amount,
        Money::from_minor(7_000)
    );
    h.service.delete_booking(booking.id, &h.guest).await.unwrap();
}

#[tokio::test]
async fn test_invalid_policies_fail_construction() {
    let mut config = ServiceConfig::default();
    config.cancellation.partial_refund_percent = 150;
    assert!(matches!(
        BookingService::in_memory(config),
        Err(CoreError::Validation { .. })
    ));

    let mut config = ServiceConfig::default();
    config.ledger.pending_sentinel_days = i64::MAX;
    assert!(matches!(
        BookingService::in_memory(config),
        Err(CoreError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_events_follow_commits() {
    let h = harness();
    let mut rx = h.events.subscribe();
    h.paid_card_booking(1_000, 10).await;

    let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e: DomainEvent| e.kind())
        .collect();
    assert_eq!(
        kinds,
        vec!["booking_created", "payment_captured", "booking_confirmed", "earning_recorded"]
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_overdraw() {
    let h = harness();
    h.paid_card_booking(1_250, 10).await;
    assert_eq!(h.available().await, Money::from_minor(1_000));

    let first = h.withdrawal(600);
    let second = h.withdrawal(600);
    let (a, b) = futures::join!(
        h.service.process_withdrawal(&h.host, first),
        h.service.process_withdrawal(&h.host, second),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let refused = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(
        refused,
        &CoreError::InsufficientFunds {
            requested: Money::from_minor(600),
            available: Money::from_minor(400),
        }
    );
    assert_eq!(h.available().await, Money::from_minor(400));
}

#[tokio::test]
async fn test_concurrent_cancels_single_winner() {
    let h = harness();
    let booking = h.paid_card_booking(1_000, 10).await;

    let (a, b) = futures::join!(
        h.service.cancel_booking(booking.id, &h.guest, "guest"),
        h.service.cancel_booking(booking.id, &h.admin, "admin"),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CoreError::StateConflict { .. }))));

    let stored = h.service.get_booking(booking.id, &h.admin).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(stored.cancellation_is_consistent());
}

/// Booking store whose next update loses an optimistic-concurrency race.
struct LosesNextUpdate {
    inner: InMemoryBookingStore,
    armed: AtomicBool,
}

impl LosesNextUpdate {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for LosesNextUpdate {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        self.inner.insert(booking).await
    }

    async fn find_by_id(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, booking: &Booking) -> StoreResult<Booking> {
        if self.armed.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict(format!("booking {} was modified", booking.id)));
        }
        self.inner.update(booking).await
    }

    async fn delete(&self, id: BookingId) -> StoreResult<()> {
        self.inner.delete(id).await
    }

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Booking>> {
        self.inner.list_by_host(host_id).await
    }
}

#[tokio::test]
async fn test_lost_race_compensates_ledger() {
    let store = Arc::new(LosesNextUpdate {
        inner: InMemoryBookingStore::new(),
        armed: AtomicBool::new(false),
    });
    let h = harness_with(store.clone());

    // Capture: earning written, booking write loses, earning voided
    let booking = h
        .service
        .create_booking(h.request(PaymentMethod::Card, 1_000, 10))
        .await
        .unwrap();
    store.arm();
    let err = h
        .service
        .capture_payment(booking.id, &h.guest, card())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));
    assert!(h.service.ledger().earnings_for_booking(booking.id).await.unwrap().is_empty());

    // Cancel: earning voided, booking write loses, earning restored
    let paid = h
        .service
        .capture_payment(booking.id, &h.guest, card())
        .await
        .unwrap();
    store.arm();
    let err = h
        .service
        .cancel_booking(paid.id, &h.guest, "retry me")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StateConflict { .. }));
    assert_eq!(h.available().await, Money::from_minor(800));
}
