//! Booking & earnings service.
//!
//! Every operation follows the same shape: take the per-key lock, load,
//! apply a pure transition, persist with a conditional write, apply ledger
//! side effects, then publish events. When a booking write loses a race
//! after the ledger has already been touched, the ledger change is
//! compensated before the conflict is returned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spacehub_booking::{state_machine, CancellationPolicy, CancellationPreview};
use spacehub_db::{BookingStore, EarningStore, InMemoryBookingStore, InMemoryEarningStore};
use spacehub_ledger::{
    EarningsLedger, EarningsSummary, LedgerPolicy, PayoutAllocator, Withdrawal, WithdrawalReceipt,
};
use spacehub_types::{
    Actor, Booking, BookingId, BookingStatus, CoreError, DomainEvent, Earning, Party,
    PaymentMethod, Result, UserId, WithdrawalId,
};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::locks::KeyedLocks;
use crate::notifier::{Notifier, TracingNotifier};
use crate::request::{CreateBookingRequest, PaymentDetails, WithdrawalRequest};

/// Policies the service runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub ledger: LedgerPolicy,
    #[serde(default)]
    pub cancellation: CancellationPolicy,
}

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    ledger: EarningsLedger,
    allocator: PayoutAllocator,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    cancellation: CancellationPolicy,
    booking_locks: KeyedLocks<BookingId>,
    host_locks: KeyedLocks<UserId>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        earnings: Arc<dyn EarningStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Result<Self> {
        config.ledger.validate()?;
        config.cancellation.validate()?;
        let ledger = EarningsLedger::new(earnings, config.ledger);

        Ok(Self {
            bookings,
            allocator: PayoutAllocator::new(ledger.clone()),
            ledger,
            clock,
            notifier,
            cancellation: config.cancellation,
            booking_locks: KeyedLocks::new(),
            host_locks: KeyedLocks::new(),
        })
    }

    /// In-memory stores, wall clock, events logged.
    pub fn in_memory(config: ServiceConfig) -> Result<Self> {
        Self::new(
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemoryEarningStore::new()),
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
            config,
        )
    }

    pub fn ledger(&self) -> &EarningsLedger {
        &self.ledger
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Booking", id))
    }

    fn publish(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.notifier.notify(event);
        }
    }

    fn earning_recorded(earning: &Earning) -> DomainEvent {
        DomainEvent::EarningRecorded {
            earning_id: earning.id,
            booking_id: earning.booking_id,
            host_id: earning.host_id,
            host_payout: earning.host_payout,
            available: earning.is_payable(),
            timestamp: earning.updated_at,
        }
    }

    /// Persist `next`; on failure put back earnings voided for it.
    async fn update_or_restore(&self, next: &Booking, voided: &[Earning]) -> Result<Booking> {
        match self.bookings.update(next).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                if let Err(restore_err) = self.ledger.restore(voided).await {
                    error!(
                        booking_id = %next.id,
                        error = %restore_err,
                        "Failed to restore voided earnings after booking update failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Booking lifecycle
    // =========================================================================

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        let now = self.clock.now();
        let booking = state_machine::create(request, &self.cancellation, now)?;
        self.bookings.insert(&booking).await?;

        info!(
            booking_id = %booking.id,
            guest_id = %booking.guest_id,
            host_id = %booking.host_id,
            total_price = %booking.total_price,
            payment_method = %booking.payment_method,
            is_cancellable = booking.is_cancellable,
            "Booking created"
        );
        self.publish([DomainEvent::BookingCreated {
            booking_id: booking.id,
            guest_id: booking.guest_id,
            host_id: booking.host_id,
            total_price: booking.total_price,
            timestamp: now,
        }]);
        Ok(booking)
    }

    /// A booking as seen by one of its parties.
    pub async fn get_booking(&self, id: BookingId, actor: &Actor) -> Result<Booking> {
        let booking = self.load(id).await?;
        state_machine::party(&booking, actor)?;
        debug!(booking_id = %id, "Booking read");
        Ok(booking)
    }

    pub async fn list_host_bookings(&self, host_id: UserId) -> Result<Vec<Booking>> {
        Ok(self.bookings.list_by_host(host_id).await?)
    }

    /// Capture payment and record the resulting earning.
    ///
    /// Online methods confirm the booking; pay-at-property only marks the
    /// payment received and leaves the booking status alone.
    pub async fn capture_payment(
        &self,
        id: BookingId,
        actor: &Actor,
        details: PaymentDetails,
    ) -> Result<Booking> {
        let _guard = self.booking_locks.lock(&id).await;
        let now = self.clock.now();
        let booking = self.load(id).await?;

        if details.method() != booking.payment_method {
            return Err(CoreError::validation(
                "method",
                format!(
                    "booking {} is paid by {}, not {}",
                    id,
                    booking.payment_method,
                    details.method()
                ),
            ));
        }
        details.validate(now)?;

        let next = match booking.payment_method {
            PaymentMethod::Card | PaymentMethod::EWallet => {
                state_machine::capture_online(&booking, actor, now)?
            }
            PaymentMethod::PayAtProperty => {
                state_machine::mark_received_at_property(&booking, actor, now)?
            }
        };

        // Earning first: a booking write that loses a race is undone by voiding it.
        let (mut earning, created) = self.ledger.create_earning_record(&next, now).await?;
        let saved = match self.bookings.update(&next).await {
            Ok(saved) => saved,
            Err(e) => {
                if created {
                    if let Err(void_err) = self.ledger.void_for_booking(id).await {
                        error!(
                            booking_id = %id,
                            error = %void_err,
                            "Failed to void earning after payment capture lost a race"
                        );
                    }
                }
                return Err(e.into());
            }
        };

        if saved.status == BookingStatus::Completed {
            if let Some(promoted) = self.ledger.promote_on_completion(&saved, now).await? {
                earning = promoted;
            }
        }

        info!(
            booking_id = %id,
            method = %saved.payment_method,
            amount = %saved.total_price,
            status = %saved.status,
            "Payment captured"
        );

        let mut events = vec![DomainEvent::PaymentCaptured {
            booking_id: id,
            amount: saved.total_price,
            method: saved.payment_method.to_string(),
            timestamp: now,
        }];
        if booking.status != saved.status && saved.status == BookingStatus::Confirmed {
            events.push(DomainEvent::BookingConfirmed {
                booking_id: id,
                guest_id: saved.guest_id,
                timestamp: now,
            });
        }
        if created {
            events.push(Self::earning_recorded(&earning));
        }
        self.publish(events);
        Ok(saved)
    }

    pub async fn confirm_booking(&self, id: BookingId, actor: &Actor) -> Result<Booking> {
        let _guard = self.booking_locks.lock(&id).await;
        let now = self.clock.now();
        let booking = self.load(id).await?;

        let next = state_machine::confirm(&booking, actor, now)?;
        let saved = self.bookings.update(&next).await?;

        info!(booking_id = %id, "Booking confirmed");
        self.publish([DomainEvent::BookingConfirmed {
            booking_id: id,
            guest_id: saved.guest_id,
            timestamp: now,
        }]);
        Ok(saved)
    }

    pub async fn reject_booking(&self, id: BookingId, actor: &Actor, reason: &str) -> Result<Booking> {
        let _guard = self.booking_locks.lock(&id).await;
        let now = self.clock.now();
        let booking = self.load(id).await?;

        let next = state_machine::reject(&booking, actor, reason, &self.cancellation, now)?;
        let voided = self.ledger.void_for_booking(id).await?;
        let saved = self.update_or_restore(&next, &voided).await?;

        let refund_amount = saved
            .cancellation
            .as_ref()
            .map(|c| c.refund_amount)
            .unwrap_or_default();
        info!(
            booking_id = %id,
            refund_amount = %refund_amount,
            payment_status = %saved.payment_status,
            "Booking rejected"
        );
        self.publish([DomainEvent::BookingRejected {
            booking_id: id,
            guest_id: saved.guest_id,
            reason: reason.to_string(),
            refund_amount,
            timestamp: now,
        }]);
        Ok(saved)
    }

    /// Complete a stay and make its earning payable.
    pub async fn complete_booking(&self, id: BookingId, actor: &Actor) -> Result<Booking> {
        let _guard = self.booking_locks.lock(&id).await;
        let now = self.clock.now();
        let booking = self.load(id).await?;

        let next = state_machine::complete(&booking, actor, now)?;
        let saved = self.bookings.update(&next).await?;
        info!(booking_id = %id, host_id = %saved.host_id, "Booking completed");

        let promoted = self.ledger.promote_on_completion(&saved, now).await.map_err(|e| {
            error!(
                booking_id = %id,
                error = %e,
                "Booking completed but its earning could not be promoted"
            );
            e
        })?;

        let mut events = vec![DomainEvent::BookingCompleted {
            booking_id: id,
            host_id: saved.host_id,
            timestamp: now,
        }];
        if let Some(earning) = promoted {
            events.push(DomainEvent::EarningPromoted {
                earning_id: earning.id,
                host_id: earning.host_id,
                host_payout: earning.host_payout,
                timestamp: now,
            });
        }
        self.publish(events);
        Ok(saved)
    }

    /// Cancel a booking, refunding per policy and voiding unpaid earnings.
    pub async fn cancel_booking(&self, id: BookingId, actor: &Actor, reason: &str) -> Result<Booking> {
        let _guard = self.booking_locks.lock(&id).await;
        let now = self.clock.now();
        let booking = self.load(id).await?;

        let next = state_machine::cancel(&booking, actor, reason, &self.cancellation, now)?;
        let voided = self.ledger.void_for_booking(id).await?;
        let saved = self.update_or_restore(&next, &voided).await?;

        let (cancelled_by, refund_amount, refund_percentage) = saved
            .cancellation
            .as_ref()
            .map(|c| (c.cancelled_by, c.refund_amount, c.refund_percentage))
            .unwrap_or((Party::Admin, Default::default(), 0));
        info!(
            booking_id = %id,
            cancelled_by = %cancelled_by,
            refund_amount = %refund_amount,
            refund_percentage,
            voided_earnings = voided.len(),
            "Booking cancelled"
        );
        self.publish([DomainEvent::BookingCancelled {
            booking_id: id,
            cancelled_by,
            refund_amount,
            refund_percentage,
            timestamp: now,
        }]);
        Ok(saved)
    }

    pub async fn preview_cancellation(
        &self,
        id: BookingId,
        actor: &Actor,
    ) -> Result<CancellationPreview> {
        let booking = self.load(id).await?;
        Ok(state_machine::preview_cancellation(
            &booking,
            actor,
            &self.cancellation,
            self.clock.now(),
        ))
    }

    /// Physically delete a booking. Refused while confirmed, and while a
    /// pending booking holds a received payment that has not been refunded.
    pub async fn delete_booking(&self, id: BookingId, actor: &Actor) -> Result<()> {
        let _guard = self.booking_locks.lock(&id).await;
        let booking = self.load(id).await?;

        if state_machine::party(&booking, actor)? == Party::Host {
            return Err(CoreError::unauthorized("hosts cannot delete bookings"));
        }
        if booking.status == BookingStatus::Confirmed {
            return Err(CoreError::conflict(format!(
                "booking {id} is confirmed and cannot be deleted"
            )));
        }
        if booking.status == BookingStatus::Pending && booking.is_paid() {
            return Err(CoreError::conflict(format!(
                "booking {id} has been paid; cancel it to settle the refund first"
            )));
        }

        // Completed stays keep their ledger history.
        let voided = if booking.status == BookingStatus::Completed {
            Vec::new()
        } else {
            self.ledger.void_for_booking(id).await?
        };
        if let Err(e) = self.bookings.delete(id).await {
            if let Err(restore_err) = self.ledger.restore(&voided).await {
                error!(booking_id = %id, error = %restore_err, "Failed to restore voided earnings");
            }
            return Err(e.into());
        }

        info!(booking_id = %id, actor = %actor.user_id, "Booking deleted");
        Ok(())
    }

    // =========================================================================
    // Earnings & payouts
    // =========================================================================

    /// Host-scoped reads and writes are open to the host itself or an admin.
    pub fn authorize_host(&self, actor: &Actor, host_id: UserId) -> Result<()> {
        if actor.is_admin() || actor.user_id == host_id {
            Ok(())
        } else {
            Err(CoreError::unauthorized(format!(
                "{} may not act for host {host_id}",
                actor.user_id
            )))
        }
    }

    pub async fn process_withdrawal(
        &self,
        actor: &Actor,
        request: WithdrawalRequest,
    ) -> Result<WithdrawalReceipt> {
        request.validate()?;
        self.authorize_host(actor, request.host_id)?;

        let _guard = self.host_locks.lock(&request.host_id).await;
        let now = self.clock.now();
        let receipt = self
            .allocator
            .process_withdrawal(request.host_id, request.amount, now)
            .await
            .map_err(|e| {
                warn!(
                    host_id = %request.host_id,
                    amount = %request.amount,
                    error = %e,
                    "Withdrawal refused"
                );
                e
            })?;

        info!(
            withdrawal_id = %receipt.withdrawal_id,
            host_id = %request.host_id,
            destination = %request.method.masked(),
            "Withdrawal sent"
        );
        self.publish([DomainEvent::WithdrawalProcessed {
            withdrawal_id: receipt.withdrawal_id,
            host_id: request.host_id,
            amount: receipt.amount,
            method: request.method.kind().to_string(),
            timestamp: now,
        }]);
        Ok(receipt)
    }

    pub async fn get_earnings_summary(&self, host_id: UserId) -> Result<EarningsSummary> {
        self.ledger.summary(host_id).await
    }

    pub async fn get_withdrawal(
        &self,
        host_id: UserId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal> {
        self.allocator.get_withdrawal(host_id, withdrawal_id).await
    }

    pub async fn list_withdrawals(&self, host_id: UserId) -> Result<Vec<Withdrawal>> {
        self.allocator.list_withdrawals(host_id).await
    }

    /// Promote pending earnings whose date has passed. Idempotent.
    pub async fn run_promotion_sweep(&self) -> Result<Vec<Earning>> {
        let now = self.clock.now();
        let promoted = self.ledger.promote_pending_by_date(now).await?;
        self.publish(promoted.iter().map(|e| DomainEvent::EarningPromoted {
            earning_id: e.id,
            host_id: e.host_id,
            host_payout: e.host_payout,
            timestamp: now,
        }));

        self.booking_locks.prune_idle();
        self.host_locks.prune_idle();
        Ok(promoted)
    }
}
