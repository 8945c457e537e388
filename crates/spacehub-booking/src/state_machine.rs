//! Booking state machine.
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    ├──► rejected └──► cancelled
//!    └──► cancelled
//! ```
//!
//! Each transition is a pure function from the current snapshot to the next
//! one. Persisting the result (and losing a version race) is the caller's
//! business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spacehub_types::{
    Actor, Booking, BookingId, BookingStatus, CancellationDetails, CoreError, Money, Party,
    PaymentMethod, PaymentStatus, PriceBreakdown, Result, RoomId, UserId,
};

use crate::policy::{CancellationPolicy, RefundQuote};

/// Whether `from → to` is an edge of the lifecycle graph.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Rejected)
            | (Pending, Cancelled)
            | (Confirmed, Completed)
            | (Confirmed, Cancelled)
    )
}

fn ensure_transition(booking: &Booking, to: BookingStatus) -> Result<()> {
    if can_transition(booking.status, to) {
        Ok(())
    } else {
        Err(CoreError::conflict(format!(
            "booking {} cannot move from {} to {}",
            booking.id, booking.status, to
        )))
    }
}

/// The actor's relation to the booking, or `Authorization` if it has none.
pub fn party(booking: &Booking, actor: &Actor) -> Result<Party> {
    booking.party_of(actor).ok_or_else(|| {
        CoreError::unauthorized(format!("{} is not a party to booking {}", actor.user_id, booking.id))
    })
}

fn require_host_or_admin(booking: &Booking, actor: &Actor, action: &str) -> Result<Party> {
    match party(booking, actor)? {
        Party::Guest => Err(CoreError::unauthorized(format!(
            "only the host or an admin may {action} booking {}",
            booking.id
        ))),
        p => Ok(p),
    }
}

/// Input for a new booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub guest_id: UserId,
    pub host_id: UserId,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub total_price: Money,
    pub price_breakdown: PriceBreakdown,
    pub payment_method: PaymentMethod,
}

impl NewBooking {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.check_out <= self.check_in {
            return Err(CoreError::validation("check_out", "must be after check_in"));
        }
        if self.check_in < now {
            return Err(CoreError::validation("check_in", "must not be in the past"));
        }
        if self.guest_id == self.host_id {
            return Err(CoreError::validation("guest_id", "a host cannot book their own room"));
        }
        Ok(())
    }
}

/// Build a pending booking, deriving its cancellation terms at `now`.
pub fn create(request: NewBooking, policy: &CancellationPolicy, now: DateTime<Utc>) -> Result<Booking> {
    request.validate(now)?;

    Ok(Booking {
        id: BookingId::new(),
        room_id: request.room_id,
        guest_id: request.guest_id,
        host_id: request.host_id,
        check_in: request.check_in,
        check_out: request.check_out,
        total_price: request.total_price,
        price_breakdown: request.price_breakdown,
        payment_status: PaymentStatus::Pending,
        payment_method: request.payment_method,
        status: BookingStatus::Pending,
        is_cancellable: policy.is_cancellable(now, request.check_in),
        cancellation_deadline: policy.cancellation_deadline(request.check_in),
        cancellation: None,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Online payment captured: the booking is paid and confirmed.
///
/// Only the guest (or an admin) pays, and only a pending, unpaid booking.
pub fn capture_online(booking: &Booking, actor: &Actor, now: DateTime<Utc>) -> Result<Booking> {
    if !booking.payment_method.is_online() {
        return Err(CoreError::validation(
            "payment_method",
            format!("booking {} is not paid online", booking.id),
        ));
    }
    if party(booking, actor)? == Party::Host {
        return Err(CoreError::unauthorized("hosts cannot pay for a booking"));
    }
    if booking.payment_status != PaymentStatus::Pending {
        return Err(CoreError::conflict(format!(
            "booking {} payment is already {}",
            booking.id, booking.payment_status
        )));
    }
    ensure_transition(booking, BookingStatus::Confirmed)?;

    let mut next = booking.clone();
    next.payment_status = PaymentStatus::Paid;
    next.status = BookingStatus::Confirmed;
    next.updated_at = now;
    Ok(next)
}

/// Pay-at-property payment received on site. Booking status is unchanged.
pub fn mark_received_at_property(
    booking: &Booking,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Booking> {
    if booking.payment_method != PaymentMethod::PayAtProperty {
        return Err(CoreError::validation(
            "payment_method",
            format!("booking {} is not paid at the property", booking.id),
        ));
    }
    require_host_or_admin(booking, actor, "record payment for")?;
    if booking.payment_status != PaymentStatus::Pending {
        return Err(CoreError::conflict(format!(
            "booking {} payment is already {}",
            booking.id, booking.payment_status
        )));
    }
    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Completed
    ) {
        return Err(CoreError::conflict(format!(
            "booking {} is {} and cannot take payment",
            booking.id, booking.status
        )));
    }

    let mut next = booking.clone();
    next.payment_status = PaymentStatus::Paid;
    next.updated_at = now;
    Ok(next)
}

pub fn confirm(booking: &Booking, actor: &Actor, now: DateTime<Utc>) -> Result<Booking> {
    require_host_or_admin(booking, actor, "confirm")?;
    ensure_transition(booking, BookingStatus::Confirmed)?;

    let mut next = booking.clone();
    next.status = BookingStatus::Confirmed;
    next.updated_at = now;
    Ok(next)
}

/// Complete a stay. Before check-out only an admin may do this.
pub fn complete(booking: &Booking, actor: &Actor, now: DateTime<Utc>) -> Result<Booking> {
    let who = require_host_or_admin(booking, actor, "complete")?;
    ensure_transition(booking, BookingStatus::Completed)?;
    if who != Party::Admin && now < booking.check_out {
        return Err(CoreError::conflict(format!(
            "booking {} cannot be completed before check-out",
            booking.id
        )));
    }

    let mut next = booking.clone();
    next.status = BookingStatus::Completed;
    next.updated_at = now;
    Ok(next)
}

/// Reject a pending request. A paid booking is refunded as if the host
/// cancelled it.
pub fn reject(
    booking: &Booking,
    actor: &Actor,
    reason: &str,
    policy: &CancellationPolicy,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let who = require_host_or_admin(booking, actor, "reject")?;
    ensure_transition(booking, BookingStatus::Rejected)?;
    Ok(close(booking, BookingStatus::Rejected, who, reason, policy, now))
}

/// Why `who` may not cancel `booking` right now, if anything.
pub fn cancellation_blocker(booking: &Booking, who: Party) -> Option<String> {
    if !can_transition(booking.status, BookingStatus::Cancelled) {
        return Some(format!("booking is {}", booking.status));
    }
    match who {
        Party::Admin => None,
        Party::Host if booking.status != BookingStatus::Pending => {
            Some("hosts may only cancel pending bookings".to_string())
        }
        Party::Host => None,
        Party::Guest if !booking.is_cancellable => {
            Some("booking was made too close to check-in to be cancelled".to_string())
        }
        Party::Guest => None,
    }
}

pub fn cancel(
    booking: &Booking,
    actor: &Actor,
    reason: &str,
    policy: &CancellationPolicy,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let who = party(booking, actor)?;
    if let Some(blocker) = cancellation_blocker(booking, who) {
        return Err(if can_transition(booking.status, BookingStatus::Cancelled) {
            CoreError::unauthorized(blocker)
        } else {
            CoreError::conflict(format!("booking {} cannot be cancelled: {blocker}", booking.id))
        });
    }
    Ok(close(booking, BookingStatus::Cancelled, who, reason, policy, now))
}

/// Enter a terminal cancelled/rejected state, computing the refund once.
fn close(
    booking: &Booking,
    status: BookingStatus,
    who: Party,
    reason: &str,
    policy: &CancellationPolicy,
    now: DateTime<Utc>,
) -> Booking {
    let was_paid = booking.is_paid();
    let quote = if was_paid {
        policy.compute_refund(booking.total_price, booking.payment_status, who, booking.check_in, now)
    } else {
        RefundQuote::NONE
    };

    let mut next = booking.clone();
    next.status = status;
    next.payment_status = match (was_paid, quote.refund_amount.is_zero()) {
        (true, false) => PaymentStatus::Refunded,
        (true, true) => PaymentStatus::Paid,
        (false, _) => PaymentStatus::Cancelled,
    };
    next.cancellation = Some(CancellationDetails {
        cancelled_at: now,
        cancelled_by: who,
        reason: reason.to_string(),
        refund_amount: quote.refund_amount,
        refund_percentage: quote.refund_percentage,
    });
    next.updated_at = now;
    next
}

/// Read-only answer to "can I cancel, and for how much".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPreview {
    pub can_cancel: bool,
    pub refund_amount: Money,
    pub refund_percentage: u8,
    pub cancellation_deadline: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Preview a cancellation with the same rules [`cancel`] applies.
pub fn preview_cancellation(
    booking: &Booking,
    actor: &Actor,
    policy: &CancellationPolicy,
    now: DateTime<Utc>,
) -> CancellationPreview {
    let blocked = |reason: String| CancellationPreview {
        can_cancel: false,
        refund_amount: Money::ZERO,
        refund_percentage: 0,
        cancellation_deadline: booking.cancellation_deadline,
        reason: Some(reason),
    };

    let Some(who) = booking.party_of(actor) else {
        return blocked("not a party to this booking".to_string());
    };
    if let Some(reason) = cancellation_blocker(booking, who) {
        return blocked(reason);
    }

    let quote =
        policy.compute_refund(booking.total_price, booking.payment_status, who, booking.check_in, now);
    CancellationPreview {
        can_cancel: true,
        refund_amount: quote.refund_amount,
        refund_percentage: quote.refund_percentage,
        cancellation_deadline: booking.cancellation_deadline,
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Fixture {
        now: DateTime<Utc>,
        guest: Actor,
        host: Actor,
        admin: Actor,
        policy: CancellationPolicy,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                now: Utc::now(),
                guest: Actor::guest(UserId::new()),
                host: Actor::host(UserId::new()),
                admin: Actor::admin(UserId::new()),
                policy: CancellationPolicy::default(),
            }
        }

        fn request(&self, days_out: i64, method: PaymentMethod) -> NewBooking {
            NewBooking {
                room_id: RoomId::new(),
                guest_id: self.guest.user_id,
                host_id: self.host.user_id,
                check_in: self.now + Duration::days(days_out),
                check_out: self.now + Duration::days(days_out + 2),
                total_price: Money::from_minor(10_000),
                price_breakdown: PriceBreakdown {
                    base_price: Money::from_minor(8_000),
                    cleaning_fee: Money::from_minor(1_000),
                    service_fee: Money::from_minor(500),
                    tax: Money::from_minor(500),
                },
                payment_method: method,
            }
        }

        fn booking(&self, days_out: i64) -> Booking {
            create(self.request(days_out, PaymentMethod::Card), &self.policy, self.now).unwrap()
        }
    }

    #[test]
    fn test_transition_graph() {
        use BookingStatus::*;
        let all = [Pending, Confirmed, Completed, Cancelled, Rejected];
        let legal = [
            (Pending, Confirmed),
            (Pending, Rejected),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];
        for from in all {
            for to in all {
                assert_eq!(can_transition(from, to), legal.contains(&(from, to)), "{from} -> {to}");
            }
        }
        for terminal in [Completed, Cancelled, Rejected] {
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn test_create_derives_cancellation_terms() {
        let f = Fixture::new();
        let booking = f.booking(10);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert!(booking.is_cancellable);
        assert_eq!(booking.cancellation_deadline, booking.check_in - Duration::hours(24));

        let mut late = f.request(0, PaymentMethod::Card);
        late.check_in = f.now + Duration::hours(12);
        let late = create(late, &f.policy, f.now).unwrap();
        assert!(!late.is_cancellable);
    }

    #[test]
    fn test_create_validation() {
        let f = Fixture::new();

        let mut inverted = f.request(5, PaymentMethod::Card);
        inverted.check_out = inverted.check_in;
        assert!(matches!(create(inverted, &f.policy, f.now), Err(CoreError::Validation { .. })));

        let mut past = f.request(5, PaymentMethod::Card);
        past.check_in = f.now - Duration::days(1);
        assert!(matches!(create(past, &f.policy, f.now), Err(CoreError::Validation { .. })));

        let mut own_room = f.request(5, PaymentMethod::Card);
        own_room.guest_id = own_room.host_id;
        assert!(matches!(create(own_room, &f.policy, f.now), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_confirm_requires_host_and_pending() {
        let f = Fixture::new();
        let booking = f.booking(10);

        assert!(matches!(
            confirm(&booking, &f.guest, f.now),
            Err(CoreError::Authorization { .. })
        ));
        let stranger = Actor::host(UserId::new());
        assert!(matches!(
            confirm(&booking, &stranger, f.now),
            Err(CoreError::Authorization { .. })
        ));

        let confirmed = confirm(&booking, &f.host, f.now).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(matches!(
            confirm(&confirmed, &f.admin, f.now),
            Err(CoreError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_complete_waits_for_check_out_unless_admin() {
        let f = Fixture::new();
        let confirmed = confirm(&f.booking(10), &f.host, f.now).unwrap();

        assert!(matches!(
            complete(&confirmed, &f.host, f.now),
            Err(CoreError::StateConflict { .. })
        ));
        let after = confirmed.check_out + Duration::minutes(1);
        assert_eq!(complete(&confirmed, &f.host, after).unwrap().status, BookingStatus::Completed);
        assert_eq!(complete(&confirmed, &f.admin, f.now).unwrap().status, BookingStatus::Completed);
    }

    #[test]
    fn test_capture_online_confirms() {
        let f = Fixture::new();
        let booking = f.booking(10);
        assert!(matches!(
            capture_online(&booking, &f.host, f.now),
            Err(CoreError::Authorization { .. })
        ));

        let paid = capture_online(&booking, &f.guest, f.now).unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert!(matches!(
            capture_online(&paid, &f.guest, f.now),
            Err(CoreError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_pay_at_property_keeps_status() {
        let f = Fixture::new();
        let booking =
            create(f.request(10, PaymentMethod::PayAtProperty), &f.policy, f.now).unwrap();
        let confirmed = confirm(&booking, &f.host, f.now).unwrap();

        assert!(matches!(
            mark_received_at_property(&confirmed, &f.guest, f.now),
            Err(CoreError::Authorization { .. })
        ));
        let paid = mark_received_at_property(&confirmed, &f.host, f.now).unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        assert!(matches!(
            capture_online(&booking, &f.guest, f.now),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_guest_cancel_of_paid_booking_refunds_by_tier() {
        let f = Fixture::new();
        let paid = capture_online(&f.booking(10), &f.guest, f.now).unwrap();

        let cancelled = cancel(&paid, &f.guest, "plans changed", &f.policy, f.now).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        let details = cancelled.cancellation.as_ref().unwrap();
        assert_eq!(details.cancelled_by, Party::Guest);
        assert_eq!(details.refund_amount, Money::from_minor(10_000));
        assert!(cancelled.cancellation_is_consistent());

        let late = cancel(&paid, &f.guest, "late", &f.policy, f.now + Duration::days(9)).unwrap();
        assert_eq!(late.payment_status, PaymentStatus::Paid);
        assert_eq!(late.cancellation.unwrap().refund_percentage, 0);
    }

    #[test]
    fn test_host_may_only_cancel_pending() {
        let f = Fixture::new();
        let booking = f.booking(10);
        let cancelled = cancel(&booking, &f.host, "double booked", &f.policy, f.now).unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);

        let confirmed = confirm(&booking, &f.host, f.now).unwrap();
        assert!(matches!(
            cancel(&confirmed, &f.host, "nope", &f.policy, f.now),
            Err(CoreError::Authorization { .. })
        ));
        assert!(cancel(&confirmed, &f.admin, "ops", &f.policy, f.now).is_ok());
    }

    #[test]
    fn test_terminal_booking_cannot_be_cancelled() {
        let f = Fixture::new();
        let cancelled = cancel(&f.booking(10), &f.guest, "x", &f.policy, f.now).unwrap();
        assert!(matches!(
            cancel(&cancelled, &f.admin, "again", &f.policy, f.now),
            Err(CoreError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_reject_paid_booking_refunds_in_full() {
        let f = Fixture::new();
        let booking =
            create(f.request(2, PaymentMethod::PayAtProperty), &f.policy, f.now).unwrap();
        let paid = mark_received_at_property(&booking, &f.host, f.now).unwrap();

        let rejected = reject(&paid, &f.host, "maintenance", &f.policy, f.now).unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(rejected.payment_status, PaymentStatus::Refunded);
        let details = rejected.cancellation.unwrap();
        assert_eq!(details.cancelled_by, Party::Host);
        assert_eq!(details.refund_percentage, 100);
    }

    #[test]
    fn test_preview_matches_cancel() {
        let f = Fixture::new();
        let paid = capture_online(&f.booking(10), &f.guest, f.now).unwrap();
        let at = f.now + Duration::days(5);

        let preview = preview_cancellation(&paid, &f.guest, &f.policy, at);
        let cancelled = cancel(&paid, &f.guest, "x", &f.policy, at).unwrap();
        let details = cancelled.cancellation.unwrap();
        assert!(preview.can_cancel);
        assert_eq!(preview.refund_amount, details.refund_amount);
        assert_eq!(preview.refund_percentage, 50);

        let stranger = Actor::guest(UserId::new());
        let denied = preview_cancellation(&paid, &stranger, &f.policy, at);
        assert!(!denied.can_cancel);
        assert!(denied.reason.is_some());
    }
}
