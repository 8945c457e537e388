//! Booking repository

use async_trait::async_trait;
use spacehub_types::{Booking, BookingId, UserId};
use sqlx::PgPool;

use crate::models::{decode_all, money_to_column};
use crate::store::BookingStore;
use crate::{DbBooking, StoreError, StoreResult};

const BOOKING_COLUMNS: &str = r#"
    id, room_id, guest_id, host_id, check_in, check_out,
    total_price, base_price, cleaning_fee, service_fee, tax,
    payment_status, payment_method, status, is_cancellable, cancellation_deadline,
    cancelled_at, cancelled_by, cancellation_reason, refund_amount, refund_percentage,
    version, created_at, updated_at
"#;

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: BookingId) -> StoreResult<bool> {
        let found: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM bookings WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

/// Cancellation columns in bind order: at, by, reason, refund amount, refund percentage.
type CancellationColumns = (
    Option<chrono::DateTime<chrono::Utc>>,
    Option<&'static str>,
    Option<String>,
    Option<i64>,
    Option<i16>,
);

fn cancellation_columns(booking: &Booking) -> StoreResult<CancellationColumns> {
    match &booking.cancellation {
        Some(c) => Ok((
            Some(c.cancelled_at),
            Some(c.cancelled_by.as_str()),
            Some(c.reason.clone()),
            Some(money_to_column(c.refund_amount)?),
            Some(i16::from(c.refund_percentage)),
        )),
        None => Ok((None, None, None, None, None)),
    }
}

fn version_column(version: u64) -> StoreResult<i64> {
    i64::try_from(version).map_err(|_| StoreError::Constraint(format!("version {version} overflows")))
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        let (cancelled_at, cancelled_by, reason, refund_amount, refund_pct) =
            cancellation_columns(booking)?;
        let prices = &booking.price_breakdown;

        let result = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, room_id, guest_id, host_id, check_in, check_out,
                total_price, base_price, cleaning_fee, service_fee, tax,
                payment_status, payment_method, status, is_cancellable, cancellation_deadline,
                cancelled_at, cancelled_by, cancellation_reason, refund_amount, refund_percentage,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(booking.id.0)
        .bind(booking.room_id.0)
        .bind(booking.guest_id.0)
        .bind(booking.host_id.0)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(money_to_column(booking.total_price)?)
        .bind(money_to_column(prices.base_price)?)
        .bind(money_to_column(prices.cleaning_fee)?)
        .bind(money_to_column(prices.service_fee)?)
        .bind(money_to_column(prices.tax)?)
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.as_str())
        .bind(booking.status.as_str())
        .bind(booking.is_cancellable)
        .bind(booking.cancellation_deadline)
        .bind(cancelled_at)
        .bind(cancelled_by)
        .bind(reason)
        .bind(refund_amount)
        .bind(refund_pct)
        .bind(version_column(booking.version)?)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, DbBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn update(&self, booking: &Booking) -> StoreResult<Booking> {
        let (cancelled_at, cancelled_by, reason, refund_amount, refund_pct) =
            cancellation_columns(booking)?;

        let row = sqlx::query_as::<_, DbBooking>(&format!(
            r#"
            UPDATE bookings SET
                payment_status = $3,
                status = $4,
                cancelled_at = $5,
                cancelled_by = $6,
                cancellation_reason = $7,
                refund_amount = $8,
                refund_percentage = $9,
                updated_at = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.id.0)
        .bind(version_column(booking.version)?)
        .bind(booking.payment_status.as_str())
        .bind(booking.status.as_str())
        .bind(cancelled_at)
        .bind(cancelled_by)
        .bind(reason)
        .bind(refund_amount)
        .bind(refund_pct)
        .bind(booking.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Booking::try_from(row),
            None if self.exists(booking.id).await? => Err(StoreError::Conflict(format!(
                "booking {} was modified concurrently (expected version {})",
                booking.id, booking.version
            ))),
            None => Err(StoreError::NotFound(booking.id.to_string())),
        }
    }

    async fn delete(&self, id: BookingId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1 AND status <> 'confirmed'")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        if self.exists(id).await? {
            Err(StoreError::Constraint(format!(
                "booking {id} is confirmed and cannot be deleted"
            )))
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, DbBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE host_id = $1 ORDER BY created_at DESC"
        ))
        .bind(host_id.0)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }
}
