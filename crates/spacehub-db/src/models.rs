//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spacehub_types::{
    Booking, BookingId, CancellationDetails, Earning, EarningId, Money, PriceBreakdown, RoomId,
    UserId, WithdrawalId,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::StoreError;

// ============================================================================
// Booking Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbBooking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub total_price: i64,
    pub base_price: i64,
    pub cleaning_fee: i64,
    pub service_fee: i64,
    pub tax: i64,
    pub payment_status: String,
    pub payment_method: String,
    pub status: String,
    pub is_cancellable: bool,
    pub cancellation_deadline: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_percentage: Option<i16>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Earning Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEarning {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub host_id: Uuid,
    pub amount: i64,
    pub platform_fee: i64,
    pub host_payout: i64,
    pub status: String,
    pub payment_method: String,
    pub available_date: DateTime<Utc>,
    pub payout_id: Option<Uuid>,
    pub paid_out_at: Option<DateTime<Utc>>,
    pub split_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Column conversions
// ============================================================================

pub(crate) fn money_from_column(column: &str, value: i64) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

pub(crate) fn money_to_column(value: Money) -> Result<i64, StoreError> {
    i64::try_from(value.minor())
        .map_err(|_| StoreError::Constraint(format!("amount {value} exceeds column range")))
}

fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, StoreError> {
    value.parse().map_err(StoreError::Decode)
}

impl TryFrom<DbBooking> for Booking {
    type Error = StoreError;

    fn try_from(row: DbBooking) -> Result<Self, Self::Error> {
        let cancellation = match row.cancelled_at {
            Some(cancelled_at) => {
                let cancelled_by = row.cancelled_by.as_deref().ok_or_else(|| {
                    StoreError::Decode(format!("booking {} cancelled without a party", row.id))
                })?;
                let refund_percentage = row.refund_percentage.unwrap_or(0);
                Some(CancellationDetails {
                    cancelled_at,
                    cancelled_by: parse_column(cancelled_by)?,
                    reason: row.cancellation_reason.clone().unwrap_or_default(),
                    refund_amount: money_from_column(
                        "refund_amount",
                        row.refund_amount.unwrap_or(0),
                    )?,
                    refund_percentage: u8::try_from(refund_percentage).map_err(|_| {
                        StoreError::Decode(format!("refund_percentage out of range: {refund_percentage}"))
                    })?,
                })
            }
            None => None,
        };

        Ok(Booking {
            id: BookingId::from_uuid(row.id),
            room_id: RoomId::from_uuid(row.room_id),
            guest_id: UserId::from_uuid(row.guest_id),
            host_id: UserId::from_uuid(row.host_id),
            check_in: row.check_in,
            check_out: row.check_out,
            total_price: money_from_column("total_price", row.total_price)?,
            price_breakdown: PriceBreakdown {
                base_price: money_from_column("base_price", row.base_price)?,
                cleaning_fee: money_from_column("cleaning_fee", row.cleaning_fee)?,
                service_fee: money_from_column("service_fee", row.service_fee)?,
                tax: money_from_column("tax", row.tax)?,
            },
            payment_status: parse_column(&row.payment_status)?,
            payment_method: parse_column(&row.payment_method)?,
            status: parse_column(&row.status)?,
            is_cancellable: row.is_cancellable,
            cancellation_deadline: row.cancellation_deadline,
            cancellation,
            version: u64::try_from(row.version)
                .map_err(|_| StoreError::Decode(format!("negative version {}", row.version)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<DbEarning> for Earning {
    type Error = StoreError;

    fn try_from(row: DbEarning) -> Result<Self, Self::Error> {
        Ok(Earning {
            id: EarningId::from_uuid(row.id),
            booking_id: BookingId::from_uuid(row.booking_id),
            host_id: UserId::from_uuid(row.host_id),
            amount: money_from_column("amount", row.amount)?,
            platform_fee: money_from_column("platform_fee", row.platform_fee)?,
            host_payout: money_from_column("host_payout", row.host_payout)?,
            status: parse_column(&row.status)?,
            payment_method: parse_column(&row.payment_method)?,
            available_date: row.available_date,
            payout_id: row.payout_id.map(WithdrawalId::from_uuid),
            paid_out_at: row.paid_out_at,
            split_from: row.split_from.map(EarningId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert a list of rows, failing on the first undecodable one.
pub(crate) fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
