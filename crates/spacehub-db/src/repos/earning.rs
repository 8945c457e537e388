//! Earning ledger repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spacehub_types::{BookingId, Earning, EarningId, EarningStatus, UserId, WithdrawalId};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::models::{decode_all, money_to_column};
use crate::store::{EarningStore, WithdrawalPlan};
use crate::{DbEarning, StoreError, StoreResult};

const EARNING_COLUMNS: &str = r#"
    id, booking_id, host_id, amount, platform_fee, host_payout, status, payment_method,
    available_date, payout_id, paid_out_at, split_from, created_at, updated_at
"#;

pub struct PgEarningStore {
    pool: PgPool,
}

impl PgEarningStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn unique-index violations into conflicts; everything else stays a query error.
fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Query(err),
    }
}

/// Insert one earning row. `on_conflict` is appended verbatim after VALUES.
async fn insert_row(
    conn: &mut PgConnection,
    earning: &Earning,
    on_conflict: &str,
) -> StoreResult<Option<DbEarning>> {
    let row = sqlx::query_as::<_, DbEarning>(&format!(
        r#"
        INSERT INTO earnings (
            id, booking_id, host_id, amount, platform_fee, host_payout, status, payment_method,
            available_date, payout_id, paid_out_at, split_from, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        {on_conflict}
        RETURNING {EARNING_COLUMNS}
        "#
    ))
    .bind(earning.id.0)
    .bind(earning.booking_id.0)
    .bind(earning.host_id.0)
    .bind(money_to_column(earning.amount)?)
    .bind(money_to_column(earning.platform_fee)?)
    .bind(money_to_column(earning.host_payout)?)
    .bind(earning.status.as_str())
    .bind(earning.payment_method.as_str())
    .bind(earning.available_date)
    .bind(earning.payout_id.map(|id| id.0))
    .bind(earning.paid_out_at)
    .bind(earning.split_from.map(|id| id.0))
    .bind(earning.created_at)
    .bind(earning.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("earning for booking {} already exists", earning.booking_id)))?;

    Ok(row)
}

#[async_trait]
impl EarningStore for PgEarningStore {
    async fn insert_if_absent(&self, earning: &Earning) -> StoreResult<(Earning, bool)> {
        if earning.is_fragment() {
            return Err(StoreError::Constraint(
                "fragments are only created by withdrawals".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let inserted = insert_row(
            &mut conn,
            earning,
            "ON CONFLICT (booking_id) WHERE split_from IS NULL DO NOTHING",
        )
        .await?;

        if let Some(row) = inserted {
            return Ok((Earning::try_from(row)?, true));
        }

        let existing = sqlx::query_as::<_, DbEarning>(&format!(
            "SELECT {EARNING_COLUMNS} FROM earnings WHERE booking_id = $1 AND split_from IS NULL"
        ))
        .bind(earning.booking_id.0)
        .fetch_one(&mut *conn)
        .await?;

        debug!(booking_id = %earning.booking_id, "earning already recorded");
        Ok((Earning::try_from(existing)?, false))
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>> {
        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            "SELECT {EARNING_COLUMNS} FROM earnings WHERE booking_id = $1 ORDER BY created_at, id"
        ))
        .bind(booking_id.0)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn list_by_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>> {
        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            "SELECT {EARNING_COLUMNS} FROM earnings WHERE host_id = $1 ORDER BY created_at, id"
        ))
        .bind(host_id.0)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn list_available_for_host(&self, host_id: UserId) -> StoreResult<Vec<Earning>> {
        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            r#"
            SELECT {EARNING_COLUMNS} FROM earnings
            WHERE host_id = $1 AND status = 'available'
            ORDER BY available_date, created_at, id
            "#
        ))
        .bind(host_id.0)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn promote(&self, id: EarningId, now: DateTime<Utc>) -> StoreResult<Option<Earning>> {
        let row = sqlx::query_as::<_, DbEarning>(&format!(
            r#"
            UPDATE earnings SET status = 'available', available_date = $2, updated_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {EARNING_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(Earning::try_from(row)?));
        }

        let exists: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM earnings WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(None),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Earning>> {
        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            r#"
            UPDATE earnings SET status = 'available', updated_at = $1
            WHERE status = 'pending' AND available_date <= $1
            RETURNING {EARNING_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn apply_withdrawal(&self, plan: &WithdrawalPlan) -> StoreResult<Vec<Earning>> {
        let mut tx = self.pool.begin().await?;
        let mut paid = Vec::with_capacity(plan.full.len() + 1);

        for payout in &plan.full {
            let row = sqlx::query_as::<_, DbEarning>(&format!(
                r#"
                UPDATE earnings
                SET status = 'paid_out', payout_id = $2, paid_out_at = $3, updated_at = $3
                WHERE id = $1 AND host_id = $4 AND status = 'available' AND host_payout = $5
                RETURNING {EARNING_COLUMNS}
                "#
            ))
            .bind(payout.earning_id.0)
            .bind(plan.withdrawal_id.0)
            .bind(plan.paid_out_at)
            .bind(plan.host_id.0)
            .bind(money_to_column(payout.expected_host_payout)?)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                StoreError::Conflict(format!("earning {} changed since it was read", payout.earning_id))
            })?;
            paid.push(Earning::try_from(row)?);
        }

        if let Some(split) = &plan.split {
            let fragment = &split.fragment;
            let reduced: Option<(uuid::Uuid,)> = sqlx::query_as(
                r#"
                UPDATE earnings
                SET amount = amount - $2, platform_fee = platform_fee - $3,
                    host_payout = host_payout - $4, updated_at = $5
                WHERE id = $1 AND host_id = $6 AND status = 'available' AND host_payout = $7
                  AND host_payout > $4 AND amount >= $2 AND platform_fee >= $3
                RETURNING id
                "#,
            )
            .bind(split.original_id.0)
            .bind(money_to_column(fragment.amount)?)
            .bind(money_to_column(fragment.platform_fee)?)
            .bind(money_to_column(fragment.host_payout)?)
            .bind(plan.paid_out_at)
            .bind(plan.host_id.0)
            .bind(money_to_column(split.expected_host_payout)?)
            .fetch_optional(&mut *tx)
            .await?;

            if reduced.is_none() {
                return Err(StoreError::Conflict(format!(
                    "earning {} changed since it was read",
                    split.original_id
                )));
            }

            let row = insert_row(&mut tx, fragment, "")
                .await?
                .ok_or_else(|| StoreError::Conflict(format!("fragment {} not inserted", fragment.id)))?;
            paid.push(Earning::try_from(row)?);
        }

        tx.commit().await?;
        Ok(paid)
    }

    async fn void_for_booking(&self, booking_id: BookingId) -> StoreResult<Vec<Earning>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            "SELECT {EARNING_COLUMNS} FROM earnings WHERE booking_id = $1 ORDER BY created_at, id FOR UPDATE"
        ))
        .bind(booking_id.0)
        .fetch_all(&mut *tx)
        .await?;
        let earnings: Vec<Earning> = decode_all(rows)?;

        if earnings.iter().any(|e| e.status == EarningStatus::PaidOut) {
            return Err(StoreError::Conflict(format!(
                "earnings of booking {booking_id} have already been paid out"
            )));
        }

        sqlx::query("DELETE FROM earnings WHERE booking_id = $1")
            .bind(booking_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(earnings)
    }

    async fn restore(&self, earnings: &[Earning]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for earning in earnings {
            insert_row(&mut tx, earning, "ON CONFLICT (id) DO NOTHING").await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_by_payout(
        &self,
        host_id: UserId,
        payout_id: WithdrawalId,
    ) -> StoreResult<Vec<Earning>> {
        let rows = sqlx::query_as::<_, DbEarning>(&format!(
            r#"
            SELECT {EARNING_COLUMNS} FROM earnings
            WHERE host_id = $1 AND payout_id = $2
            ORDER BY created_at, id
            "#
        ))
        .bind(host_id.0)
        .bind(payout_id.0)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }
}
