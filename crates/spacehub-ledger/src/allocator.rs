//! Payout allocation.
//!
//! A withdrawal consumes a host's available earnings oldest first. Records
//! that fit are paid out whole; the first one that does not fit is split so
//! the withdrawal pays out exactly the requested amount.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spacehub_db::{EarningStore, PlannedPayout, PlannedSplit, WithdrawalPlan};
use spacehub_types::{
    CoreError, Earning, EarningId, EarningStatus, Money, Result, UserId, WithdrawalId,
};
use tracing::{info, warn};

use crate::ledger::EarningsLedger;

/// Result of a processed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub withdrawal_id: WithdrawalId,
    pub host_id: UserId,
    pub amount: Money,
    pub remaining_balance: Money,
    pub paid_out_at: DateTime<Utc>,
    /// Records (whole or fragment) now carrying `withdrawal_id`.
    pub earnings: Vec<Earning>,
}

/// A past withdrawal, reassembled from the records carrying its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: WithdrawalId,
    pub host_id: UserId,
    pub amount: Money,
    pub paid_out_at: DateTime<Utc>,
    pub earnings: Vec<Earning>,
}

impl Withdrawal {
    fn from_records(host_id: UserId, withdrawal_id: WithdrawalId, earnings: Vec<Earning>) -> Self {
        let paid_out_at = earnings
            .iter()
            .filter_map(|e| e.paid_out_at)
            .max()
            .unwrap_or_default();
        Self {
            withdrawal_id,
            host_id,
            amount: earnings.iter().map(|e| e.host_payout).sum(),
            paid_out_at,
            earnings,
        }
    }
}

/// Decide which records a withdrawal of `amount` consumes.
///
/// `available` is the host's available records; they are walked in
/// `available_date` order regardless of the order given.
pub fn plan_withdrawal(
    host_id: UserId,
    available: &[Earning],
    amount: Money,
    withdrawal_id: WithdrawalId,
    now: DateTime<Utc>,
) -> Result<WithdrawalPlan> {
    if amount.is_zero() {
        return Err(CoreError::validation("amount", "must be greater than zero"));
    }

    let mut queue: Vec<&Earning> = available
        .iter()
        .filter(|e| e.host_id == host_id && e.status == EarningStatus::Available)
        .filter(|e| !e.host_payout.is_zero())
        .collect();
    queue.sort_by_key(|e| (e.available_date, e.created_at, e.id.0));

    let balance: Money = queue.iter().map(|e| e.host_payout).sum();
    if amount > balance {
        return Err(CoreError::InsufficientFunds {
            requested: amount,
            available: balance,
        });
    }

    let mut remaining = amount;
    let mut full = Vec::new();
    let mut split = None;

    for earning in queue {
        if remaining.is_zero() {
            break;
        }
        if earning.host_payout <= remaining {
            full.push(PlannedPayout {
                earning_id: earning.id,
                expected_host_payout: earning.host_payout,
            });
            remaining = remaining.saturating_sub(earning.host_payout);
        } else {
            split = Some(PlannedSplit {
                original_id: earning.id,
                expected_host_payout: earning.host_payout,
                fragment: carve_fragment(earning, remaining, withdrawal_id, now)?,
            });
            remaining = Money::ZERO;
        }
    }

    Ok(WithdrawalPlan {
        withdrawal_id,
        host_id,
        paid_out_at: now,
        full,
        split,
    })
}

/// Paid-out fragment of `original` worth `host_payout`.
///
/// The fragment's gross amount is scaled by `host_payout / original.host_payout`
/// and its fee is the difference, so both halves stay conserved.
fn carve_fragment(
    original: &Earning,
    host_payout: Money,
    withdrawal_id: WithdrawalId,
    now: DateTime<Utc>,
) -> Result<Earning> {
    let invalid = || CoreError::infrastructure(format!("earning {} cannot be split", original.id));
    let amount = original
        .amount
        .scale(host_payout, original.host_payout)
        .ok_or_else(invalid)?;
    let platform_fee = amount.checked_sub(host_payout).ok_or_else(invalid)?;

    Ok(Earning {
        id: EarningId::new(),
        booking_id: original.booking_id,
        host_id: original.host_id,
        amount,
        platform_fee,
        host_payout,
        status: EarningStatus::PaidOut,
        payment_method: original.payment_method,
        available_date: original.available_date,
        payout_id: Some(withdrawal_id),
        paid_out_at: Some(now),
        split_from: Some(original.id),
        created_at: original.created_at,
        updated_at: now,
    })
}

/// Applies withdrawals against the ledger's store.
///
/// The plan is built from a snapshot and applied with conditional writes; a
/// conflicting writer causes a fresh snapshot and plan, up to
/// `withdrawal_max_retries` attempts.
#[derive(Clone)]
pub struct PayoutAllocator {
    ledger: EarningsLedger,
}

impl PayoutAllocator {
    pub fn new(ledger: EarningsLedger) -> Self {
        Self { ledger }
    }

    pub async fn process_withdrawal(
        &self,
        host_id: UserId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt> {
        let store = self.ledger.store();
        let max_attempts = self.ledger.policy().withdrawal_max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let available = store.list_available_for_host(host_id).await?;
            let balance: Money = available.iter().map(|e| e.host_payout).sum();
            let plan = plan_withdrawal(host_id, &available, amount, WithdrawalId::new(), now)?;

            match store.apply_withdrawal(&plan).await {
                Ok(earnings) => {
                    // Earnings recorded while the plan was built count too.
                    let remaining_balance = match self.ledger.available_balance(host_id).await {
                        Ok(remaining) => remaining,
                        Err(e) => {
                            warn!(
                                withdrawal_id = %plan.withdrawal_id,
                                error = %e,
                                "Could not re-read balance, reporting the planned figure"
                            );
                            balance.saturating_sub(amount)
                        }
                    };
                    let receipt = WithdrawalReceipt {
                        withdrawal_id: plan.withdrawal_id,
                        host_id,
                        amount,
                        remaining_balance,
                        paid_out_at: now,
                        earnings,
                    };
                    info!(
                        withdrawal_id = %receipt.withdrawal_id,
                        host_id = %host_id,
                        amount = %amount,
                        remaining_balance = %receipt.remaining_balance,
                        records = receipt.earnings.len(),
                        split = plan.split.is_some(),
                        "Withdrawal processed"
                    );
                    return Ok(receipt);
                }
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    warn!(
                        host_id = %host_id,
                        attempt,
                        error = %e,
                        "Withdrawal raced a concurrent ledger write, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_withdrawal(
        &self,
        host_id: UserId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal> {
        let earnings = self.ledger.store().list_by_payout(host_id, withdrawal_id).await?;
        if earnings.is_empty() {
            return Err(CoreError::not_found("Withdrawal", withdrawal_id));
        }
        Ok(Withdrawal::from_records(host_id, withdrawal_id, earnings))
    }

    /// Newest first.
    pub async fn list_withdrawals(&self, host_id: UserId) -> Result<Vec<Withdrawal>> {
        let earnings = self.ledger.store().list_by_host(host_id).await?;

        let mut grouped: HashMap<WithdrawalId, Vec<Earning>> = HashMap::new();
        for earning in earnings {
            if let Some(payout_id) = earning.payout_id {
                grouped.entry(payout_id).or_default().push(earning);
            }
        }

        let mut withdrawals: Vec<Withdrawal> = grouped
            .into_iter()
            .map(|(id, records)| Withdrawal::from_records(host_id, id, records))
            .collect();
        withdrawals.sort_by(|a, b| b.paid_out_at.cmp(&a.paid_out_at));
        Ok(withdrawals)
    }
}
