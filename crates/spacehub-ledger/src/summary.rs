//! Host earnings summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spacehub_types::{Earning, EarningStatus, Money, UserId};

/// Host payout recognised in one calendar month (`YYYY-MM` of record creation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEarnings {
    pub month: String,
    pub host_payout: Money,
}

/// Host payout totals by status. `total` covers every status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub host_id: UserId,
    pub total: Money,
    pub available: Money,
    pub pending: Money,
    pub paid_out: Money,
    /// Ascending by month.
    pub monthly_breakdown: Vec<MonthlyEarnings>,
}

impl EarningsSummary {
    pub fn from_earnings(host_id: UserId, earnings: &[Earning]) -> Self {
        let mut summary = Self {
            host_id,
            total: Money::ZERO,
            available: Money::ZERO,
            pending: Money::ZERO,
            paid_out: Money::ZERO,
            monthly_breakdown: Vec::new(),
        };
        let mut months: BTreeMap<String, Money> = BTreeMap::new();

        for e in earnings.iter().filter(|e| e.host_id == host_id) {
            let bucket = match e.status {
                EarningStatus::Pending => &mut summary.pending,
                EarningStatus::Available => &mut summary.available,
                EarningStatus::PaidOut => &mut summary.paid_out,
            };
            *bucket = bucket.saturating_add(e.host_payout);
            summary.total = summary.total.saturating_add(e.host_payout);

            let month = months
                .entry(e.created_at.format("%Y-%m").to_string())
                .or_insert(Money::ZERO);
            *month = month.saturating_add(e.host_payout);
        }

        summary.monthly_breakdown = months
            .into_iter()
            .map(|(month, host_payout)| MonthlyEarnings { month, host_payout })
            .collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use spacehub_types::{BookingId, EarningId, PaymentMethod};

    fn earning(host: UserId, payout: u64, status: EarningStatus, month: u32) -> Earning {
        let created = Utc.with_ymd_and_hms(2024, month, 15, 12, 0, 0).unwrap();
        Earning {
            id: EarningId::new(),
            booking_id: BookingId::new(),
            host_id: host,
            amount: Money::from_minor(payout),
            platform_fee: Money::ZERO,
            host_payout: Money::from_minor(payout),
            status,
            payment_method: PaymentMethod::Card,
            available_date: created,
            payout_id: None,
            paid_out_at: None,
            split_from: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_totals_and_months() {
        let host = UserId::new();
        let earnings = vec![
            earning(host, 300, EarningStatus::PaidOut, 3),
            earning(host, 500, EarningStatus::Available, 1),
            earning(host, 200, EarningStatus::Pending, 3),
            earning(UserId::new(), 9_999, EarningStatus::Available, 1),
        ];

        let summary = EarningsSummary::from_earnings(host, &earnings);
        assert_eq!(summary.total, Money::from_minor(1_000));
        assert_eq!(summary.available, Money::from_minor(500));
        assert_eq!(summary.pending, Money::from_minor(200));
        assert_eq!(summary.paid_out, Money::from_minor(300));
        assert_eq!(
            summary.monthly_breakdown,
            vec![
                MonthlyEarnings { month: "2024-01".into(), host_payout: Money::from_minor(500) },
                MonthlyEarnings { month: "2024-03".into(), host_payout: Money::from_minor(500) },
            ]
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = EarningsSummary::from_earnings(UserId::new(), &[]);
        assert_eq!(summary.total, Money::ZERO);
        assert!(summary.monthly_breakdown.is_empty());
    }
}
