//! Read-only projections handed out to presentation callers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    common::*,
    period::{BudgetPeriod, BudgetTier, PeriodStatus},
    transaction::Transaction,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Point-in-time totals for a single period.
pub struct PeriodSummary {
    pub id: PeriodId,
    pub label: String,
    pub limit: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub is_over_budget: bool,
    pub overspent_amount: Decimal,
    pub underspent_amount: Decimal,
    pub transaction_count: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl PeriodSummary {
    pub fn from_period(period: &BudgetPeriod) -> Self {
        let spent = period.spent();
        Self {
            id: period.id,
            label: period.label.clone(),
            limit: period.limit,
            spent,
            remaining: period.limit - spent,
            is_over_budget: spent > period.limit,
            overspent_amount: (spent - period.limit).max(Decimal::ZERO),
            underspent_amount: (period.limit - spent).max(Decimal::ZERO),
            transaction_count: period.transactions.len(),
            started_at: period.started_at,
            ended_at: period.ended_at,
        }
    }

    pub fn status(&self) -> PeriodStatus {
        if self.ended_at.is_some() {
            PeriodStatus::Closed
        } else {
            PeriodStatus::Active
        }
    }

    pub fn verdict(&self) -> &'static str {
        if self.is_over_budget {
            "Over Budget"
        } else {
            "Under Budget"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Projection of the active period, including progress hints.
pub struct PeriodView {
    pub summary: PeriodSummary,
    pub tier: BudgetTier,
    pub remaining_fraction: Option<Decimal>,
    pub percent_used: Option<Decimal>,
    pub near_limit: bool,
    pub transactions: Vec<Transaction>,
}

impl PeriodView {
    pub fn from_period(period: &BudgetPeriod, near_limit_threshold: Option<u8>) -> Self {
        Self {
            summary: period.summary(),
            tier: period.tier(),
            remaining_fraction: period.remaining_fraction(),
            percent_used: period.percent_used(),
            near_limit: near_limit_threshold
                .map(|threshold| period.is_near_limit(threshold))
                .unwrap_or(false),
            transactions: period.transactions.clone(),
        }
    }

    pub fn id(&self) -> PeriodId {
        self.summary.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Full transaction listing for one period, active or closed.
pub struct PeriodDetail {
    pub summary: PeriodSummary,
    pub status: PeriodStatus,
    pub transactions: Vec<Transaction>,
}

impl PeriodDetail {
    pub fn from_period(period: &BudgetPeriod) -> Self {
        Self {
            summary: period.summary(),
            status: period.status(),
            transactions: period.transactions.clone(),
        }
    }

    /// Transactions ordered by timestamp; ties keep insertion order.
    pub fn chronological(&self) -> Vec<Transaction> {
        let mut ordered = self.transactions.clone();
        ordered.sort_by_key(|txn| txn.timestamp);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_period_summary_matches_limit() {
        let started = Utc.with_ymd_and_hms(2025, 1, 27, 19, 0, 0).unwrap();
        let period = BudgetPeriod::new(dec!(100), "The Golden Tap", started);
        let summary = period.summary();

        assert_eq!(summary.spent, Decimal::ZERO);
        assert_eq!(summary.remaining, dec!(100));
        assert!(!summary.is_over_budget);
        assert_eq!(summary.underspent_amount, dec!(100));
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.status(), PeriodStatus::Active);
        assert_eq!(summary.verdict(), "Under Budget");
    }

    #[test]
    fn view_flags_near_limit_only_with_threshold() {
        let started = Utc.with_ymd_and_hms(2025, 1, 20, 19, 0, 0).unwrap();
        let mut period = BudgetPeriod::new(dec!(100), "Midnight Lounge", started);
        period.add_transaction(Transaction::new(dec!(90), "tab", "Midnight Lounge", started));

        assert!(PeriodView::from_period(&period, Some(80)).near_limit);
        assert!(!PeriodView::from_period(&period, None).near_limit);
        let view = PeriodView::from_period(&period, Some(95));
        assert!(!view.near_limit);
        assert_eq!(view.percent_used, Some(dec!(90)));
        assert_eq!(view.remaining_fraction, Some(dec!(0.1)));
    }
}
