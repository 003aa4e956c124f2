//! Budget periods and the figures derived from their transactions.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{common::*, summary::PeriodSummary, transaction::Transaction};

/// A spending window with a limit and the transactions recorded against it.
///
/// Spent/remaining figures are never stored; every accessor recomputes them
/// from `transactions` so they cannot drift from the underlying set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    pub id: PeriodId,
    pub limit: Decimal,
    pub label: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl BudgetPeriod {
    pub fn new(limit: Decimal, label: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: PeriodId::new(),
            limit,
            label: label.into(),
            started_at,
            ended_at: None,
            transactions: Vec::new(),
        }
    }

    pub fn status(&self) -> PeriodStatus {
        if self.ended_at.is_some() {
            PeriodStatus::Closed
        } else {
            PeriodStatus::Active
        }
    }

    /// Stamps the end time. Closing twice keeps the first stamp.
    pub fn close(&mut self, ended_at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(ended_at);
        }
    }

    pub fn spent(&self) -> Decimal {
        sum_amounts(&self.transactions)
    }

    /// Spent after adding `extra`, or `None` if the total would overflow.
    pub fn spent_with(&self, extra: Decimal) -> Option<Decimal> {
        checked_sum_amounts(&self.transactions)?.checked_add(extra)
    }

    /// Limit minus spent; negative once the period is over budget.
    pub fn remaining(&self) -> Decimal {
        self.limit - self.spent()
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent() > self.limit
    }

    pub fn overspent_amount(&self) -> Decimal {
        (self.spent() - self.limit).max(Decimal::ZERO)
    }

    pub fn underspent_amount(&self) -> Decimal {
        (self.limit - self.spent()).max(Decimal::ZERO)
    }

    /// Share of the limit still available, clamped at zero. `None` for a zero limit.
    pub fn remaining_fraction(&self) -> Option<Decimal> {
        if self.limit.is_zero() {
            return None;
        }
        // Division can only overflow for a deeply negative remainder.
        let fraction = self
            .remaining()
            .checked_div(self.limit)
            .unwrap_or(Decimal::ZERO);
        Some(fraction.max(Decimal::ZERO))
    }

    /// Spent as a percentage of the limit, saturating at `Decimal::MAX`.
    pub fn percent_used(&self) -> Option<Decimal> {
        if self.limit.is_zero() {
            return None;
        }
        let percent = self
            .spent()
            .checked_div(self.limit)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX);
        Some(percent)
    }

    /// True while still within the limit but at or past `threshold_percent` of it.
    pub fn is_near_limit(&self, threshold_percent: u8) -> bool {
        if self.is_over_budget() {
            return false;
        }
        match self.percent_used() {
            Some(used) => used >= Decimal::from(threshold_percent),
            None => false,
        }
    }

    pub fn tier(&self) -> BudgetTier {
        BudgetTier::for_limit(self.limit)
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|txn| txn.id == id)
    }

    pub fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|txn| txn.id == id)
    }

    pub fn add_transaction(&mut self, transaction: Transaction) -> TransactionId {
        let id = transaction.id;
        self.transactions.push(transaction);
        id
    }

    pub fn remove_transaction(&mut self, id: TransactionId) -> Option<Transaction> {
        let index = self.transactions.iter().position(|txn| txn.id == id)?;
        Some(self.transactions.remove(index))
    }

    /// Transactions ordered by timestamp; ties keep insertion order.
    pub fn chronological(&self) -> Vec<Transaction> {
        let mut ordered = self.transactions.clone();
        ordered.sort_by_key(|txn| txn.timestamp);
        ordered
    }

    pub fn summary(&self) -> PeriodSummary {
        PeriodSummary::from_period(self)
    }
}

impl Identifiable for BudgetPeriod {
    type Id = PeriodId;

    fn id(&self) -> PeriodId {
        self.id
    }
}

impl Displayable for BudgetPeriod {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.label, self.status())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Lifecycle of a budget period. `Closed` is terminal.
pub enum PeriodStatus {
    Active,
    Closed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeriodStatus::Active => "Active",
            PeriodStatus::Closed => "Closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Rough size of a night out, keyed off the chosen limit.
pub enum BudgetTier {
    LowKey,
    Moderate,
    AllOut,
}

impl BudgetTier {
    pub fn for_limit(limit: Decimal) -> Self {
        if limit < Decimal::from(50) {
            BudgetTier::LowKey
        } else if limit < Decimal::ONE_HUNDRED {
            BudgetTier::Moderate
        } else {
            BudgetTier::AllOut
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetTier::LowKey => "Low-key night",
            BudgetTier::Moderate => "Let's not get too crazy",
            BudgetTier::AllOut => "Homelessness here we come",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 20, 0, 0).unwrap()
    }

    fn period_with(limit: Decimal, amounts: &[Decimal]) -> BudgetPeriod {
        let mut period = BudgetPeriod::new(limit, "Neon Lights Bar", evening());
        for (idx, amount) in amounts.iter().enumerate() {
            period.add_transaction(Transaction::new(
                *amount,
                format!("round {idx}"),
                "Neon Lights Bar",
                evening() + Duration::minutes(idx as i64 * 10),
            ));
        }
        period
    }

    #[test]
    fn derived_figures_track_overspend() {
        let period = period_with(dec!(100), &[dec!(60), dec!(50)]);
        assert_eq!(period.spent(), dec!(110));
        assert_eq!(period.remaining(), dec!(-10));
        assert!(period.is_over_budget());
        assert_eq!(period.overspent_amount(), dec!(10));
        assert_eq!(period.underspent_amount(), Decimal::ZERO);
        assert_eq!(period.remaining_fraction(), Some(Decimal::ZERO));
    }

    #[test]
    fn decimal_sums_have_no_float_drift() {
        let period = period_with(dec!(1), &[dec!(0.1), dec!(0.2)]);
        assert_eq!(period.spent(), dec!(0.3));
        assert_eq!(period.remaining(), dec!(0.7));
    }

    #[test]
    fn zero_limit_has_no_fraction() {
        let period = period_with(Decimal::ZERO, &[]);
        assert_eq!(period.remaining_fraction(), None);
        assert_eq!(period.percent_used(), None);
        assert!(!period.is_over_budget());
        assert!(!period.is_near_limit(80));
    }

    #[test]
    fn tiny_limit_with_huge_spend_saturates() {
        let period = period_with(dec!(0.0001), &[dec!(10000000000000000000000000)]);
        assert_eq!(period.percent_used(), Some(Decimal::MAX));
        assert_eq!(period.remaining_fraction(), Some(Decimal::ZERO));
        assert!(period.is_over_budget());
        assert!(!period.is_near_limit(80));
    }

    #[test]
    fn spent_with_reports_overflow() {
        let period = period_with(dec!(50), &[Decimal::MAX]);
        assert_eq!(period.spent_with(Decimal::ONE), None);
        assert_eq!(period.spent(), Decimal::MAX);
        assert_eq!(period_with(dec!(50), &[dec!(10)]).spent_with(dec!(2.5)), Some(dec!(12.5)));
    }

    #[test]
    fn near_limit_respects_threshold() {
        let period = period_with(dec!(50), &[dec!(40)]);
        assert!(period.is_near_limit(80));
        assert!(!period.is_near_limit(90));

        let over = period_with(dec!(50), &[dec!(60)]);
        assert!(!over.is_near_limit(80));
    }

    #[test]
    fn tiers_follow_limit_bands() {
        assert_eq!(BudgetTier::for_limit(dec!(30)), BudgetTier::LowKey);
        assert_eq!(BudgetTier::for_limit(dec!(50)), BudgetTier::Moderate);
        assert_eq!(BudgetTier::for_limit(dec!(99.99)), BudgetTier::Moderate);
        assert_eq!(BudgetTier::for_limit(dec!(100)), BudgetTier::AllOut);
    }

    #[test]
    fn chronological_reorders_without_mutating() {
        let mut period = period_with(dec!(100), &[]);
        let late = Transaction::new(dec!(5), "late", "", evening() + Duration::hours(2));
        let early = Transaction::new(dec!(7), "early", "", evening());
        period.add_transaction(late.clone());
        period.add_transaction(early.clone());

        let ordered = period.chronological();
        assert_eq!(ordered[0].id, early.id);
        assert_eq!(ordered[1].id, late.id);
        assert_eq!(period.transactions[0].id, late.id);
    }

    #[test]
    fn close_keeps_first_end_stamp() {
        let mut period = period_with(dec!(20), &[]);
        assert_eq!(period.status(), PeriodStatus::Active);
        period.close(evening() + Duration::hours(3));
        period.close(evening() + Duration::hours(5));
        assert_eq!(period.status(), PeriodStatus::Closed);
        assert_eq!(period.ended_at, Some(evening() + Duration::hours(3)));
    }
}
