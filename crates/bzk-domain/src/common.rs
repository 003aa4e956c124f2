//! Shared identifiers and traits for ledger entities.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exposes a stable identifier for entities stored in the ledger.
pub trait Identifiable {
    type Id;

    fn id(&self) -> Self::Id;
}

/// Supplies a common contract for retrieving monetary amounts.
pub trait Amounted {
    fn amount(&self) -> Decimal;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifies a budget period for its whole lifetime.
    PeriodId
);

uuid_id!(
    /// Identifies a recorded transaction; never reassigned by edits.
    TransactionId
);

/// Sums amounts in iteration order, saturating at the Decimal bounds.
pub fn sum_amounts<'a, T, I>(items: I) -> Decimal
where
    T: Amounted + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .fold(Decimal::ZERO, |total, item| total.saturating_add(item.amount()))
}

/// Exact sum of amounts, or `None` once the total no longer fits a Decimal.
pub fn checked_sum_amounts<'a, T, I>(items: I) -> Option<Decimal>
where
    T: Amounted + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.amount()))
}
