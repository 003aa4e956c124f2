//! Domain model for a single recorded expenditure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        amount: Decimal,
        description: impl Into<String>,
        venue: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            amount,
            timestamp,
            description: description.into(),
            venue: venue.into(),
            edited_at: None,
        }
    }

    /// Applies `patch`, keeping the identifier and original timestamp.
    pub fn apply(&mut self, patch: &TransactionPatch, edited_at: DateTime<Utc>) {
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(description) = patch.description.as_ref() {
            self.description = description.clone();
        }
        self.edited_at = Some(edited_at);
    }
}

impl Identifiable for Transaction {
    type Id = TransactionId;

    fn id(&self) -> TransactionId {
        self.id
    }
}

impl Amounted for Transaction {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

impl Displayable for Transaction {
    fn display_label(&self) -> String {
        if self.venue.is_empty() {
            format!("{} ({})", self.description, self.amount)
        } else {
            format!("{} @ {} ({})", self.description, self.venue, self.amount)
        }
    }
}

/// Replacement values for an edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

impl TransactionPatch {
    pub fn amount(amount: Decimal) -> Self {
        Self {
            amount: Some(amount),
            description: None,
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            amount: None,
            description: Some(description.into()),
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.description.is_none()
    }
}
