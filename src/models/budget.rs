//! Budget model
//!
//! A budget owns accounts, categories and transactions. It keeps the net of
//! all non-transfer transactions and per-month income/expense totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ids::BudgetId;
use super::money::Money;
use super::month::MonthKey;

/// Income and expense totals for one month, both non-negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthTotals {
    pub income: Money,
    pub expense: Money,
}

impl MonthTotals {
    pub fn net(&self) -> Money {
        self.income - self.expense
    }
}

/// A budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,

    pub name: String,

    /// Net of all non-transfer transactions
    #[serde(default)]
    pub balance: Money,

    /// Per-month totals
    #[serde(default)]
    pub allocations: BTreeMap<MonthKey, MonthTotals>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: BudgetId::new(),
            name: name.into(),
            balance: Money::zero(),
            allocations: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Totals for a month, zero when nothing has been posted
    pub fn month(&self, month: MonthKey) -> MonthTotals {
        self.allocations.get(&month).copied().unwrap_or_default()
    }

    /// Apply income/expense deltas for a month
    pub fn record(&mut self, month: MonthKey, income: Money, expense: Money) {
        let totals = self.allocations.entry(month).or_default();
        totals.income += income;
        totals.expense += expense;
        self.balance += income - expense;
        self.updated_at = Utc::now();
    }

    /// Total income across months up to and including `month`
    pub fn income_through(&self, month: MonthKey) -> Money {
        self.allocations
            .range(..=month)
            .map(|(_, t)| t.income)
            .sum()
    }

    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if self.name.trim().is_empty() {
            return Err(BudgetValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(BudgetValidationError::NameTooLong(self.name.len()));
        }

        Ok(())
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Validation errors for budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Budget name cannot be empty"),
            Self::NameTooLong(len) => write!(f, "Budget name too long ({} chars, max 100)", len),
        }
    }
}

impl std::error::Error for BudgetValidationError {}
