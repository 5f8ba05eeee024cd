//! Transaction model
//!
//! A transaction moves money in or out of one account. Its amount is the net
//! of its category splits; transfers carry no splits and point at their
//! counterpart in another account instead.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::ids::{AccountId, BudgetId, CategoryId, TransactionId};
use super::money::Money;
use super::month::MonthKey;

/// Whether a transaction brings money in or takes it out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "income"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

/// The portion of a transaction assigned to one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySplit {
    pub category_id: CategoryId,

    /// Money coming in (non-negative)
    #[serde(rename = "in", default)]
    pub inflow: Money,

    /// Money going out (non-negative)
    #[serde(rename = "out", default)]
    pub outflow: Money,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
}

impl CategorySplit {
    /// Build a split from a signed amount
    pub fn new(category_id: CategoryId, amount: Money) -> Self {
        let (inflow, outflow) = amount.split_flow();
        Self {
            category_id,
            inflow,
            outflow,
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// inflow - outflow
    pub fn net(&self) -> Money {
        self.inflow - self.outflow
    }
}

/// A financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// The budget this transaction belongs to
    pub budget_id: BudgetId,

    /// The account this transaction belongs to
    pub account_id: AccountId,

    pub date: NaiveDate,

    /// Net amount (positive for inflow, negative for outflow)
    pub amount: Money,

    #[serde(default)]
    pub payee: String,

    #[serde(default)]
    pub memo: String,

    /// Category splits (empty for transfers)
    #[serde(default)]
    pub splits: Vec<CategorySplit>,

    #[serde(default)]
    pub cleared: bool,

    /// If this is a transfer, the linked transaction in the other account
    pub transfer_transaction_id: Option<TransactionId>,

    /// Import ID for duplicate detection during CSV import
    pub import_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a categorized transaction; the amount is derived from the splits
    pub fn new(
        budget_id: BudgetId,
        account_id: AccountId,
        date: NaiveDate,
        splits: Vec<CategorySplit>,
    ) -> Self {
        let now = Utc::now();
        let mut txn = Self {
            id: TransactionId::new(),
            budget_id,
            account_id,
            date,
            amount: Money::zero(),
            payee: String::new(),
            memo: String::new(),
            splits,
            cleared: false,
            transfer_transaction_id: None,
            import_id: None,
            created_at: now,
            updated_at: now,
        };
        txn.amount = txn.computed_amount();
        txn
    }

    /// Create one leg of a transfer
    pub fn transfer_leg(
        budget_id: BudgetId,
        account_id: AccountId,
        date: NaiveDate,
        amount: Money,
        counterpart: TransactionId,
    ) -> Self {
        let mut txn = Self::new(budget_id, account_id, date, Vec::new());
        txn.amount = amount;
        txn.transfer_transaction_id = Some(counterpart);
        txn
    }

    /// Sum of inflow - outflow over all splits
    pub fn computed_amount(&self) -> Money {
        self.splits.iter().map(CategorySplit::net).sum()
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer_transaction_id.is_some()
    }

    /// Income for non-negative amounts, expense otherwise
    pub fn kind(&self) -> TransactionKind {
        if self.amount.is_negative() {
            TransactionKind::Expense
        } else {
            TransactionKind::Income
        }
    }

    /// The allocation month this transaction posts into
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }

    /// Replace the splits and recompute the amount
    pub fn set_splits(&mut self, splits: Vec<CategorySplit>) {
        self.splits = splits;
        self.amount = self.computed_amount();
        self.updated_at = Utc::now();
    }

    pub fn set_cleared(&mut self, cleared: bool) {
        self.cleared = cleared;
        self.updated_at = Utc::now();
    }

    pub fn touches_category(&self, id: CategoryId) -> bool {
        self.splits.iter().any(|s| s.category_id == id)
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        let too_large = |m: Money| !m.within_limit();
        if too_large(self.amount)
            || self
                .splits
                .iter()
                .any(|s| too_large(s.inflow) || too_large(s.outflow))
        {
            return Err(TransactionValidationError::AmountTooLarge);
        }

        if self.is_transfer() {
            if !self.splits.is_empty() {
                return Err(TransactionValidationError::TransferWithSplits);
            }
            if self.transfer_transaction_id == Some(self.id) {
                return Err(TransactionValidationError::SelfTransfer);
            }
            return Ok(());
        }

        if self.splits.is_empty() {
            return Err(TransactionValidationError::NoSplits);
        }

        let mut seen = HashSet::new();
        for split in &self.splits {
            if split.inflow.is_negative() || split.outflow.is_negative() {
                return Err(TransactionValidationError::NegativeFlow);
            }
            if !seen.insert(split.category_id) {
                return Err(TransactionValidationError::DuplicateCategory(
                    split.category_id,
                ));
            }
        }

        let computed = self.computed_amount();
        if computed != self.amount {
            return Err(TransactionValidationError::AmountMismatch {
                amount: self.amount,
                splits_total: computed,
            });
        }

        Ok(())
    }

}

/// Stable key used to recognize rows that were already imported
///
/// `occurrence` counts earlier rows of the same file with the same date,
/// amount and payee, so repeated purchases keep distinct keys.
pub fn import_key(date: NaiveDate, amount: Money, payee: &str, occurrence: u32) -> String {
    format!(
        "imp:{}:{}:{}:{}",
        date.format("%Y%m%d"),
        amount.cents(),
        occurrence,
        payee.trim().to_lowercase()
    )
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date.format("%Y-%m-%d"),
            self.payee,
            self.amount
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NoSplits,
    NegativeFlow,
    DuplicateCategory(CategoryId),
    AmountMismatch {
        amount: Money,
        splits_total: Money,
    },
    TransferWithSplits,
    SelfTransfer,
    AmountTooLarge,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSplits => write!(f, "Transaction needs at least one category"),
            Self::NegativeFlow => write!(f, "Split inflow and outflow must not be negative"),
            Self::DuplicateCategory(id) => {
                write!(f, "Category {} appears more than once in the transaction", id)
            }
            Self::AmountMismatch {
                amount,
                splits_total,
            } => write!(
                f,
                "Split totals ({}) do not match transaction amount ({})",
                splits_total, amount
            ),
            Self::TransferWithSplits => {
                write!(f, "Transfer transactions cannot have categories")
            }
            Self::SelfTransfer => write!(f, "A transfer cannot link to itself"),
            Self::AmountTooLarge => write!(f, "Amount exceeds the largest supported value"),
        }
    }
}

impl std::error::Error for TransactionValidationError {}
