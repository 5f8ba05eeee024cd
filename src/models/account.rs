//! Account model
//!
//! An account holds a denormalized running balance and cleared balance that
//! the posting engine keeps equal to the sum of the account's transactions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BudgetId};
use super::money::Money;

/// A financial account within a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,

    /// The budget this account belongs to
    pub budget_id: BudgetId,

    /// Account name (e.g., "Chase Checking")
    pub name: String,

    /// Current balance (sum of all transactions)
    pub balance: Money,

    /// Balance of cleared transactions only
    #[serde(default)]
    pub cleared_balance: Money,

    /// Whether this account is archived (soft-deleted)
    #[serde(default)]
    pub archived: bool,

    /// Notes about this account
    #[serde(default)]
    pub notes: String,

    /// Date of last successful reconciliation
    pub last_reconciled_date: Option<NaiveDate>,

    /// Cleared balance at last reconciliation
    pub last_reconciled_balance: Option<Money>,

    /// Sort order for display
    #[serde(default)]
    pub sort_order: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance
    ///
    /// Opening balances are posted as a transaction so the balance invariant
    /// holds from the start.
    pub fn new(budget_id: BudgetId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            budget_id,
            name: name.into(),
            balance: Money::zero(),
            cleared_balance: Money::zero(),
            archived: false,
            notes: String::new(),
            last_reconciled_date: None,
            last_reconciled_balance: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a balance change produced by the posting engine
    pub fn apply(&mut self, balance: Money, cleared: Money) {
        self.balance += balance;
        self.cleared_balance += cleared;
        self.updated_at = Utc::now();
    }

    /// Balance of transactions not yet cleared
    pub fn uncleared_balance(&self) -> Money {
        self.balance - self.cleared_balance
    }

    pub fn archive(&mut self) {
        self.archived = true;
        self.updated_at = Utc::now();
    }

    pub fn unarchive(&mut self) {
        self.archived = false;
        self.updated_at = Utc::now();
    }

    /// Record a reconciliation
    pub fn reconcile(&mut self, date: NaiveDate, balance: Money) {
        self.last_reconciled_date = Some(date);
        self.last_reconciled_balance = Some(balance);
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(AccountValidationError::NameTooLong(self.name.len()));
        }

        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.balance)
    }
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Account name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Account name too long ({} chars, max 100)", len)
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_empty() {
        let account = Account::new(BudgetId::new(), "Checking");
        assert_eq!(account.name, "Checking");
        assert_eq!(account.balance, Money::zero());
        assert_eq!(account.cleared_balance, Money::zero());
        assert!(!account.archived);
    }

    #[test]
    fn test_apply_tracks_uncleared() {
        let mut account = Account::new(BudgetId::new(), "Checking");
        account.apply(Money::from_cents(10000), Money::from_cents(10000));
        account.apply(Money::from_cents(-2500), Money::zero());

        assert_eq!(account.balance.cents(), 7500);
        assert_eq!(account.cleared_balance.cents(), 10000);
        assert_eq!(account.uncleared_balance().cents(), -2500);
    }

    #[test]
    fn test_validation() {
        let mut account = Account::new(BudgetId::new(), "Valid Name");
        assert!(account.validate().is_ok());

        account.name = "   ".into();
        assert_eq!(account.validate(), Err(AccountValidationError::EmptyName));

        account.name = "a".repeat(101);
        assert!(matches!(
            account.validate(),
            Err(AccountValidationError::NameTooLong(101))
        ));
    }

    #[test]
    fn test_missing_cleared_balance_defaults() {
        let account = Account::new(BudgetId::new(), "Old");
        let mut value = serde_json::to_value(&account).unwrap();
        value.as_object_mut().unwrap().remove("cleared_balance");
        let loaded: Account = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.cleared_balance, Money::zero());
    }
}
