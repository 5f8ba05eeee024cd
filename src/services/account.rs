//! Account service
//!
//! Provides business logic for account management: creation with an opening
//! balance, renaming, archiving, deletion and reconciliation against a bank
//! statement.

use chrono::NaiveDate;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, AccountId, BudgetId, CategorySplit, Money, SystemCategory};
use crate::storage::{Changeset, Storage};

use super::category::CategoryService;
use super::pick_one;
use super::transaction::{NewTransaction, TransactionService};

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

/// Summary of an account with counts derived from its transactions
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: Account,
    pub transaction_count: usize,
    /// Number of uncleared transactions
    pub uncleared_count: usize,
}

/// Result of comparing an account with a statement balance
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub account: Account,
    pub statement_balance: Money,
    /// Statement balance minus cleared balance; zero when reconciled
    pub difference: Money,
}

impl ReconcileOutcome {
    pub fn is_reconciled(&self) -> bool {
        self.difference.is_zero()
    }
}

impl<'a> AccountService<'a> {
    /// Create a new account service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a new account
    ///
    /// A non-zero `starting_balance` is recorded as a cleared transaction in
    /// the Starting Balance category, committed together with the account.
    pub fn create(
        &self,
        budget_id: BudgetId,
        name: &str,
        starting_balance: Money,
        date: NaiveDate,
    ) -> EnvelopeResult<Account> {
        if !self.storage.budgets.exists(budget_id)? {
            return Err(EnvelopeError::budget_not_found(budget_id.to_string()));
        }

        let name = name.trim();
        self.ensure_unique_name(budget_id, name, None)?;

        let existing = self.storage.accounts.for_budget(budget_id)?;
        let mut account = Account::new(budget_id, name);
        account.sort_order = existing.iter().map(|a| a.sort_order).max().unwrap_or(0) + 1;
        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let mut changeset = Changeset::new();
        changeset.put(account.clone());

        if !starting_balance.is_zero() {
            let category = CategoryService::new(self.storage).ensure_system(
                budget_id,
                SystemCategory::StartingBalance,
                &mut changeset,
            )?;
            let opening = NewTransaction::new(
                budget_id,
                account.id,
                date,
                vec![CategorySplit::new(category.id, starting_balance)],
            )
            .payee(SystemCategory::StartingBalance.name())
            .cleared(true);

            TransactionService::new(self.storage).stage_new(opening, &mut changeset)?;
        }

        self.storage.commit(changeset)?;

        tracing::info!(account = %account.id, name = %account.name, "created account");
        self.get(account.id)?
            .ok_or_else(|| EnvelopeError::account_not_found(account.id.to_string()))
    }

    /// Get an account by ID
    pub fn get(&self, id: AccountId) -> EnvelopeResult<Option<Account>> {
        self.storage.accounts.get(id)
    }

    /// Find an account of a budget by name or ID string
    pub fn find(&self, budget_id: BudgetId, identifier: &str) -> EnvelopeResult<Account> {
        pick_one(
            self.storage.accounts.for_budget(budget_id)?,
            identifier,
            "Account",
            |a| a.name.as_str(),
            |a, s| a.id.matches(s),
        )
    }

    /// Accounts of a budget in display order
    pub fn list(&self, budget_id: BudgetId, include_archived: bool) -> EnvelopeResult<Vec<Account>> {
        self.storage
            .accounts
            .filter(|a| a.budget_id == budget_id && (include_archived || !a.archived))
    }

    pub fn summary(&self, account: &Account) -> EnvelopeResult<AccountSummary> {
        let txns = self.storage.transactions.filter(|t| t.account_id == account.id)?;
        Ok(AccountSummary {
            account: account.clone(),
            transaction_count: txns.len(),
            uncleared_count: txns.iter().filter(|t| !t.cleared).count(),
        })
    }

    pub fn rename(&self, id: AccountId, name: &str) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;
        let name = name.trim();
        self.ensure_unique_name(account.budget_id, name, Some(id))?;

        account.name = name.to_string();
        account.updated_at = chrono::Utc::now();
        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.save(account)
    }

    /// Archive an account (soft delete)
    pub fn archive(&self, id: AccountId) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;
        if account.archived {
            return Err(EnvelopeError::Validation(format!(
                "Account '{}' is already archived",
                account.name
            )));
        }
        account.archive();
        self.save(account)
    }

    pub fn unarchive(&self, id: AccountId) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;
        if !account.archived {
            return Err(EnvelopeError::Validation(format!(
                "Account '{}' is not archived",
                account.name
            )));
        }
        account.unarchive();
        self.save(account)
    }

    /// Delete an account that has no transactions
    pub fn delete(&self, id: AccountId) -> EnvelopeResult<Account> {
        let account = self.require(id)?;
        let count = self.storage.transactions.filter(|t| t.account_id == id)?.len();
        if count > 0 {
            return Err(EnvelopeError::Validation(format!(
                "Account '{}' has {} transaction(s); archive it instead",
                account.name, count
            )));
        }

        let mut changeset = Changeset::new();
        changeset.remove::<Account>(id);
        self.storage.commit(changeset)?;
        Ok(account)
    }

    /// Compare the cleared balance with a statement balance
    ///
    /// When they agree the reconciliation date and balance are recorded.
    pub fn reconcile(
        &self,
        id: AccountId,
        statement_balance: Money,
        date: NaiveDate,
    ) -> EnvelopeResult<ReconcileOutcome> {
        let mut account = self.require(id)?;
        let difference = statement_balance - account.cleared_balance;

        if difference.is_zero() {
            account.reconcile(date, statement_balance);
            account = self.save(account)?;
        } else {
            tracing::debug!(account = %id, difference = %difference, "reconciliation mismatch");
        }

        Ok(ReconcileOutcome {
            account,
            statement_balance,
            difference,
        })
    }

    fn require(&self, id: AccountId) -> EnvelopeResult<Account> {
        self.get(id)?
            .ok_or_else(|| EnvelopeError::account_not_found(id.to_string()))
    }

    fn save(&self, account: Account) -> EnvelopeResult<Account> {
        let mut changeset = Changeset::new();
        changeset.put(account.clone());
        self.storage.commit(changeset)?;
        Ok(account)
    }

    fn ensure_unique_name(
        &self,
        budget_id: BudgetId,
        name: &str,
        exclude: Option<AccountId>,
    ) -> EnvelopeResult<()> {
        let lower = name.to_lowercase();
        let taken = self.storage.accounts.filter(|a| {
            a.budget_id == budget_id && a.name.to_lowercase() == lower && Some(a.id) != exclude
        })?;
        if !taken.is_empty() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Account",
                identifier: name.to_string(),
            });
        }
        Ok(())
    }
}
