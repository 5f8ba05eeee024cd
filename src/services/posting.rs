//! Posting engine
//!
//! A [`LedgerDelta`] is the effect a transaction has on the denormalized
//! documents: the account balance (and cleared balance), the category
//! activity for the transaction's month and the budget month totals.
//! Deltas are pure values; every mutation is expressed as
//! `reverse(old) ⊕ post(new)` and applied to copies of the affected
//! documents before they are staged in a changeset.

use std::collections::{BTreeMap, HashMap};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, AccountId, Budget, BudgetId, Category, CategoryId, Money, MonthKey, Transaction,
};
use crate::storage::{Changeset, Record, Repository, Storage};

/// Change to an account's balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountDelta {
    pub balance: Money,
    pub cleared: Money,
}

impl AccountDelta {
    fn is_zero(&self) -> bool {
        self.balance.is_zero() && self.cleared.is_zero()
    }
}

/// Change to a budget month's totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetDelta {
    pub income: Money,
    pub expense: Money,
}

impl BudgetDelta {
    fn is_zero(&self) -> bool {
        self.income.is_zero() && self.expense.is_zero()
    }
}

/// The combined effect of one or more transactions on the ledger documents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerDelta {
    accounts: BTreeMap<AccountId, AccountDelta>,
    categories: BTreeMap<(CategoryId, MonthKey), Money>,
    budgets: BTreeMap<(BudgetId, MonthKey), BudgetDelta>,
}

impl LedgerDelta {
    /// Effects of `txn` existing in the ledger
    pub fn post(txn: &Transaction) -> Self {
        let mut delta = Self::default();

        let account = delta.accounts.entry(txn.account_id).or_default();
        account.balance += txn.amount;
        if txn.cleared {
            account.cleared += txn.amount;
        }

        if !txn.is_transfer() {
            let month = txn.month();
            for split in &txn.splits {
                *delta
                    .categories
                    .entry((split.category_id, month))
                    .or_default() += split.net();
            }

            let (income, expense) = txn.amount.split_flow();
            let budget = delta.budgets.entry((txn.budget_id, month)).or_default();
            budget.income += income;
            budget.expense += expense;
        }

        delta.prune();
        delta
    }

    /// Effects of `txn` being removed from the ledger
    pub fn reverse(txn: &Transaction) -> Self {
        Self::post(txn).negated()
    }

    /// Effects of `old` being replaced by `new`
    pub fn replace(old: &Transaction, new: &Transaction) -> Self {
        Self::reverse(old).merge(Self::post(new))
    }

    pub fn negated(mut self) -> Self {
        for account in self.accounts.values_mut() {
            account.balance = -account.balance;
            account.cleared = -account.cleared;
        }
        for amount in self.categories.values_mut() {
            *amount = -*amount;
        }
        for budget in self.budgets.values_mut() {
            budget.income = -budget.income;
            budget.expense = -budget.expense;
        }
        self
    }

    /// Combine two deltas; entries that cancel out disappear
    pub fn merge(mut self, other: Self) -> Self {
        for (id, d) in other.accounts {
            let entry = self.accounts.entry(id).or_default();
            entry.balance += d.balance;
            entry.cleared += d.cleared;
        }
        for (key, amount) in other.categories {
            *self.categories.entry(key).or_default() += amount;
        }
        for (key, d) in other.budgets {
            let entry = self.budgets.entry(key).or_default();
            entry.income += d.income;
            entry.expense += d.expense;
        }
        self.prune();
        self
    }

    fn prune(&mut self) {
        self.accounts.retain(|_, d| !d.is_zero());
        self.categories.retain(|_, amount| !amount.is_zero());
        self.budgets.retain(|_, d| !d.is_zero());
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.categories.is_empty() && self.budgets.is_empty()
    }

    pub fn account(&self, id: AccountId) -> AccountDelta {
        self.accounts.get(&id).copied().unwrap_or_default()
    }

    pub fn category(&self, id: CategoryId, month: MonthKey) -> Money {
        self.categories.get(&(id, month)).copied().unwrap_or_default()
    }

    pub fn budget(&self, id: BudgetId, month: MonthKey) -> BudgetDelta {
        self.budgets.get(&(id, month)).copied().unwrap_or_default()
    }

    /// Apply to loaded copies of the affected documents
    ///
    /// Missing month allocations are created with zero values first. Fails
    /// without modifying anything if a document is missing.
    pub fn apply(&self, docs: &mut LedgerDocuments) -> EnvelopeResult<()> {
        for id in self.accounts.keys() {
            if !docs.accounts.contains_key(id) {
                return Err(EnvelopeError::account_not_found(id.to_string()));
            }
        }
        for (id, _) in self.categories.keys() {
            if !docs.categories.contains_key(id) {
                return Err(EnvelopeError::category_not_found(id.to_string()));
            }
        }
        for (id, _) in self.budgets.keys() {
            if !docs.budgets.contains_key(id) {
                return Err(EnvelopeError::budget_not_found(id.to_string()));
            }
        }

        for (id, d) in &self.accounts {
            if let Some(account) = docs.accounts.get_mut(id) {
                account.apply(d.balance, d.cleared);
            }
        }
        for ((id, month), amount) in &self.categories {
            if let Some(category) = docs.categories.get_mut(id) {
                category.record_activity(*month, *amount);
            }
        }
        for ((id, month), d) in &self.budgets {
            if let Some(budget) = docs.budgets.get_mut(id) {
                budget.record(*month, d.income, d.expense);
            }
        }

        Ok(())
    }

    /// Load the affected documents, apply the delta and stage the results
    ///
    /// Documents already staged in `changeset` are used in preference to the
    /// stored ones, so several deltas can be staged into one changeset.
    pub fn stage(&self, storage: &Storage, changeset: &mut Changeset) -> EnvelopeResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut docs = LedgerDocuments::default();
        for id in self.accounts.keys() {
            if let Some(account) = current(&storage.accounts, changeset, *id)? {
                docs.accounts.insert(*id, account);
            }
        }
        for (id, _) in self.categories.keys() {
            if !docs.categories.contains_key(id) {
                if let Some(category) = current(&storage.categories, changeset, *id)? {
                    docs.categories.insert(*id, category);
                }
            }
        }
        for (id, _) in self.budgets.keys() {
            if !docs.budgets.contains_key(id) {
                if let Some(budget) = current(&storage.budgets, changeset, *id)? {
                    docs.budgets.insert(*id, budget);
                }
            }
        }

        self.apply(&mut docs)?;
        docs.stage(changeset);
        Ok(())
    }
}

/// The newest version of a document: staged if present, otherwise stored
pub(crate) fn current<T: Record>(
    repo: &Repository<T>,
    changeset: &Changeset,
    id: T::Id,
) -> EnvelopeResult<Option<T>> {
    if T::changes(changeset).is_removed(id) {
        return Ok(None);
    }
    match changeset.staged::<T>(id) {
        Some(staged) => Ok(Some(staged.clone())),
        None => repo.get(id),
    }
}

/// Working copies of the documents a delta touches
#[derive(Debug, Clone, Default)]
pub struct LedgerDocuments {
    pub accounts: HashMap<AccountId, Account>,
    pub categories: HashMap<CategoryId, Category>,
    pub budgets: HashMap<BudgetId, Budget>,
}

impl LedgerDocuments {
    pub fn stage(self, changeset: &mut Changeset) {
        for (_, account) in self.accounts {
            changeset.put(account);
        }
        for (_, category) in self.categories {
            changeset.put(category);
        }
        for (_, budget) in self.budgets {
            changeset.put(budget);
        }
    }
}
