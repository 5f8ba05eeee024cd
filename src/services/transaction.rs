//! Transaction service
//!
//! Creates, edits and deletes categorized transactions. Every mutation is
//! posted through [`LedgerDelta`] so account balances, category allocations
//! and budget totals change in the same commit as the transaction itself.

use chrono::{NaiveDate, Utc};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, AccountId, BudgetId, CategoryId, CategorySplit, MonthKey, Transaction, TransactionId,
};
use crate::storage::{Changeset, Storage};

use super::posting::{current, LedgerDelta};

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
}

/// Options for filtering transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub budget_id: Option<BudgetId>,
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Cleared transactions are hidden unless set
    pub include_cleared: bool,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn budget(mut self, budget_id: BudgetId) -> Self {
        self.budget_id = Some(budget_id);
        self
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn month(self, month: MonthKey) -> Self {
        self.date_range(month.start_date(), month.end_date())
    }

    pub fn include_cleared(mut self, include: bool) -> Self {
        self.include_cleared = include;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, txn: &Transaction) -> bool {
        if self.budget_id.is_some_and(|id| txn.budget_id != id) {
            return false;
        }
        if self.account_id.is_some_and(|id| txn.account_id != id) {
            return false;
        }
        if self.category_id.is_some_and(|id| !txn.touches_category(id)) {
            return false;
        }
        if self.start_date.is_some_and(|d| txn.date < d) {
            return false;
        }
        if self.end_date.is_some_and(|d| txn.date > d) {
            return false;
        }
        self.include_cleared || !txn.cleared
    }
}

/// Input for creating a categorized transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub budget_id: BudgetId,
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub payee: String,
    pub memo: String,
    pub splits: Vec<CategorySplit>,
    pub cleared: bool,
    pub import_id: Option<String>,
}

impl NewTransaction {
    pub fn new(
        budget_id: BudgetId,
        account_id: AccountId,
        date: NaiveDate,
        splits: Vec<CategorySplit>,
    ) -> Self {
        Self {
            budget_id,
            account_id,
            date,
            payee: String::new(),
            memo: String::new(),
            splits,
            cleared: false,
            import_id: None,
        }
    }

    pub fn payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = payee.into();
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn cleared(mut self, cleared: bool) -> Self {
        self.cleared = cleared;
        self
    }
}

/// Changes to an existing transaction; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub date: Option<NaiveDate>,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub account_id: Option<AccountId>,
    pub splits: Option<Vec<CategorySplit>>,
    pub cleared: Option<bool>,
}

impl TransactionUpdate {
    /// Whether the update touches fields a transfer leg must keep in sync
    /// with its counterpart
    fn changes_transfer_shape(&self) -> bool {
        self.date.is_some() || self.account_id.is_some() || self.splits.is_some()
    }
}

impl<'a> TransactionService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create and post a transaction
    pub fn create(&self, input: NewTransaction) -> EnvelopeResult<Transaction> {
        let mut changeset = Changeset::new();
        let txn = self.stage_new(input, &mut changeset)?;
        self.storage.commit(changeset)?;

        tracing::debug!(txn = %txn.id, amount = %txn.amount, "created transaction");
        Ok(txn)
    }

    /// Validate a new transaction and stage it with its postings
    pub(crate) fn stage_new(
        &self,
        input: NewTransaction,
        changeset: &mut Changeset,
    ) -> EnvelopeResult<Transaction> {
        self.check_account(input.budget_id, input.account_id, changeset)?;
        self.check_splits(input.budget_id, &input.splits, changeset)?;

        let mut txn = Transaction::new(input.budget_id, input.account_id, input.date, input.splits);
        txn.payee = input.payee.trim().to_string();
        txn.memo = input.memo.trim().to_string();
        txn.cleared = input.cleared;
        txn.import_id = input.import_id;

        txn.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        LedgerDelta::post(&txn).stage(self.storage, changeset)?;
        changeset.put(txn.clone());
        Ok(txn)
    }

    /// The account must exist in the budget and accept new activity
    pub(crate) fn check_account(
        &self,
        budget_id: BudgetId,
        account_id: AccountId,
        changeset: &Changeset,
    ) -> EnvelopeResult<Account> {
        let account = current(&self.storage.accounts, changeset, account_id)?
            .filter(|a| a.budget_id == budget_id)
            .ok_or_else(|| EnvelopeError::account_not_found(account_id.to_string()))?;

        if account.archived {
            return Err(EnvelopeError::Validation(format!(
                "Account '{}' is archived",
                account.name
            )));
        }
        Ok(account)
    }

    fn check_splits(
        &self,
        budget_id: BudgetId,
        splits: &[CategorySplit],
        changeset: &Changeset,
    ) -> EnvelopeResult<()> {
        for split in splits {
            let category = current(&self.storage.categories, changeset, split.category_id)?
                .filter(|c| c.budget_id == budget_id)
                .ok_or_else(|| EnvelopeError::category_not_found(split.category_id.to_string()))?;

            if category.is_header() {
                return Err(EnvelopeError::Validation(format!(
                    "'{}' is a header; pick one of its categories",
                    category.name
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: TransactionId) -> EnvelopeResult<Option<Transaction>> {
        self.storage.transactions.get(id)
    }

    /// Find a transaction of a budget by id prefix
    pub fn find(&self, budget_id: BudgetId, identifier: &str) -> EnvelopeResult<Transaction> {
        let mut hits = self
            .storage
            .transactions
            .filter(|t| t.budget_id == budget_id && t.id.matches(identifier))?;

        match hits.len() {
            0 => Err(EnvelopeError::transaction_not_found(identifier)),
            1 => Ok(hits.remove(0)),
            n => Err(EnvelopeError::Validation(format!(
                "'{}' matches {} transactions; use more of the id",
                identifier, n
            ))),
        }
    }

    /// Transactions matching a filter, newest first
    pub fn list(&self, filter: &TransactionFilter) -> EnvelopeResult<Vec<Transaction>> {
        let mut txns = self.storage.transactions.filter(|t| filter.matches(t))?;
        if let Some(limit) = filter.limit {
            txns.truncate(limit);
        }
        Ok(txns)
    }

    /// Edit a transaction, re-posting its effects
    ///
    /// Transfer legs only accept payee, memo and cleared changes here; their
    /// amount and date are edited through the transfer service so both legs
    /// stay mirrored.
    pub fn update(&self, id: TransactionId, update: TransactionUpdate) -> EnvelopeResult<Transaction> {
        let old = self
            .get(id)?
            .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))?;

        if old.is_transfer() && update.changes_transfer_shape() {
            return Err(EnvelopeError::Validation(
                "Edit transfers with 'transfer edit' so both sides stay in sync".into(),
            ));
        }

        let mut changeset = Changeset::new();
        let mut new = old.clone();

        if let Some(date) = update.date {
            new.date = date;
        }
        if let Some(payee) = update.payee {
            new.payee = payee.trim().to_string();
        }
        if let Some(memo) = update.memo {
            new.memo = memo.trim().to_string();
        }
        if let Some(account_id) = update.account_id {
            if account_id != old.account_id {
                self.check_account(old.budget_id, account_id, &changeset)?;
            }
            new.account_id = account_id;
        }
        if let Some(splits) = update.splits {
            self.check_splits(old.budget_id, &splits, &changeset)?;
            new.set_splits(splits);
        }
        if let Some(cleared) = update.cleared {
            new.cleared = cleared;
        }
        new.updated_at = Utc::now();

        new.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        LedgerDelta::replace(&old, &new).stage(self.storage, &mut changeset)?;
        changeset.put(new.clone());
        self.storage.commit(changeset)?;

        Ok(new)
    }

    /// Delete a transaction, reversing its effects
    ///
    /// Deleting either leg of a transfer deletes both.
    pub fn delete(&self, id: TransactionId) -> EnvelopeResult<Vec<Transaction>> {
        let txn = self
            .get(id)?
            .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))?;

        let mut removed = vec![txn.clone()];
        if let Some(other_id) = txn.transfer_transaction_id {
            match self.get(other_id)? {
                Some(other) => removed.push(other),
                None => tracing::warn!(txn = %id, "transfer counterpart is missing"),
            }
        }

        let mut changeset = Changeset::new();
        let delta = removed
            .iter()
            .fold(LedgerDelta::default(), |acc, t| acc.merge(LedgerDelta::reverse(t)));
        delta.stage(self.storage, &mut changeset)?;
        for t in &removed {
            changeset.remove::<Transaction>(t.id);
        }
        self.storage.commit(changeset)?;

        Ok(removed)
    }

    /// Mark a transaction cleared or uncleared
    pub fn set_cleared(&self, id: TransactionId, cleared: bool) -> EnvelopeResult<Transaction> {
        self.update(
            id,
            TransactionUpdate {
                cleared: Some(cleared),
                ..Default::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, MAX_AMOUNT_CENTS};
    use crate::services::test_support::{date, expense, Fixture};

    fn month(m: u32) -> MonthKey {
        MonthKey::new(2025, m).unwrap()
    }

    #[test]
    fn test_create_posts_everywhere() {
        let f = Fixture::new();
        let txn = f.post(expense(&f, f.groceries, 4250, (2025, 1, 5)).payee("Market"));

        assert_eq!(txn.amount.cents(), -4250);
        assert_eq!(txn.payee, "Market");

        let account = f.account(f.checking);
        assert_eq!(account.balance.cents(), -4250);
        assert_eq!(account.cleared_balance, Money::zero());

        let category = f.category(f.groceries);
        assert_eq!(category.allocation(month(1)).actual.cents(), -4250);
        assert_eq!(category.balance.cents(), -4250);

        let budget = f.budget();
        assert_eq!(budget.month(month(1)).expense.cents(), 4250);
        assert_eq!(budget.balance.cents(), -4250);
    }

    #[test]
    fn test_split_transaction() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let txn = service
            .create(NewTransaction::new(
                f.budget.id,
                f.checking,
                date(2025, 1, 5),
                vec![
                    CategorySplit::new(f.groceries, Money::from_cents(-6000)),
                    CategorySplit::new(f.dining, Money::from_cents(-4000)),
                ],
            ))
            .unwrap();

        assert_eq!(txn.amount.cents(), -10000);
        assert_eq!(f.category(f.groceries).balance.cents(), -6000);
        assert_eq!(f.category(f.dining).balance.cents(), -4000);
        assert_eq!(f.account(f.checking).balance.cents(), -10000);
    }

    #[test]
    fn test_create_validation_leaves_documents_unchanged() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let before = (f.account(f.checking), f.budget());

        // Header category
        let err = service.create(expense(&f, f.needs, 100, (2025, 1, 1))).unwrap_err();
        assert!(err.is_validation());

        // Unknown category
        let err = service
            .create(expense(&f, CategoryId::new(), 100, (2025, 1, 1)))
            .unwrap_err();
        assert!(err.is_not_found());

        // No splits
        let err = service
            .create(NewTransaction::new(f.budget.id, f.checking, date(2025, 1, 1), vec![]))
            .unwrap_err();
        assert!(err.is_validation());

        assert_eq!((f.account(f.checking), f.budget()), before);
        assert_eq!(f.storage.transactions.count().unwrap(), 0);
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let huge = i64::MAX / 2 + 1;

        for _ in 0..2 {
            let err = service
                .create(expense(&f, f.groceries, huge, (2025, 1, 1)))
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert!(f.account(f.checking).balance.is_zero());

        // The largest accepted amount still posts cleanly more than once
        f.post(expense(&f, f.groceries, MAX_AMOUNT_CENTS, (2025, 1, 1)));
        f.post(expense(&f, f.groceries, MAX_AMOUNT_CENTS, (2025, 1, 2)));
        assert_eq!(f.account(f.checking).balance.cents(), -2 * MAX_AMOUNT_CENTS);
    }

    #[test]
    fn test_archived_account_rejected() {
        let f = Fixture::new();
        crate::services::AccountService::new(&f.storage)
            .archive(f.savings)
            .unwrap();

        let mut input = expense(&f, f.groceries, 100, (2025, 1, 1));
        input.account_id = f.savings;
        let err = TransactionService::new(&f.storage).create(input).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_update_amount_category_month_account() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let txn = f.post(expense(&f, f.groceries, 3000, (2025, 1, 31)));

        service
            .update(
                txn.id,
                TransactionUpdate {
                    date: Some(date(2025, 2, 1)),
                    account_id: Some(f.savings),
                    splits: Some(vec![CategorySplit::new(f.dining, Money::from_cents(-3500))]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(f.account(f.checking).balance, Money::zero());
        assert_eq!(f.account(f.savings).balance.cents(), -3500);

        let groceries = f.category(f.groceries);
        assert_eq!(groceries.allocation(month(1)).actual, Money::zero());
        assert_eq!(groceries.balance, Money::zero());
        assert_eq!(f.category(f.dining).allocation(month(2)).actual.cents(), -3500);

        let budget = f.budget();
        assert_eq!(budget.month(month(1)).expense, Money::zero());
        assert_eq!(budget.month(month(2)).expense.cents(), 3500);
        assert_eq!(budget.balance.cents(), -3500);
    }

    #[test]
    fn test_set_cleared_adjusts_cleared_balance() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let txn = f.post(expense(&f, f.groceries, 800, (2025, 1, 3)));

        service.set_cleared(txn.id, true).unwrap();
        assert_eq!(f.account(f.checking).cleared_balance.cents(), -800);

        service.set_cleared(txn.id, false).unwrap();
        assert_eq!(f.account(f.checking).cleared_balance, Money::zero());
        assert_eq!(f.account(f.checking).balance.cents(), -800);
    }

    #[test]
    fn test_delete_reverses_everything() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        let txn = f.post(expense(&f, f.groceries, 999, (2025, 1, 3)).cleared(true));

        let removed = service.delete(txn.id).unwrap();
        assert_eq!(removed.len(), 1);

        let account = f.account(f.checking);
        assert_eq!(account.balance, Money::zero());
        assert_eq!(account.cleared_balance, Money::zero());
        assert_eq!(f.category(f.groceries).balance, Money::zero());
        assert_eq!(f.budget().balance, Money::zero());
        assert!(service.get(txn.id).unwrap().is_none());
    }

    #[test]
    fn test_list_hides_cleared_by_default_newest_first() {
        let f = Fixture::new();
        let service = TransactionService::new(&f.storage);
        f.post(expense(&f, f.groceries, 100, (2025, 1, 1)));
        f.post(expense(&f, f.groceries, 200, (2025, 1, 3)).cleared(true));
        f.post(expense(&f, f.dining, 300, (2025, 2, 2)));

        let filter = TransactionFilter::new().budget(f.budget.id);
        let visible = service.list(&filter).unwrap();
        let amounts: Vec<_> = visible.iter().map(|t| t.amount.cents()).collect();
        assert_eq!(amounts, vec![-300, -100]);

        let all = service.list(&filter.clone().include_cleared(true)).unwrap();
        assert_eq!(all.len(), 3);

        let jan_groceries = service
            .list(
                &filter
                    .clone()
                    .include_cleared(true)
                    .category(f.groceries)
                    .month(month(1))
                    .limit(1),
            )
            .unwrap();
        assert_eq!(jan_groceries.len(), 1);
        assert_eq!(jan_groceries[0].amount.cents(), -200);
    }

    #[test]
    fn test_find_by_id_prefix() {
        let f = Fixture::new();
        let txn = f.post(expense(&f, f.groceries, 100, (2025, 1, 1)));
        let service = TransactionService::new(&f.storage);

        assert_eq!(service.find(f.budget.id, &txn.id.to_string()).unwrap().id, txn.id);
        assert!(service.find(f.budget.id, "txn-zzzzzzzz").unwrap_err().is_not_found());
    }
}
