//! Shared fixture for service tests

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::config::paths::EnvelopePaths;
use crate::models::{
    Account, AccountId, Budget, Category, CategoryId, CategorySplit, Money, Transaction,
};
use crate::storage::Storage;

use super::{AccountService, BudgetService, NewTransaction, TransactionService};

/// A "Household" budget with the default categories and two empty accounts
pub(crate) struct Fixture {
    _temp: TempDir,
    pub storage: Storage,
    pub budget: Budget,
    pub checking: AccountId,
    pub savings: AccountId,
    pub needs: CategoryId,
    pub groceries: CategoryId,
    pub dining: CategoryId,
    pub paycheck: CategoryId,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp.path().to_path_buf());
        paths.ensure_directories().unwrap();
        let storage = Storage::new(paths).unwrap();
        storage.load_all().unwrap();

        let budget = BudgetService::new(&storage).create("Household", true).unwrap();

        let accounts = AccountService::new(&storage);
        let opened = date(2025, 1, 1);
        let checking = accounts
            .create(budget.id, "Checking", Money::zero(), opened)
            .unwrap()
            .id;
        let savings = accounts
            .create(budget.id, "Savings", Money::zero(), opened)
            .unwrap()
            .id;

        let categories = storage.categories.for_budget(budget.id).unwrap();
        let id_of = |name: &str| {
            categories
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.id)
                .unwrap()
        };

        Self {
            needs: id_of("Needs"),
            groceries: id_of("Groceries"),
            dining: id_of("Dining Out"),
            paycheck: id_of("Paycheck"),
            checking,
            savings,
            budget,
            storage,
            _temp: temp,
        }
    }

    pub fn post(&self, input: NewTransaction) -> Transaction {
        TransactionService::new(&self.storage).create(input).unwrap()
    }

    pub fn budget(&self) -> Budget {
        self.storage.budgets.get(self.budget.id).unwrap().unwrap()
    }

    pub fn account(&self, id: AccountId) -> Account {
        self.storage.accounts.get(id).unwrap().unwrap()
    }

    pub fn category(&self, id: CategoryId) -> Category {
        self.storage.categories.get(id).unwrap().unwrap()
    }
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An outflow from checking into one category
pub(crate) fn expense(
    f: &Fixture,
    category: CategoryId,
    cents: i64,
    (y, m, d): (i32, u32, u32),
) -> NewTransaction {
    NewTransaction::new(
        f.budget.id,
        f.checking,
        date(y, m, d),
        vec![CategorySplit::new(category, Money::from_cents(-cents))],
    )
}

/// A paycheck deposited into checking
pub(crate) fn income(f: &Fixture, cents: i64, (y, m, d): (i32, u32, u32)) -> NewTransaction {
    NewTransaction::new(
        f.budget.id,
        f.checking,
        date(y, m, d),
        vec![CategorySplit::new(f.paycheck, Money::from_cents(cents))],
    )
    .payee("Employer")
}
