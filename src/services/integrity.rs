//! Ledger integrity checks
//!
//! Balances, allocations and budget totals are stored denormalized. This
//! service rebuilds them from the transactions of a budget, reports every
//! stored value that disagrees and can commit the rebuilt values.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, Budget, BudgetId, Category, Money, MonthKey, Transaction, TransactionId,
};
use crate::storage::{Changeset, Storage};

use super::posting::{LedgerDelta, LedgerDocuments};

/// A stored value that disagrees with the transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    /// Human-readable document, e.g. `account 'Checking'`
    pub document: String,
    pub field: String,
    pub stored: Money,
    pub expected: Money,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: stored {}, expected {}",
            self.document, self.field, self.stored, self.expected
        )
    }
}

/// Outcome of checking one budget
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub budget_id: BudgetId,
    pub transactions_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
    /// Transactions that cannot be posted as they are; recalculation
    /// leaves them out and does not repair them
    pub problems: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty() && self.problems.is_empty()
    }
}

/// Service for verifying and rebuilding derived values
pub struct IntegrityService<'a> {
    storage: &'a Storage,
}

/// Stored documents of a budget next to their rebuilt versions
struct Rebuild {
    stored: LedgerDocuments,
    expected: LedgerDocuments,
    transactions_checked: usize,
    problems: Vec<String>,
}

impl<'a> IntegrityService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Compare every derived value of a budget with its transactions
    pub fn verify(&self, budget_id: BudgetId) -> EnvelopeResult<IntegrityReport> {
        let rebuild = self.rebuild(budget_id)?;
        let discrepancies = compare(&rebuild.stored, &rebuild.expected);

        if !discrepancies.is_empty() || !rebuild.problems.is_empty() {
            tracing::warn!(
                budget = %budget_id,
                discrepancies = discrepancies.len(),
                problems = rebuild.problems.len(),
                "integrity check failed"
            );
        }

        Ok(IntegrityReport {
            budget_id,
            transactions_checked: rebuild.transactions_checked,
            discrepancies,
            problems: rebuild.problems,
        })
    }

    /// Replace every derived value with the one rebuilt from transactions
    ///
    /// Planned amounts are kept. Returns what was wrong before the repair.
    pub fn recalculate(&self, budget_id: BudgetId) -> EnvelopeResult<IntegrityReport> {
        let rebuild = self.rebuild(budget_id)?;
        let discrepancies = compare(&rebuild.stored, &rebuild.expected);

        let mut changeset = Changeset::new();
        let expected = rebuild.expected;
        for (id, account) in expected.accounts {
            if rebuild.stored.accounts.get(&id).is_some_and(|s| !same_account(s, &account)) {
                changeset.put(account);
            }
        }
        for (id, category) in expected.categories {
            if rebuild.stored.categories.get(&id).is_some_and(|s| !same_category(s, &category)) {
                changeset.put(category);
            }
        }
        for (id, budget) in expected.budgets {
            if rebuild.stored.budgets.get(&id).is_some_and(|s| !same_budget(s, &budget)) {
                changeset.put(budget);
            }
        }
        self.storage.commit(changeset)?;

        tracing::info!(budget = %budget_id, fixed = discrepancies.len(), "recalculated budget");
        Ok(IntegrityReport {
            budget_id,
            transactions_checked: rebuild.transactions_checked,
            discrepancies,
            problems: rebuild.problems,
        })
    }

    fn rebuild(&self, budget_id: BudgetId) -> EnvelopeResult<Rebuild> {
        let budget = self
            .storage
            .budgets
            .get(budget_id)?
            .ok_or_else(|| EnvelopeError::budget_not_found(budget_id.to_string()))?;

        let mut stored = LedgerDocuments::default();
        stored.budgets.insert(budget.id, budget);
        for account in self.storage.accounts.for_budget(budget_id)? {
            stored.accounts.insert(account.id, account);
        }
        for category in self.storage.categories.for_budget(budget_id)? {
            stored.categories.insert(category.id, category);
        }

        let mut expected = stored.clone();
        for account in expected.accounts.values_mut() {
            account.balance = Money::zero();
            account.cleared_balance = Money::zero();
        }
        for category in expected.categories.values_mut() {
            for allocation in category.allocations.values_mut() {
                allocation.actual = Money::zero();
            }
            category.recompute_balance();
        }
        for budget in expected.budgets.values_mut() {
            budget.allocations.clear();
            budget.balance = Money::zero();
        }

        let transactions = self.storage.transactions.for_budget(budget_id)?;
        let by_id: HashMap<_, _> = transactions.iter().map(|t| (t.id, t)).collect();

        let mut problems = Vec::new();
        let mut delta = LedgerDelta::default();
        for txn in &transactions {
            match check_transaction(txn, &stored, &by_id) {
                Ok(()) => delta = delta.merge(LedgerDelta::post(txn)),
                Err(problem) => problems.push(format!("transaction {}: {}", txn.id, problem)),
            }
        }
        delta.apply(&mut expected)?;

        Ok(Rebuild {
            stored,
            expected,
            transactions_checked: transactions.len(),
            problems,
        })
    }
}

/// Structural checks a transaction must pass before it can be posted
fn check_transaction(
    txn: &Transaction,
    docs: &LedgerDocuments,
    by_id: &HashMap<TransactionId, &Transaction>,
) -> Result<(), String> {
    txn.validate().map_err(|e| e.to_string())?;

    if !docs.accounts.contains_key(&txn.account_id) {
        return Err(format!("account {} does not exist in this budget", txn.account_id));
    }

    if let Some(other_id) = txn.transfer_transaction_id {
        let other = by_id
            .get(&other_id)
            .ok_or_else(|| format!("transfer counterpart {} is missing", other_id))?;
        if other.transfer_transaction_id != Some(txn.id) {
            return Err(format!("transfer counterpart {} does not link back", other_id));
        }
        if other.account_id == txn.account_id {
            return Err(format!(
                "transfer counterpart {} is in the same account",
                other_id
            ));
        }
        if other.amount != -txn.amount {
            return Err(format!(
                "transfer amount {} does not mirror counterpart amount {}",
                txn.amount, other.amount
            ));
        }
        return Ok(());
    }

    for split in &txn.splits {
        let category = docs
            .categories
            .get(&split.category_id)
            .ok_or_else(|| format!("category {} does not exist in this budget", split.category_id))?;
        if category.is_header() {
            return Err(format!("'{}' is a header and cannot hold money", category.name));
        }
    }
    Ok(())
}

fn compare(stored: &LedgerDocuments, expected: &LedgerDocuments) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    let mut push = |document: &str, field: String, stored: Money, expected: Money| {
        if stored != expected {
            out.push(Discrepancy {
                document: document.to_string(),
                field,
                stored,
                expected,
            });
        }
    };

    let mut accounts: Vec<&Account> = stored.accounts.values().collect();
    accounts.sort_by(|a, b| a.name.cmp(&b.name));
    for account in accounts {
        let Some(rebuilt) = expected.accounts.get(&account.id) else {
            continue;
        };
        let label = format!("account '{}'", account.name);
        push(&label, "balance".into(), account.balance, rebuilt.balance);
        push(
            &label,
            "cleared_balance".into(),
            account.cleared_balance,
            rebuilt.cleared_balance,
        );
    }

    let mut categories: Vec<&Category> = stored.categories.values().collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    for category in categories {
        let Some(rebuilt) = expected.categories.get(&category.id) else {
            continue;
        };
        let label = format!("category '{}'", category.name);
        let months: BTreeSet<MonthKey> = category
            .allocations
            .keys()
            .chain(rebuilt.allocations.keys())
            .copied()
            .collect();
        for month in months {
            let (s, e) = (category.allocation(month), rebuilt.allocation(month));
            push(&label, format!("allocations.{}.actual", month.key()), s.actual, e.actual);
            push(&label, format!("allocations.{}.balance", month.key()), s.balance, e.balance);
        }
        push(&label, "balance".into(), category.balance, rebuilt.balance);
    }

    for budget in stored.budgets.values() {
        let Some(rebuilt) = expected.budgets.get(&budget.id) else {
            continue;
        };
        let label = format!("budget '{}'", budget.name);
        let months: BTreeSet<MonthKey> = budget
            .allocations
            .keys()
            .chain(rebuilt.allocations.keys())
            .copied()
            .collect();
        for month in months {
            let (s, e) = (budget.month(month), rebuilt.month(month));
            push(&label, format!("allocations.{}.income", month.key()), s.income, e.income);
            push(&label, format!("allocations.{}.expense", month.key()), s.expense, e.expense);
        }
        push(&label, "balance".into(), budget.balance, rebuilt.balance);
    }

    out
}

fn same_account(a: &Account, b: &Account) -> bool {
    a.balance == b.balance && a.cleared_balance == b.cleared_balance
}

fn same_category(a: &Category, b: &Category) -> bool {
    a.balance == b.balance && a.allocations == b.allocations
}

fn same_budget(a: &Budget, b: &Budget) -> bool {
    let months: BTreeSet<MonthKey> = a.allocations.keys().chain(b.allocations.keys()).copied().collect();
    a.balance == b.balance && months.into_iter().all(|m| a.month(m) == b.month(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{date, expense, income, Fixture};
    use crate::services::{
        AccountService, BudgetService, TransactionService, TransactionUpdate, TransferService,
    };
    use crate::storage::Changeset;

    fn busy_fixture() -> Fixture {
        let f = Fixture::new();
        let jan = MonthKey::new(2025, 1).unwrap();
        BudgetService::new(&f.storage)
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(40000))
            .unwrap();
        AccountService::new(&f.storage)
            .create(f.budget.id, "Wallet", Money::from_cents(5000), date(2025, 1, 1))
            .unwrap();

        f.post(income(&f, 250000, (2025, 1, 1)));
        let groceries = f.post(expense(&f, f.groceries, 8000, (2025, 1, 4)));
        let dining = f.post(expense(&f, f.dining, 2500, (2025, 1, 20)).cleared(true));

        let txns = TransactionService::new(&f.storage);
        txns.update(
            groceries.id,
            TransactionUpdate {
                date: Some(date(2025, 2, 2)),
                account_id: Some(f.savings),
                ..Default::default()
            },
        )
        .unwrap();
        txns.delete(dining.id).unwrap();

        TransferService::new(&f.storage)
            .create_transfer(
                f.budget.id,
                f.checking,
                f.savings,
                Money::from_cents(10000),
                date(2025, 1, 15),
                "",
            )
            .unwrap();
        f
    }

    #[test]
    fn test_service_operations_leave_no_discrepancies() {
        let f = busy_fixture();
        let report = IntegrityService::new(&f.storage).verify(f.budget.id).unwrap();
        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(report.transactions_checked, 5);
    }

    #[test]
    fn test_tampering_is_reported_and_repaired() {
        let f = busy_fixture();
        let mut account = f.account(f.checking);
        account.balance += Money::from_cents(1);
        let mut category = f.category(f.groceries);
        category.balance = Money::zero();
        let mut changeset = Changeset::new();
        changeset.put(account).put(category);
        f.storage.commit(changeset).unwrap();

        let service = IntegrityService::new(&f.storage);
        let report = service.verify(f.budget.id).unwrap();
        assert_eq!(report.discrepancies.len(), 2);
        let fields: Vec<_> = report
            .discrepancies
            .iter()
            .map(|d| (d.document.as_str(), d.field.as_str()))
            .collect();
        assert!(fields.contains(&("account 'Checking'", "balance")));
        assert!(fields.contains(&("category 'Groceries'", "balance")));

        let fixed = service.recalculate(f.budget.id).unwrap();
        assert_eq!(fixed.discrepancies.len(), 2);
        assert!(service.verify(f.budget.id).unwrap().is_clean());

        // Planned money survives the rebuild
        let jan = MonthKey::new(2025, 1).unwrap();
        assert_eq!(f.category(f.groceries).allocation(jan).planned.cents(), 40000);
    }

    #[test]
    fn test_broken_transfer_is_a_problem() {
        let f = Fixture::new();
        let (out, _) = TransferService::new(&f.storage)
            .create_transfer(
                f.budget.id,
                f.checking,
                f.savings,
                Money::from_cents(100),
                date(2025, 1, 1),
                "",
            )
            .unwrap();
        let mut broken = f.storage.transactions.get(out.id).unwrap().unwrap();
        broken.amount = Money::from_cents(-90);
        let mut changeset = Changeset::new();
        changeset.put(broken);
        f.storage.commit(changeset).unwrap();

        let report = IntegrityService::new(&f.storage).verify(f.budget.id).unwrap();
        assert_eq!(report.problems.len(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_transfer_within_one_account_is_a_problem() {
        let f = Fixture::new();
        let (_, inc) = TransferService::new(&f.storage)
            .create_transfer(
                f.budget.id,
                f.checking,
                f.savings,
                Money::from_cents(100),
                date(2025, 1, 1),
                "",
            )
            .unwrap();
        let mut moved = f.storage.transactions.get(inc.id).unwrap().unwrap();
        moved.account_id = f.checking;
        let mut changeset = Changeset::new();
        changeset.put(moved);
        f.storage.commit(changeset).unwrap();

        let report = IntegrityService::new(&f.storage).verify(f.budget.id).unwrap();
        assert_eq!(report.problems.len(), 2);
        assert!(report
            .problems
            .iter()
            .all(|p| p.contains("same account")));
    }
}
