//! Budget service
//!
//! Budget lifecycle (create, rename, active selection, fresh start), monthly
//! planning and the planned-vs-actual overview with Available to Budget.

use std::collections::HashMap;

use crate::config::Settings;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    starter_categories, Budget, BudgetId, Category, CategoryId, CategoryKind, Money, MonthKey,
    MonthTotals,
};
use crate::storage::{Changeset, Storage};

use super::pick_one;

/// Service for budget management
pub struct BudgetService<'a> {
    storage: &'a Storage,
}

/// One line of the monthly overview
#[derive(Debug, Clone)]
pub struct OverviewRow {
    pub category: Category,
    /// Headers sum their children
    pub is_header: bool,
    pub planned: Money,
    pub actual: Money,
    pub balance: Money,
}

/// Planned vs. actual for one budget month
#[derive(Debug, Clone)]
pub struct BudgetOverview {
    pub budget: Budget,
    pub month: MonthKey,
    /// Spending rows: each header followed by its children, then built-in
    /// spending categories
    pub rows: Vec<OverviewRow>,
    pub totals: MonthTotals,
    pub total_planned: Money,
    pub total_actual: Money,
    pub total_balance: Money,
    /// Income received through this month minus everything planned through it
    pub available_to_budget: Money,
}

impl<'a> BudgetService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a budget with the built-in categories and an Income group
    ///
    /// With `with_defaults` the standard spending groups are added as well.
    pub fn create(&self, name: &str, with_defaults: bool) -> EnvelopeResult<Budget> {
        let name = name.trim();
        self.ensure_unique_name(name, None)?;

        let budget = Budget::new(name);
        budget
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let mut changeset = Changeset::new();
        for category in starter_categories(budget.id, with_defaults) {
            changeset.put(category);
        }
        changeset.put(budget.clone());
        self.storage.commit(changeset)?;

        tracing::info!(budget = %budget.id, name = %budget.name, "created budget");
        Ok(budget)
    }

    pub fn get(&self, id: BudgetId) -> EnvelopeResult<Option<Budget>> {
        self.storage.budgets.get(id)
    }

    pub fn list(&self) -> EnvelopeResult<Vec<Budget>> {
        self.storage.budgets.all()
    }

    /// Find a budget by name or id
    pub fn find(&self, identifier: &str) -> EnvelopeResult<Budget> {
        pick_one(
            self.list()?,
            identifier,
            "Budget",
            |b| b.name.as_str(),
            |b, s| b.id.matches(s),
        )
    }

    pub fn rename(&self, id: BudgetId, name: &str) -> EnvelopeResult<Budget> {
        let mut budget = self
            .get(id)?
            .ok_or_else(|| EnvelopeError::budget_not_found(id.to_string()))?;

        let name = name.trim();
        self.ensure_unique_name(name, Some(id))?;
        budget.name = name.to_string();
        budget.updated_at = chrono::Utc::now();
        budget
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let mut changeset = Changeset::new();
        changeset.put(budget.clone());
        self.storage.commit(changeset)?;
        Ok(budget)
    }

    fn ensure_unique_name(&self, name: &str, exclude: Option<BudgetId>) -> EnvelopeResult<()> {
        let lower = name.to_lowercase();
        let taken = self
            .list()?
            .iter()
            .any(|b| b.name.to_lowercase() == lower && Some(b.id) != exclude);
        if taken {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Budget",
                identifier: name.to_string(),
            });
        }
        Ok(())
    }

    /// Make a budget the default for later commands
    pub fn set_active(&self, settings: &mut Settings, id: BudgetId) -> EnvelopeResult<()> {
        if !self.storage.budgets.exists(id)? {
            return Err(EnvelopeError::budget_not_found(id.to_string()));
        }
        settings.active_budget = Some(id);
        settings.save(self.storage.paths())
    }

    /// The budget a command operates on
    ///
    /// An explicit identifier wins, then the active budget from the
    /// settings. With neither, a lone budget is used.
    pub fn resolve(&self, settings: &Settings, explicit: Option<&str>) -> EnvelopeResult<Budget> {
        if let Some(identifier) = explicit {
            return self.find(identifier);
        }

        if let Some(id) = settings.active_budget {
            if let Some(budget) = self.get(id)? {
                return Ok(budget);
            }
            tracing::warn!(budget = %id, "active budget no longer exists");
        }

        let mut budgets = self.list()?;
        if budgets.len() == 1 {
            return Ok(budgets.remove(0));
        }
        Err(EnvelopeError::NoActiveBudget)
    }

    /// Set the planned amount of a category for a month
    ///
    /// Returns the updated category and the previously planned amount.
    pub fn plan(
        &self,
        budget_id: BudgetId,
        category_id: CategoryId,
        month: MonthKey,
        amount: Money,
    ) -> EnvelopeResult<(Category, Money)> {
        check_planned(amount)?;
        let mut category = self.plannable(budget_id, category_id)?;
        let previous = category.set_planned(month, amount);

        let mut changeset = Changeset::new();
        changeset.put(category.clone());
        self.storage.commit(changeset)?;

        Ok((category, previous))
    }

    /// Move planned money from one category to another within a month
    pub fn move_planned(
        &self,
        budget_id: BudgetId,
        from: CategoryId,
        to: CategoryId,
        month: MonthKey,
        amount: Money,
    ) -> EnvelopeResult<(Category, Category)> {
        if !amount.is_positive() {
            return Err(EnvelopeError::Budget("Amount to move must be positive".into()));
        }
        if from == to {
            return Err(EnvelopeError::Budget(
                "Cannot move money to the same category".into(),
            ));
        }

        let mut source = self.plannable(budget_id, from)?;
        let mut target = self.plannable(budget_id, to)?;

        let source_planned = source.allocation(month).planned - amount;
        let target_planned = target.allocation(month).planned + amount;
        check_planned(source_planned)?;
        check_planned(target_planned)?;
        source.set_planned(month, source_planned);
        target.set_planned(month, target_planned);

        let mut changeset = Changeset::new();
        changeset.put(source.clone()).put(target.clone());
        self.storage.commit(changeset)?;

        Ok((source, target))
    }

    fn plannable(&self, budget_id: BudgetId, category_id: CategoryId) -> EnvelopeResult<Category> {
        let category = self
            .storage
            .categories
            .get(category_id)?
            .filter(|c| c.budget_id == budget_id)
            .ok_or_else(|| EnvelopeError::category_not_found(category_id.to_string()))?;

        if category.is_header() {
            return Err(EnvelopeError::Budget(format!(
                "'{}' is a header; plan its child categories instead",
                category.name
            )));
        }
        Ok(category)
    }

    /// Planned vs. actual for every spending category in a month
    pub fn overview(&self, budget_id: BudgetId, month: MonthKey) -> EnvelopeResult<BudgetOverview> {
        let budget = self
            .get(budget_id)?
            .ok_or_else(|| EnvelopeError::budget_not_found(budget_id.to_string()))?;
        let categories = self.storage.categories.for_budget(budget_id)?;

        let mut children: HashMap<CategoryId, Vec<&Category>> = HashMap::new();
        for category in &categories {
            if let Some(parent) = category.parent_id {
                children.entry(parent).or_default().push(category);
            }
        }

        let mut rows = Vec::new();
        let mut total_planned = Money::zero();
        let mut total_actual = Money::zero();
        let mut total_balance = Money::zero();

        let headers = categories
            .iter()
            .filter(|c| c.is_header() && c.kind == CategoryKind::Expense && !c.hidden);
        for header in headers {
            let kids: Vec<&Category> = children
                .get(&header.id)
                .map(|v| v.iter().copied().filter(|c| !c.hidden).collect())
                .unwrap_or_default();

            let child_rows: Vec<OverviewRow> = kids.iter().map(|c| leaf_row(c, month)).collect();
            let header_row = OverviewRow {
                category: header.clone(),
                is_header: true,
                planned: child_rows.iter().map(|r| r.planned).sum(),
                actual: child_rows.iter().map(|r| r.actual).sum(),
                balance: child_rows.iter().map(|r| r.balance).sum(),
            };

            total_planned += header_row.planned;
            total_actual += header_row.actual;
            total_balance += header_row.balance;
            rows.push(header_row);
            rows.extend(child_rows);
        }

        let builtin = categories
            .iter()
            .filter(|c| c.is_system() && c.kind == CategoryKind::Expense && !c.hidden);
        for category in builtin {
            let row = leaf_row(category, month);
            total_planned += row.planned;
            total_actual += row.actual;
            total_balance += row.balance;
            rows.push(row);
        }

        let planned_through: Money = categories.iter().map(|c| c.planned_through(month)).sum();
        let available_to_budget = budget.income_through(month) - planned_through;

        Ok(BudgetOverview {
            totals: budget.month(month),
            budget,
            month,
            rows,
            total_planned,
            total_actual,
            total_balance,
            available_to_budget,
        })
    }

    /// Start over with an empty copy of a budget's categories
    ///
    /// The new budget keeps the category hierarchy and order but no money,
    /// accounts or transactions, and becomes the active budget.
    pub fn fresh_start(
        &self,
        settings: &mut Settings,
        source_id: BudgetId,
        name: Option<&str>,
    ) -> EnvelopeResult<Budget> {
        let source = self
            .get(source_id)?
            .ok_or_else(|| EnvelopeError::budget_not_found(source_id.to_string()))?;

        let name = match name {
            Some(name) => name.trim().to_string(),
            None => format!(
                "{} ({})",
                source.name,
                chrono::Local::now().date_naive().format("%Y-%m-%d")
            ),
        };
        self.ensure_unique_name(&name, None)?;

        let budget = Budget::new(name);
        budget
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let categories = self.storage.categories.for_budget(source_id)?;
        let copies: Vec<Category> = categories.iter().map(|c| c.blank_copy(budget.id)).collect();
        let id_map: HashMap<CategoryId, CategoryId> = categories
            .iter()
            .zip(&copies)
            .map(|(old, new)| (old.id, new.id))
            .collect();

        let mut changeset = Changeset::new();
        for mut copy in copies {
            copy.parent_id = copy.parent_id.and_then(|p| id_map.get(&p).copied());
            changeset.put(copy);
        }
        changeset.put(budget.clone());
        self.storage.commit(changeset)?;

        self.set_active(settings, budget.id)?;
        tracing::info!(from = %source.id, to = %budget.id, "fresh start");
        Ok(budget)
    }
}

fn check_planned(amount: Money) -> EnvelopeResult<()> {
    if amount.within_limit() {
        Ok(())
    } else {
        Err(EnvelopeError::Validation(format!(
            "Planned amount {} is too large",
            amount
        )))
    }
}

fn leaf_row(category: &Category, month: MonthKey) -> OverviewRow {
    let allocation = category.allocation(month);
    OverviewRow {
        category: category.clone(),
        is_header: false,
        planned: allocation.planned,
        actual: allocation.actual,
        balance: allocation.balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{expense, income, Fixture};

    #[test]
    fn test_create_budget_with_starter_categories() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let budget = service.create("Vacation Home", false).unwrap();

        let categories = f.storage.categories.for_budget(budget.id).unwrap();
        assert_eq!(categories.len(), 4);
        assert!(categories.iter().any(|c| c.name == "Paycheck"));

        let err = service.create("vacation home", false).unwrap_err();
        assert!(matches!(err, EnvelopeError::Duplicate { .. }));
    }

    #[test]
    fn test_find_by_name_or_id() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        assert_eq!(service.find("household").unwrap().id, f.budget.id);
        assert_eq!(
            service.find(&f.budget.id.to_string()).unwrap().id,
            f.budget.id
        );
        assert!(service.find("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_prefers_explicit_then_active() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let other = service.create("Other", false).unwrap();

        let mut settings = Settings::default();
        assert!(matches!(
            service.resolve(&settings, None),
            Err(EnvelopeError::NoActiveBudget)
        ));

        service.set_active(&mut settings, other.id).unwrap();
        assert_eq!(service.resolve(&settings, None).unwrap().id, other.id);
        assert_eq!(
            service.resolve(&settings, Some("Household")).unwrap().id,
            f.budget.id
        );
    }

    #[test]
    fn test_plan_updates_allocation_and_running_balance() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let jan = MonthKey::new(2025, 1).unwrap();

        let (category, previous) = service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(40000))
            .unwrap();
        assert_eq!(previous, Money::zero());
        assert_eq!(category.allocation(jan).balance.cents(), 40000);

        f.post(expense(&f, f.groceries, 12500, (2025, 1, 9)));
        let (category, previous) = service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(30000))
            .unwrap();
        assert_eq!(previous.cents(), 40000);
        assert_eq!(category.allocation(jan).balance.cents(), 17500);
        assert_eq!(category.balance.cents(), 17500);
    }

    #[test]
    fn test_plan_rejects_headers_and_foreign_categories() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let jan = MonthKey::new(2025, 1).unwrap();

        let err = service
            .plan(f.budget.id, f.needs, jan, Money::from_cents(100))
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Budget(_)));

        let other = service.create("Other", false).unwrap();
        let err = service
            .plan(other.id, f.groceries, jan, Money::from_cents(100))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(i64::MAX))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(f.category(f.groceries).allocation(jan).planned.is_zero());
    }

    #[test]
    fn test_move_planned() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let jan = MonthKey::new(2025, 1).unwrap();
        service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(50000))
            .unwrap();

        let (from, to) = service
            .move_planned(f.budget.id, f.groceries, f.dining, jan, Money::from_cents(7500))
            .unwrap();
        assert_eq!(from.allocation(jan).planned.cents(), 42500);
        assert_eq!(to.allocation(jan).planned.cents(), 7500);

        assert!(service
            .move_planned(f.budget.id, f.groceries, f.groceries, jan, Money::from_cents(1))
            .is_err());
    }

    #[test]
    fn test_overview_and_available_to_budget() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let jan = MonthKey::new(2025, 1).unwrap();
        let feb = MonthKey::new(2025, 2).unwrap();

        f.post(income(&f, 300000, (2025, 1, 1)));
        service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(50000))
            .unwrap();
        service
            .plan(f.budget.id, f.dining, feb, Money::from_cents(20000))
            .unwrap();
        f.post(expense(&f, f.groceries, 12000, (2025, 1, 12)));

        let overview = service.overview(f.budget.id, jan).unwrap();
        assert_eq!(overview.totals.income.cents(), 300000);
        assert_eq!(overview.totals.expense.cents(), 12000);
        assert_eq!(overview.total_planned.cents(), 50000);
        assert_eq!(overview.total_actual.cents(), -12000);
        assert_eq!(overview.available_to_budget.cents(), 250000);

        let header = overview
            .rows
            .iter()
            .find(|r| r.category.id == f.needs)
            .unwrap();
        assert!(header.is_header);
        assert_eq!(header.balance.cents(), 38000);

        // Income header is not a spending row
        assert!(overview.rows.iter().all(|r| r.category.kind == CategoryKind::Expense));

        // February counts planned money from both months
        let overview = service.overview(f.budget.id, feb).unwrap();
        assert_eq!(overview.available_to_budget.cents(), 230000);
        assert_eq!(overview.totals, MonthTotals::default());
    }

    #[test]
    fn test_fresh_start_copies_categories_only() {
        let f = Fixture::new();
        let service = BudgetService::new(&f.storage);
        let jan = MonthKey::new(2025, 1).unwrap();
        service
            .plan(f.budget.id, f.groceries, jan, Money::from_cents(50000))
            .unwrap();
        f.post(expense(&f, f.groceries, 1000, (2025, 1, 2)));

        let mut settings = Settings::default();
        let fresh = service
            .fresh_start(&mut settings, f.budget.id, Some("Clean Slate"))
            .unwrap();

        assert_eq!(settings.active_budget, Some(fresh.id));
        let old = f.storage.categories.for_budget(f.budget.id).unwrap();
        let new = f.storage.categories.for_budget(fresh.id).unwrap();
        assert_eq!(old.len(), new.len());
        assert!(new.iter().all(|c| c.allocations.is_empty() && c.balance.is_zero()));

        let groceries = new.iter().find(|c| c.name == "Groceries").unwrap();
        let parent = new.iter().find(|c| Some(c.id) == groceries.parent_id).unwrap();
        assert_eq!(parent.name, "Needs");

        assert!(f.storage.accounts.for_budget(fresh.id).unwrap().is_empty());
        assert_eq!(fresh.balance, Money::zero());
    }
}
