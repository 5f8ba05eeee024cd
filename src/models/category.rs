//! Category model
//!
//! Categories form a two-level tree: headers (no parent) group child
//! categories. Each category carries a month-keyed allocation map with the
//! planned amount, the actual activity posted from transactions and the
//! resulting month balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ids::{BudgetId, CategoryId};
use super::money::Money;
use super::month::MonthKey;

/// Whether a category collects income or spending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    #[default]
    Expense,
}

impl CategoryKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" | "in" => Some(Self::Income),
            "expense" | "out" | "spending" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "income"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

/// Built-in categories every budget has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCategory {
    /// Receives opening balances of new accounts
    StartingBalance,
    /// Receives imported transactions until the user categorizes them
    Uncategorized,
}

impl SystemCategory {
    pub fn all() -> &'static [Self] {
        &[Self::StartingBalance, Self::Uncategorized]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StartingBalance => "Starting Balance",
            Self::Uncategorized => "Uncategorized",
        }
    }

    pub fn kind(&self) -> CategoryKind {
        match self {
            Self::StartingBalance => CategoryKind::Income,
            Self::Uncategorized => CategoryKind::Expense,
        }
    }
}

/// Planned vs. actual for one category in one month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Allocation {
    /// Amount the user planned (budgeted) for the month
    pub planned: Money,
    /// Net activity posted from transactions (negative means spending)
    pub actual: Money,
    /// planned + actual
    pub balance: Money,
}

impl Allocation {
    fn rebalance(&mut self) {
        self.balance = self.planned + self.actual;
    }
}

/// A budget category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,

    /// The budget this category belongs to
    pub budget_id: BudgetId,

    pub name: String,

    /// Header this category is grouped under (None for headers)
    pub parent_id: Option<CategoryId>,

    #[serde(rename = "type")]
    pub kind: CategoryKind,

    /// Sort order among siblings
    pub sort_order: u32,

    /// Set for the built-in categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemCategory>,

    #[serde(default)]
    pub hidden: bool,

    /// Running envelope balance: sum of every month's allocation balance
    #[serde(default)]
    pub balance: Money,

    #[serde(default)]
    pub allocations: BTreeMap<MonthKey, Allocation>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a header category
    pub fn header(budget_id: BudgetId, name: impl Into<String>, kind: CategoryKind) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            budget_id,
            name: name.into(),
            parent_id: None,
            kind,
            sort_order: 0,
            system: None,
            hidden: false,
            balance: Money::zero(),
            allocations: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a child category under a header
    pub fn child(
        budget_id: BudgetId,
        name: impl Into<String>,
        parent: &Category,
    ) -> Self {
        let mut category = Self::header(budget_id, name, parent.kind);
        category.parent_id = Some(parent.id);
        category
    }

    /// Create one of the built-in categories
    pub fn system(budget_id: BudgetId, role: SystemCategory) -> Self {
        let mut category = Self::header(budget_id, role.name(), role.kind());
        category.system = Some(role);
        category
    }

    /// Headers group other categories and cannot receive transactions
    pub fn is_header(&self) -> bool {
        self.parent_id.is_none() && self.system.is_none()
    }

    pub fn is_system(&self) -> bool {
        self.system.is_some()
    }

    /// Allocation for a month, zero when none has been recorded
    pub fn allocation(&self, month: MonthKey) -> Allocation {
        self.allocations.get(&month).copied().unwrap_or_default()
    }

    /// Make sure an allocation exists for the month
    pub fn ensure_allocation(&mut self, month: MonthKey) {
        self.allocations.entry(month).or_default();
    }

    /// Set the planned amount for a month, returning the previous value
    pub fn set_planned(&mut self, month: MonthKey, planned: Money) -> Money {
        let allocation = self.allocations.entry(month).or_default();
        let previous = allocation.planned;
        allocation.planned = planned;
        allocation.rebalance();
        self.balance += planned - previous;
        self.updated_at = Utc::now();
        previous
    }

    /// Post transaction activity (inflow - outflow) into a month
    pub fn record_activity(&mut self, month: MonthKey, amount: Money) {
        let allocation = self.allocations.entry(month).or_default();
        allocation.actual += amount;
        allocation.rebalance();
        self.balance += amount;
        self.updated_at = Utc::now();
    }

    /// Recompute every month balance and the running balance from planned and
    /// actual values
    pub fn recompute_balance(&mut self) {
        let mut total = Money::zero();
        for allocation in self.allocations.values_mut() {
            allocation.rebalance();
            total += allocation.balance;
        }
        self.balance = total;
    }

    /// Total planned across months up to and including `month`
    pub fn planned_through(&self, month: MonthKey) -> Money {
        self.allocations
            .range(..=month)
            .map(|(_, a)| a.planned)
            .sum()
    }

    /// Copy the definition with fresh ids and no money attached
    pub fn blank_copy(&self, budget_id: BudgetId) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            budget_id,
            name: self.name.clone(),
            parent_id: self.parent_id,
            kind: self.kind,
            sort_order: self.sort_order,
            system: self.system,
            hidden: self.hidden,
            balance: Money::zero(),
            allocations: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        if self.name.trim().is_empty() {
            return Err(CategoryValidationError::EmptyName);
        }

        if self.name.len() > 50 {
            return Err(CategoryValidationError::NameTooLong(self.name.len()));
        }

        if self.parent_id == Some(self.id) {
            return Err(CategoryValidationError::OwnParent);
        }

        if self.system.is_some() && self.parent_id.is_some() {
            return Err(CategoryValidationError::SystemWithParent);
        }

        Ok(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Default headers and children for new budgets
pub const DEFAULT_CATEGORIES: &[(&str, CategoryKind, &[&str])] = &[
    ("Income", CategoryKind::Income, &["Paycheck"]),
    (
        "Bills",
        CategoryKind::Expense,
        &["Rent/Mortgage", "Electric", "Water", "Internet", "Phone", "Insurance"],
    ),
    (
        "Needs",
        CategoryKind::Expense,
        &["Groceries", "Transportation", "Medical", "Household"],
    ),
    (
        "Wants",
        CategoryKind::Expense,
        &["Dining Out", "Entertainment", "Shopping", "Subscriptions"],
    ),
    (
        "Savings",
        CategoryKind::Expense,
        &["Emergency Fund", "Vacation", "Large Purchases"],
    ),
];

/// Categories every new budget starts with
///
/// The built-in categories and the `Income` header are always present; the
/// spending groups from [`DEFAULT_CATEGORIES`] are added when `defaults` is
/// set.
pub fn starter_categories(budget_id: BudgetId, defaults: bool) -> Vec<Category> {
    let mut categories: Vec<Category> = SystemCategory::all()
        .iter()
        .map(|role| Category::system(budget_id, *role))
        .collect();

    let groups = DEFAULT_CATEGORIES
        .iter()
        .filter(|(_, kind, _)| defaults || *kind == CategoryKind::Income);

    for (i, (name, kind, children)) in groups.enumerate() {
        let mut header = Category::header(budget_id, *name, *kind);
        header.sort_order = i as u32 + 1;
        for (j, child_name) in children.iter().enumerate() {
            let mut child = Category::child(budget_id, *child_name, &header);
            child.sort_order = j as u32 + 1;
            categories.push(child);
        }
        categories.push(header);
    }

    categories
}

/// Validation errors for categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    EmptyName,
    NameTooLong(usize),
    OwnParent,
    SystemWithParent,
}

impl fmt::Display for CategoryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Category name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Category name too long ({} chars, max 50)", len)
            }
            Self::OwnParent => write!(f, "A category cannot be its own parent"),
            Self::SystemWithParent => write!(f, "Built-in categories cannot have a parent"),
        }
    }
}

impl std::error::Error for CategoryValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    #[test]
    fn test_child_inherits_kind() {
        let budget = BudgetId::new();
        let header = Category::header(budget, "Income", CategoryKind::Income);
        let child = Category::child(budget, "Paycheck", &header);
        assert_eq!(child.kind, CategoryKind::Income);
        assert_eq!(child.parent_id, Some(header.id));
        assert!(header.is_header());
        assert!(!child.is_header());
    }

    #[test]
    fn test_system_category_is_not_header() {
        let category = Category::system(BudgetId::new(), SystemCategory::Uncategorized);
        assert!(!category.is_header());
        assert!(category.is_system());
        assert_eq!(category.name, "Uncategorized");
    }

    #[test]
    fn test_planned_and_activity_balance() {
        let mut category = Category::header(BudgetId::new(), "Groceries", CategoryKind::Expense);
        let jan = month(2025, 1);

        assert_eq!(category.set_planned(jan, Money::from_cents(40000)), Money::zero());
        category.record_activity(jan, Money::from_cents(-12550));

        let alloc = category.allocation(jan);
        assert_eq!(alloc.planned.cents(), 40000);
        assert_eq!(alloc.actual.cents(), -12550);
        assert_eq!(alloc.balance.cents(), 27450);
        assert_eq!(category.balance.cents(), 27450);

        assert_eq!(
            category.set_planned(jan, Money::from_cents(30000)),
            Money::from_cents(40000)
        );
        assert_eq!(category.balance.cents(), 17450);
    }

    #[test]
    fn test_recompute_balance_matches_incremental() {
        let mut category = Category::header(BudgetId::new(), "Fun", CategoryKind::Expense);
        category.set_planned(month(2025, 1), Money::from_cents(5000));
        category.record_activity(month(2025, 2), Money::from_cents(-2000));
        let incremental = category.balance;

        category.balance = Money::from_cents(999);
        category.recompute_balance();
        assert_eq!(category.balance, incremental);
        assert_eq!(category.balance.cents(), 3000);
    }

    #[test]
    fn test_planned_through() {
        let mut category = Category::header(BudgetId::new(), "Rent", CategoryKind::Expense);
        category.set_planned(month(2025, 1), Money::from_cents(100));
        category.set_planned(month(2025, 2), Money::from_cents(200));
        category.set_planned(month(2025, 3), Money::from_cents(400));
        assert_eq!(category.planned_through(month(2025, 2)).cents(), 300);
    }

    #[test]
    fn test_validation() {
        let mut category = Category::header(BudgetId::new(), "Ok", CategoryKind::Expense);
        assert!(category.validate().is_ok());

        category.parent_id = Some(category.id);
        assert_eq!(category.validate(), Err(CategoryValidationError::OwnParent));

        category.parent_id = None;
        category.name = "x".repeat(51);
        assert!(matches!(
            category.validate(),
            Err(CategoryValidationError::NameTooLong(51))
        ));
    }

    #[test]
    fn test_starter_categories() {
        let budget = BudgetId::new();
        let minimal = starter_categories(budget, false);
        let names: Vec<_> = minimal.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(minimal.len(), 4);
        assert!(names.contains(&"Starting Balance"));
        assert!(names.contains(&"Uncategorized"));
        assert!(names.contains(&"Income"));
        assert!(names.contains(&"Paycheck"));

        let full = starter_categories(budget, true);
        let headers: Vec<_> = full.iter().filter(|c| c.is_header()).collect();
        assert_eq!(headers.len(), 5);
        assert!(full.iter().all(|c| c.budget_id == budget));
        assert!(full
            .iter()
            .filter(|c| !c.is_header() && !c.is_system())
            .all(|c| headers.iter().any(|h| Some(h.id) == c.parent_id)));
    }

    #[test]
    fn test_blank_copy_drops_money() {
        let mut category = Category::header(BudgetId::new(), "Fun", CategoryKind::Expense);
        category.record_activity(month(2025, 1), Money::from_cents(-100));
        let target = BudgetId::new();
        let copy = category.blank_copy(target);

        assert_ne!(copy.id, category.id);
        assert_eq!(copy.budget_id, target);
        assert_eq!(copy.name, "Fun");
        assert!(copy.allocations.is_empty());
        assert_eq!(copy.balance, Money::zero());
    }
}
