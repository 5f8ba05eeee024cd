//! Core data models
//!
//! Budgets, accounts, categories and transactions, plus the value types they
//! are built from: money, ids and month keys.

pub mod account;
pub mod budget;
pub mod category;
pub mod ids;
pub mod money;
pub mod month;
pub mod transaction;

pub use account::Account;
pub use budget::{Budget, MonthTotals};
pub use category::{
    starter_categories, Allocation, Category, CategoryKind, SystemCategory, DEFAULT_CATEGORIES,
};
pub use ids::{AccountId, BudgetId, CategoryId, TransactionId};
pub use money::{Money, MAX_AMOUNT_CENTS};
pub use month::MonthKey;
pub use transaction::{import_key, CategorySplit, Transaction, TransactionKind};
