//! envelope - an envelope-budgeting ledger
//!
//! Accounts, categories with monthly planned/actual allocations, and the
//! transactions that connect them. Every transaction mutation is turned into
//! a ledger delta and committed with the documents it touches as one
//! journaled changeset, so account balances, category allocations and
//! budget totals never disagree with the transactions.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models (budgets, accounts, categories, transactions)
//! - `storage`: JSON file storage with a write-ahead journal
//! - `audit`: Audit logging system
//! - `services`: Business logic and the posting engine
//! - `export`: JSON and YAML budget snapshots
//! - `display`: Terminal formatting
//! - `cli`: Command handlers for the `envelope` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use envelope::config::{EnvelopePaths, Settings};
//! use envelope::services::BudgetService;
//! use envelope::storage::Storage;
//!
//! let paths = EnvelopePaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let storage = Storage::new(paths)?;
//! storage.load_all()?;
//! let budget = BudgetService::new(&storage).resolve(&settings, None)?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{EnvelopeError, EnvelopeResult};
