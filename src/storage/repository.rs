//! Generic JSON document repository
//!
//! Each document kind lives in its own file under `data/` as
//! `{"<collection>": [ ... ]}` and is held in memory in a
//! `RwLock<HashMap>`. Repositories are read-only from the outside; all
//! writes go through [`Storage::commit`](super::Storage::commit).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::audit::EntityType;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, Budget, BudgetId, Category, Transaction};

use super::changeset::{Changes, Changeset};
use super::file_io::read_json;

/// A document kind stored by a [`Repository`]
pub trait Record: Clone + Serialize + DeserializeOwned {
    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    /// Key of the array in the JSON file
    const COLLECTION: &'static str;
    /// File name under `data/`
    const FILE: &'static str;
    const ENTITY: EntityType;

    fn id(&self) -> Self::Id;

    fn budget_id(&self) -> BudgetId;

    /// Label recorded in the audit log
    fn label(&self) -> String;

    /// Display ordering for listings
    fn order(&self, other: &Self) -> Ordering;

    /// The slot of a changeset holding changes for this kind
    fn changes(changeset: &Changeset) -> &Changes<Self>;
    fn changes_mut(changeset: &mut Changeset) -> &mut Changes<Self>;
}

/// In-memory view of one JSON document file
pub struct Repository<T: Record> {
    path: PathBuf,
    data: RwLock<HashMap<T::Id, T>>,
}

impl<T: Record> Repository<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> EnvelopeResult<RwLockReadGuard<'_, HashMap<T::Id, T>>> {
        self.data
            .read()
            .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> EnvelopeResult<RwLockWriteGuard<'_, HashMap<T::Id, T>>> {
        self.data
            .write()
            .map_err(|e| EnvelopeError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Load documents from disk, replacing what is in memory
    pub fn load(&self) -> EnvelopeResult<()> {
        let file: Value = read_json(&self.path)?;
        let items: Vec<T> = match file.get(T::COLLECTION) {
            Some(items) => serde_json::from_value(items.clone()).map_err(|e| {
                EnvelopeError::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
            })?,
            None => Vec::new(),
        };

        let mut data = self.write()?;
        data.clear();
        for item in items {
            data.insert(item.id(), item);
        }

        Ok(())
    }

    pub fn get(&self, id: T::Id) -> EnvelopeResult<Option<T>> {
        Ok(self.read()?.get(&id).cloned())
    }

    pub fn exists(&self, id: T::Id) -> EnvelopeResult<bool> {
        Ok(self.read()?.contains_key(&id))
    }

    /// All documents in display order
    pub fn all(&self) -> EnvelopeResult<Vec<T>> {
        self.filter(|_| true)
    }

    /// Documents matching a predicate, in display order
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> EnvelopeResult<Vec<T>> {
        let data = self.read()?;
        let mut items: Vec<T> = data.values().filter(|&t| pred(t)).cloned().collect();
        items.sort_by(|a, b| a.order(b));
        Ok(items)
    }

    /// Documents belonging to one budget, in display order
    pub fn for_budget(&self, budget_id: BudgetId) -> EnvelopeResult<Vec<T>> {
        self.filter(|t| t.budget_id() == budget_id)
    }

    pub fn count(&self) -> EnvelopeResult<usize> {
        Ok(self.read()?.len())
    }

    /// Current contents with `changes` applied, without touching memory
    pub(crate) fn staged(&self, changes: &Changes<T>) -> EnvelopeResult<HashMap<T::Id, T>> {
        let mut map = self.read()?.clone();
        for id in changes.deletes() {
            map.remove(id);
        }
        for item in changes.upserts() {
            map.insert(item.id(), item.clone());
        }
        Ok(map)
    }

    /// Replace the in-memory contents
    pub(crate) fn install(&self, map: HashMap<T::Id, T>) -> EnvelopeResult<()> {
        *self.write()? = map;
        Ok(())
    }

    /// The file body for a set of documents, in display order
    pub(crate) fn document(map: &HashMap<T::Id, T>) -> EnvelopeResult<Value> {
        let mut items: Vec<&T> = map.values().collect();
        items.sort_by(|a, b| a.order(b));

        let mut body = serde_json::Map::new();
        body.insert(T::COLLECTION.to_string(), serde_json::to_value(items)?);
        Ok(Value::Object(body))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Record for Budget {
    type Id = crate::models::BudgetId;
    const COLLECTION: &'static str = "budgets";
    const FILE: &'static str = "budgets.json";
    const ENTITY: EntityType = EntityType::Budget;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn budget_id(&self) -> BudgetId {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn order(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then(self.created_at.cmp(&other.created_at))
    }

    fn changes(changeset: &Changeset) -> &Changes<Self> {
        &changeset.budgets
    }

    fn changes_mut(changeset: &mut Changeset) -> &mut Changes<Self> {
        &mut changeset.budgets
    }
}

impl Record for Account {
    type Id = crate::models::AccountId;
    const COLLECTION: &'static str = "accounts";
    const FILE: &'static str = "accounts.json";
    const ENTITY: EntityType = EntityType::Account;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn budget_id(&self) -> BudgetId {
        self.budget_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn order(&self, other: &Self) -> Ordering {
        self.sort_order
            .cmp(&other.sort_order)
            .then_with(|| self.name.cmp(&other.name))
    }

    fn changes(changeset: &Changeset) -> &Changes<Self> {
        &changeset.accounts
    }

    fn changes_mut(changeset: &mut Changeset) -> &mut Changes<Self> {
        &mut changeset.accounts
    }
}

impl Record for Category {
    type Id = crate::models::CategoryId;
    const COLLECTION: &'static str = "categories";
    const FILE: &'static str = "categories.json";
    const ENTITY: EntityType = EntityType::Category;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn budget_id(&self) -> BudgetId {
        self.budget_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn order(&self, other: &Self) -> Ordering {
        self.sort_order
            .cmp(&other.sort_order)
            .then_with(|| self.name.cmp(&other.name))
    }

    fn changes(changeset: &Changeset) -> &Changes<Self> {
        &changeset.categories
    }

    fn changes_mut(changeset: &mut Changeset) -> &mut Changes<Self> {
        &mut changeset.categories
    }
}

impl Record for Transaction {
    type Id = crate::models::TransactionId;
    const COLLECTION: &'static str = "transactions";
    const FILE: &'static str = "transactions.json";
    const ENTITY: EntityType = EntityType::Transaction;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn budget_id(&self) -> BudgetId {
        self.budget_id
    }

    fn label(&self) -> String {
        if self.payee.is_empty() {
            self.date.to_string()
        } else {
            format!("{} {}", self.date, self.payee)
        }
    }

    /// Newest first
    fn order(&self, other: &Self) -> Ordering {
        other
            .date
            .cmp(&self.date)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }

    fn changes(changeset: &Changeset) -> &Changes<Self> {
        &changeset.transactions
    }

    fn changes_mut(changeset: &mut Changeset) -> &mut Changes<Self> {
        &mut changeset.transactions
    }
}
