//! Changesets: every document write of one operation, committed together

use crate::models::{Account, Budget, Category, Transaction};

use super::repository::Record;

/// Upserts and deletes for one document kind
#[derive(Debug, Clone)]
pub struct Changes<T: Record> {
    upserts: Vec<T>,
    deletes: Vec<T::Id>,
}

impl<T: Record> Default for Changes<T> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T: Record> Changes<T> {
    /// Stage a document, replacing an earlier staged version with the same id
    pub fn put(&mut self, item: T) {
        let id = item.id();
        self.deletes.retain(|d| *d != id);
        match self.upserts.iter_mut().find(|u| u.id() == id) {
            Some(existing) => *existing = item,
            None => self.upserts.push(item),
        }
    }

    pub fn remove(&mut self, id: T::Id) {
        self.upserts.retain(|u| u.id() != id);
        if !self.deletes.contains(&id) {
            self.deletes.push(id);
        }
    }

    /// The staged version of a document, if any
    pub fn staged(&self, id: T::Id) -> Option<&T> {
        self.upserts.iter().find(|u| u.id() == id)
    }

    pub fn is_removed(&self, id: T::Id) -> bool {
        self.deletes.contains(&id)
    }

    pub fn upserts(&self) -> &[T] {
        &self.upserts
    }

    pub fn deletes(&self) -> &[T::Id] {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// All document writes of one operation
///
/// Services build a changeset and hand it to
/// [`Storage::commit`](super::Storage::commit); nothing reaches disk until
/// then.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub budgets: Changes<Budget>,
    pub accounts: Changes<Account>,
    pub categories: Changes<Category>,
    pub transactions: Changes<Transaction>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Record>(&mut self, item: T) -> &mut Self {
        T::changes_mut(self).put(item);
        self
    }

    pub fn remove<T: Record>(&mut self, id: T::Id) -> &mut Self {
        T::changes_mut(self).remove(id);
        self
    }

    pub fn staged<T: Record>(&self, id: T::Id) -> Option<&T> {
        T::changes(self).staged(id)
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
            && self.accounts.is_empty()
            && self.categories.is_empty()
            && self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BudgetId;

    #[test]
    fn test_put_replaces_same_id() {
        let mut changeset = Changeset::new();
        let mut account = Account::new(BudgetId::new(), "Checking");
        changeset.put(account.clone());
        account.name = "Renamed".into();
        changeset.put(account.clone());

        assert_eq!(changeset.accounts.upserts().len(), 1);
        assert_eq!(
            changeset.staged::<Account>(account.id).unwrap().name,
            "Renamed"
        );
    }

    #[test]
    fn test_remove_cancels_put_and_vice_versa() {
        let mut changeset = Changeset::new();
        let budget = Budget::new("Home");
        let id = budget.id;

        changeset.put(budget.clone());
        changeset.remove::<Budget>(id);
        assert!(changeset.budgets.upserts().is_empty());
        assert!(changeset.budgets.is_removed(id));

        changeset.put(budget);
        assert!(!changeset.budgets.is_removed(id));
        assert!(!changeset.is_empty());
    }
}
