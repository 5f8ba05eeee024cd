//! Category service
//!
//! Provides business logic for the two-level category hierarchy: headers
//! group child categories, and only children (plus the built-in categories)
//! receive money.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, Category, CategoryId, CategoryKind, MonthKey, SystemCategory};
use crate::storage::{Changeset, Storage};

use super::pick_one;

/// Service for category management
pub struct CategoryService<'a> {
    storage: &'a Storage,
}

/// A top-level category with its children
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<Category>,
}

/// Changes to a category; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    /// Move under another header
    pub parent_id: Option<CategoryId>,
    pub kind: Option<CategoryKind>,
    pub hidden: Option<bool>,
}

impl<'a> CategoryService<'a> {
    /// Create a new category service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a header (no parent) or a child category
    ///
    /// Children take their kind from the header. Zero allocations are set up
    /// for the current and next month so the category shows in the budget
    /// right away.
    pub fn create(
        &self,
        budget_id: BudgetId,
        name: &str,
        parent_id: Option<CategoryId>,
        kind: Option<CategoryKind>,
    ) -> EnvelopeResult<Category> {
        if !self.storage.budgets.exists(budget_id)? {
            return Err(EnvelopeError::budget_not_found(budget_id.to_string()));
        }
        let name = name.trim();

        let mut category = match parent_id {
            Some(parent_id) => {
                let parent = self.header_of(budget_id, parent_id)?;
                if kind.is_some_and(|k| k != parent.kind) {
                    return Err(EnvelopeError::Validation(format!(
                        "Categories under '{}' are {} categories",
                        parent.name, parent.kind
                    )));
                }
                let mut child = Category::child(budget_id, name, &parent);
                let month = MonthKey::current();
                child.ensure_allocation(month);
                child.ensure_allocation(month.next());
                child
            }
            None => Category::header(budget_id, name, kind.unwrap_or_default()),
        };

        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let siblings = self.siblings(budget_id, parent_id)?;
        ensure_unique(&siblings, name, None)?;
        category.sort_order = siblings.iter().map(|c| c.sort_order).max().unwrap_or(0) + 1;

        let mut changeset = Changeset::new();
        changeset.put(category.clone());
        self.storage.commit(changeset)?;

        tracing::debug!(category = %category.id, name = %category.name, "created category");
        Ok(category)
    }

    pub fn get(&self, id: CategoryId) -> EnvelopeResult<Option<Category>> {
        self.storage.categories.get(id)
    }

    /// Find a category by name, `Header/Child` path or ID
    pub fn find(&self, budget_id: BudgetId, identifier: &str) -> EnvelopeResult<Category> {
        let categories = self.storage.categories.for_budget(budget_id)?;

        if let Some((header, child)) = identifier.split_once('/') {
            let by_path = categories.iter().find(|c| c.name.eq_ignore_ascii_case(header.trim()));
            if let Some(parent) = by_path.filter(|c| c.is_header()) {
                let parent_id = parent.id;
                let children: Vec<Category> = categories
                    .iter()
                    .filter(|c| c.parent_id == Some(parent_id))
                    .cloned()
                    .collect();
                return pick_one(children, child, "Category", |c| c.name.as_str(), |c, s| {
                    c.id.matches(s)
                });
            }
        }

        pick_one(
            categories,
            identifier,
            "Category",
            |c| c.name.as_str(),
            |c, s| c.id.matches(s),
        )
    }

    /// A built-in category of a budget
    pub fn system(&self, budget_id: BudgetId, role: SystemCategory) -> EnvelopeResult<Category> {
        self.storage
            .categories
            .filter(|c| c.budget_id == budget_id && c.system == Some(role))?
            .into_iter()
            .next()
            .ok_or_else(|| EnvelopeError::category_not_found(role.name()))
    }

    /// The built-in category, staging a new one when the budget lacks it
    pub(crate) fn ensure_system(
        &self,
        budget_id: BudgetId,
        role: SystemCategory,
        changeset: &mut Changeset,
    ) -> EnvelopeResult<Category> {
        let staged = changeset
            .categories
            .upserts()
            .iter()
            .find(|c| c.budget_id == budget_id && c.system == Some(role))
            .cloned();
        if let Some(category) = staged {
            return Ok(category);
        }

        match self.system(budget_id, role) {
            Ok(category) => Ok(category),
            Err(e) if e.is_not_found() => {
                tracing::warn!(budget = %budget_id, role = role.name(), "restoring missing built-in category");
                let category = Category::system(budget_id, role);
                changeset.put(category.clone());
                Ok(category)
            }
            Err(e) => Err(e),
        }
    }

    /// Categories of a budget as a tree, in display order
    pub fn tree(&self, budget_id: BudgetId, include_hidden: bool) -> EnvelopeResult<Vec<CategoryNode>> {
        let categories = self
            .storage
            .categories
            .filter(|c| c.budget_id == budget_id && (include_hidden || !c.hidden))?;

        let mut children: HashMap<CategoryId, Vec<Category>> = HashMap::new();
        let mut roots = Vec::new();
        for category in categories {
            match category.parent_id {
                Some(parent) => children.entry(parent).or_default().push(category),
                None => roots.push(category),
            }
        }

        Ok(roots
            .into_iter()
            .map(|category| CategoryNode {
                children: children.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Rename, move, re-kind or hide a category
    pub fn update(&self, id: CategoryId, update: CategoryUpdate) -> EnvelopeResult<Category> {
        let old = self.require(id)?;
        let mut category = old.clone();
        let mut changeset = Changeset::new();

        if category.is_system()
            && (update.name.is_some() || update.parent_id.is_some() || update.kind.is_some())
        {
            return Err(EnvelopeError::Validation(format!(
                "'{}' is built in; it can only be hidden or shown",
                category.name
            )));
        }

        if let Some(parent_id) = update.parent_id.filter(|p| Some(*p) != old.parent_id) {
            if parent_id == id {
                return Err(EnvelopeError::Validation(
                    "A category cannot be its own parent".into(),
                ));
            }
            let parent = self.header_of(old.budget_id, parent_id)?;
            if old.is_header() && !self.children(id)?.is_empty() {
                return Err(EnvelopeError::Validation(format!(
                    "'{}' has categories of its own and cannot be nested",
                    old.name
                )));
            }

            let siblings = self.siblings(old.budget_id, Some(parent_id))?;
            category.parent_id = Some(parent_id);
            category.kind = parent.kind;
            category.sort_order = siblings.iter().map(|c| c.sort_order).max().unwrap_or(0) + 1;
        }

        if let Some(name) = update.name {
            category.name = name.trim().to_string();
        }

        if let Some(kind) = update.kind.filter(|k| *k != category.kind) {
            if !category.is_header() {
                return Err(EnvelopeError::Validation(format!(
                    "'{}' takes its type from its header",
                    category.name
                )));
            }
            category.kind = kind;
            for mut child in self.children(id)? {
                child.kind = kind;
                child.updated_at = Utc::now();
                changeset.put(child);
            }
        }

        if let Some(hidden) = update.hidden {
            category.hidden = hidden;
        }

        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        if category.name != old.name || category.parent_id != old.parent_id {
            let siblings = self.siblings(category.budget_id, category.parent_id)?;
            ensure_unique(&siblings, &category.name, Some(id))?;
        }

        category.updated_at = Utc::now();
        changeset.put(category.clone());
        self.storage.commit(changeset)?;
        Ok(category)
    }

    /// Give `order` sort positions 1..n among their siblings
    ///
    /// Siblings not listed keep their relative order after the listed ones.
    /// Only categories whose position changes are written.
    pub fn reorder(&self, budget_id: BudgetId, order: &[CategoryId]) -> EnvelopeResult<Vec<Category>> {
        let Some(first) = order.first() else {
            return Ok(Vec::new());
        };
        let parent_id = self
            .require(*first)?
            .parent_id;
        let siblings = self.siblings(budget_id, parent_id)?;

        for id in order {
            if !siblings.iter().any(|c| c.id == *id) {
                return Err(EnvelopeError::Validation(format!(
                    "Category {} is not in the same group as {}",
                    id, first
                )));
            }
        }

        let (mut listed, rest): (Vec<Category>, Vec<Category>) =
            siblings.into_iter().partition(|c| order.contains(&c.id));
        listed.sort_by_key(|c| order.iter().position(|id| *id == c.id));

        let mut changeset = Changeset::new();
        let mut result = Vec::new();
        for (i, mut category) in listed.into_iter().chain(rest).enumerate() {
            let position = i as u32 + 1;
            if category.sort_order != position {
                category.sort_order = position;
                category.updated_at = Utc::now();
                changeset.put(category.clone());
            }
            result.push(category);
        }
        self.storage.commit(changeset)?;

        Ok(result)
    }

    /// Delete a category nothing refers to
    pub fn delete(&self, id: CategoryId) -> EnvelopeResult<Category> {
        let category = self.require(id)?;

        if category.is_system() {
            return Err(EnvelopeError::Validation(format!(
                "'{}' is built in and cannot be deleted",
                category.name
            )));
        }
        if !self.children(id)?.is_empty() {
            return Err(EnvelopeError::Validation(format!(
                "'{}' still has categories under it",
                category.name
            )));
        }
        let used = self.storage.transactions.filter(|t| t.touches_category(id))?.len();
        if used > 0 {
            return Err(EnvelopeError::Validation(format!(
                "'{}' is used by {} transaction(s)",
                category.name, used
            )));
        }

        let mut changeset = Changeset::new();
        changeset.remove::<Category>(id);
        self.storage.commit(changeset)?;
        Ok(category)
    }

    fn require(&self, id: CategoryId) -> EnvelopeResult<Category> {
        self.get(id)?
            .ok_or_else(|| EnvelopeError::category_not_found(id.to_string()))
    }

    fn header_of(&self, budget_id: BudgetId, id: CategoryId) -> EnvelopeResult<Category> {
        let parent = self
            .get(id)?
            .filter(|c| c.budget_id == budget_id)
            .ok_or_else(|| EnvelopeError::category_not_found(id.to_string()))?;
        if !parent.is_header() {
            return Err(EnvelopeError::Validation(format!(
                "'{}' is not a header; categories nest one level deep",
                parent.name
            )));
        }
        Ok(parent)
    }

    fn children(&self, id: CategoryId) -> EnvelopeResult<Vec<Category>> {
        self.storage.categories.filter(|c| c.parent_id == Some(id))
    }

    fn siblings(&self, budget_id: BudgetId, parent_id: Option<CategoryId>) -> EnvelopeResult<Vec<Category>> {
        self.storage
            .categories
            .filter(|c| c.budget_id == budget_id && c.parent_id == parent_id)
    }
}

fn ensure_unique(siblings: &[Category], name: &str, exclude: Option<CategoryId>) -> EnvelopeResult<()> {
    let taken = siblings
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(name) && Some(c.id) != exclude);
    if taken {
        return Err(EnvelopeError::Duplicate {
            entity_type: "Category",
            identifier: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EntityType, Operation};
    use crate::services::test_support::{expense, Fixture};

    #[test]
    fn test_create_child_inherits_kind_and_appends() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);

        let pets = service.create(f.budget.id, "Pets", Some(f.needs), None).unwrap();
        assert_eq!(pets.kind, CategoryKind::Expense);
        assert_eq!(pets.parent_id, Some(f.needs));
        // Groceries, Transportation, Medical, Household come first
        assert_eq!(pets.sort_order, 5);

        let month = MonthKey::current();
        assert!(pets.allocations.contains_key(&month));
        assert!(pets.allocations.contains_key(&month.next()));

        let err = service
            .create(f.budget.id, "pets", Some(f.needs), None)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Duplicate { .. }));
    }

    #[test]
    fn test_create_rejects_nesting_under_child() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);
        let err = service
            .create(f.budget.id, "Organic", Some(f.groceries), None)
            .unwrap_err();
        assert!(err.is_validation());

        let err = service
            .create(f.budget.id, "Bonus", Some(f.needs), Some(CategoryKind::Income))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_find_by_path() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);
        assert_eq!(service.find(f.budget.id, "needs/groceries").unwrap().id, f.groceries);
        assert_eq!(service.find(f.budget.id, "Groceries").unwrap().id, f.groceries);

        let household = service.find(f.budget.id, "Needs/Household").unwrap();
        assert_eq!(household.parent_id, Some(f.needs));
    }

    #[test]
    fn test_update_rules() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);

        // Move a child to another header
        let wants = service.find(f.budget.id, "Wants").unwrap();
        let moved = service
            .update(
                f.groceries,
                CategoryUpdate {
                    parent_id: Some(wants.id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(moved.parent_id, Some(wants.id));

        // Headers with children cannot be nested
        let err = service
            .update(
                f.needs,
                CategoryUpdate {
                    parent_id: Some(wants.id),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());

        // Built-in categories can only be hidden
        let uncategorized = service.system(f.budget.id, SystemCategory::Uncategorized).unwrap();
        let err = service
            .update(
                uncategorized.id,
                CategoryUpdate {
                    name: Some("Misc".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
        let hidden = service
            .update(
                uncategorized.id,
                CategoryUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(hidden.hidden);
    }

    #[test]
    fn test_header_kind_cascades() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);
        service
            .update(
                f.needs,
                CategoryUpdate {
                    kind: Some(CategoryKind::Income),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(f.category(f.groceries).kind, CategoryKind::Income);

        let err = service
            .update(
                f.groceries,
                CategoryUpdate {
                    kind: Some(CategoryKind::Expense),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_reorder_writes_only_changed() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);
        let medical = service.find(f.budget.id, "Medical").unwrap();

        let ordered = service.reorder(f.budget.id, &[medical.id]).unwrap();
        let names: Vec<_> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Medical", "Groceries", "Transportation", "Household"]);

        let stored: Vec<_> = f
            .storage
            .categories
            .filter(|c| c.parent_id == Some(f.needs))
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.sort_order))
            .collect();
        assert_eq!(stored[0], ("Medical".to_string(), 1));
        assert_eq!(stored[3], ("Household".to_string(), 4));

        // Household kept its position and was not rewritten
        let updates: Vec<_> = f
            .storage
            .audit()
            .read_all()
            .unwrap()
            .into_iter()
            .filter(|e| e.operation == Operation::Update && e.entity_type == EntityType::Category)
            .filter_map(|e| e.entity_name)
            .collect();
        assert_eq!(updates.len(), 3);
        assert!(!updates.contains(&"Household".to_string()));

        let err = service.reorder(f.budget.id, &[medical.id, f.needs]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_delete_rules() {
        let f = Fixture::new();
        let service = CategoryService::new(&f.storage);

        assert!(service.delete(f.needs).unwrap_err().is_validation());

        f.post(expense(&f, f.groceries, 100, (2025, 1, 1)));
        assert!(service.delete(f.groceries).unwrap_err().is_validation());

        let starting = service.system(f.budget.id, SystemCategory::StartingBalance).unwrap();
        assert!(service.delete(starting.id).unwrap_err().is_validation());

        service.delete(f.dining).unwrap();
        assert!(service.get(f.dining).unwrap().is_none());
    }

    #[test]
    fn test_tree() {
        let f = Fixture::new();
        let tree = CategoryService::new(&f.storage).tree(f.budget.id, false).unwrap();
        let needs = tree.iter().find(|n| n.category.id == f.needs).unwrap();
        assert_eq!(needs.children.len(), 4);
        assert_eq!(needs.children[0].name, "Groceries");
        assert!(tree.iter().any(|n| n.category.system == Some(SystemCategory::Uncategorized)));
    }
}
