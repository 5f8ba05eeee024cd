//! Service layer
//!
//! Business operations on top of the storage layer. Services validate input,
//! build a [`Changeset`](crate::storage::Changeset) and commit it; they never
//! write files directly.

pub mod account;
pub mod budget;
pub mod category;
pub mod import;
pub mod integrity;
pub mod posting;
pub mod transaction;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::{AccountService, AccountSummary, ReconcileOutcome};
pub use budget::{BudgetOverview, BudgetService, OverviewRow};
pub use category::{CategoryNode, CategoryService, CategoryUpdate};
pub use import::{ColumnMapping, ImportOutcome, ImportRow, ImportService, ParsedRow, RowStatus};
pub use integrity::{Discrepancy, IntegrityReport, IntegrityService};
pub use posting::{LedgerDelta, LedgerDocuments};
pub use transaction::{NewTransaction, TransactionFilter, TransactionService, TransactionUpdate};
pub use transfer::TransferService;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Pick the single candidate a user-supplied identifier refers to
///
/// An exact (case-insensitive) name match wins; otherwise the identifier is
/// tried as an id prefix. More than one hit is an error rather than a guess.
pub(crate) fn pick_one<T>(
    candidates: Vec<T>,
    identifier: &str,
    entity_type: &'static str,
    name: impl Fn(&T) -> &str,
    id_matches: impl Fn(&T, &str) -> bool,
) -> EnvelopeResult<T> {
    let wanted = identifier.trim().to_lowercase();

    let (mut by_name, rest): (Vec<T>, Vec<T>) = candidates
        .into_iter()
        .partition(|c| name(c).to_lowercase() == wanted);

    let mut hits = if by_name.is_empty() {
        rest.into_iter()
            .filter(|c| id_matches(c, identifier))
            .collect()
    } else {
        std::mem::take(&mut by_name)
    };

    match hits.len() {
        0 => Err(EnvelopeError::NotFound {
            entity_type,
            identifier: identifier.to_string(),
        }),
        1 => Ok(hits.remove(0)),
        n => Err(EnvelopeError::Validation(format!(
            "'{}' matches {} {}s; use an id instead",
            identifier,
            n,
            entity_type.to_lowercase()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(items: &[(&'static str, &'static str)], ident: &str) -> EnvelopeResult<&'static str> {
        pick_one(
            items.to_vec(),
            ident,
            "Thing",
            |t| t.0,
            |t, s| t.1.starts_with(s),
        )
        .map(|t| t.0)
    }

    #[test]
    fn test_name_beats_id() {
        let items = [("abcd", "1234"), ("Rent", "abcd9")];
        assert_eq!(pick(&items, "ABCD").unwrap(), "abcd");
        assert_eq!(pick(&items, "1234").unwrap(), "abcd");
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let items = [("Fun", "aaaa1"), ("Fun", "aaaa2")];
        assert!(pick(&items, "fun").unwrap_err().is_validation());
        assert!(pick(&items, "zzzz").unwrap_err().is_not_found());
        assert!(pick(&items, "aaaa").unwrap_err().is_validation());
        assert_eq!(pick(&items, "aaaa2").unwrap(), "Fun");
    }
}
