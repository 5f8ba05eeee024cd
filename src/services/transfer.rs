//! Transfers between accounts
//!
//! A transfer is a pair of linked uncategorized transactions. It moves money
//! between accounts without touching categories or budget totals.

use chrono::{NaiveDate, Utc};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{AccountId, BudgetId, Money, Transaction, TransactionId};
use crate::storage::{Changeset, Storage};

use super::posting::LedgerDelta;
use super::transaction::TransactionService;

/// Service for account-to-account transfers
pub struct TransferService<'a> {
    storage: &'a Storage,
}

impl<'a> TransferService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Move `amount` from one account to another
    ///
    /// Returns the outgoing and incoming legs.
    pub fn create_transfer(
        &self,
        budget_id: BudgetId,
        from: AccountId,
        to: AccountId,
        amount: Money,
        date: NaiveDate,
        memo: &str,
    ) -> EnvelopeResult<(Transaction, Transaction)> {
        check_amount(amount)?;
        if from == to {
            return Err(EnvelopeError::Validation(
                "Cannot transfer to the same account".into(),
            ));
        }

        let mut changeset = Changeset::new();
        let txns = TransactionService::new(self.storage);
        let source = txns.check_account(budget_id, from, &changeset)?;
        let target = txns.check_account(budget_id, to, &changeset)?;

        let mut outgoing = Transaction::transfer_leg(budget_id, from, date, -amount, TransactionId::new());
        let mut incoming = Transaction::transfer_leg(budget_id, to, date, amount, outgoing.id);
        outgoing.transfer_transaction_id = Some(incoming.id);

        outgoing.payee = format!("Transfer to {}", target.name);
        incoming.payee = format!("Transfer from {}", source.name);
        outgoing.memo = memo.trim().to_string();
        incoming.memo = outgoing.memo.clone();

        LedgerDelta::post(&outgoing)
            .merge(LedgerDelta::post(&incoming))
            .stage(self.storage, &mut changeset)?;
        changeset.put(outgoing.clone()).put(incoming.clone());
        self.storage.commit(changeset)?;

        tracing::debug!(from = %from, to = %to, amount = %amount, "created transfer");
        Ok((outgoing, incoming))
    }

    /// Change the amount, date or memo of a transfer
    ///
    /// `id` may be either leg. A positive amount is the amount moved; the
    /// direction of the transfer is kept.
    pub fn update_transfer(
        &self,
        id: TransactionId,
        amount: Option<Money>,
        date: Option<NaiveDate>,
        memo: Option<&str>,
    ) -> EnvelopeResult<(Transaction, Transaction)> {
        let first = self
            .storage
            .transactions
            .get(id)?
            .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))?;
        let other_id = first.transfer_transaction_id.ok_or_else(|| {
            EnvelopeError::Validation(format!("Transaction {} is not a transfer", id))
        })?;
        let second = self.storage.transactions.get(other_id)?.ok_or_else(|| {
            EnvelopeError::Integrity(format!("Transfer {} has lost its counterpart", id))
        })?;

        if let Some(amount) = amount {
            check_amount(amount)?;
        }

        let edit = |old: &Transaction| {
            let mut new = old.clone();
            if let Some(amount) = amount {
                new.amount = if old.amount.is_negative() { -amount } else { amount };
            }
            if let Some(date) = date {
                new.date = date;
            }
            if let Some(memo) = memo {
                new.memo = memo.trim().to_string();
            }
            new.updated_at = Utc::now();
            new
        };
        let (first_new, second_new) = (edit(&first), edit(&second));

        let mut changeset = Changeset::new();
        LedgerDelta::replace(&first, &first_new)
            .merge(LedgerDelta::replace(&second, &second_new))
            .stage(self.storage, &mut changeset)?;
        changeset.put(first_new.clone()).put(second_new.clone());
        self.storage.commit(changeset)?;

        Ok((first_new, second_new))
    }
}

fn check_amount(amount: Money) -> EnvelopeResult<()> {
    if !amount.is_positive() {
        return Err(EnvelopeError::Validation(
            "Transfer amount must be positive".into(),
        ));
    }
    if !amount.within_limit() {
        return Err(EnvelopeError::Validation(format!(
            "Transfer amount {} is too large",
            amount
        )));
    }
    Ok(())
}
