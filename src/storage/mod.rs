//! Storage layer
//!
//! JSON document files under `data/`, loaded into memory by typed
//! repositories. Writes happen only through [`Storage::commit`], which makes
//! a whole changeset durable through a write-ahead journal before touching
//! any data file, then appends the matching audit entries.

pub mod changeset;
pub mod file_io;
pub mod init;
pub mod journal;
pub mod repository;

pub use changeset::{Changes, Changeset};
pub use file_io::{read_json, write_json_atomic};
pub use init::initialize_storage;
pub use journal::{Journal, JournalEntry};
pub use repository::{Record, Repository};

use std::collections::HashMap;

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::paths::EnvelopePaths;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, Budget, Category, Transaction};

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: EnvelopePaths,
    pub budgets: Repository<Budget>,
    pub accounts: Repository<Account>,
    pub categories: Repository<Category>,
    pub transactions: Repository<Transaction>,
    audit: AuditLogger,
}

/// A repository's new contents, waiting to be installed
struct Staged<T: Record> {
    map: HashMap<T::Id, T>,
    contents: serde_json::Value,
}

impl Storage {
    pub fn new(paths: EnvelopePaths) -> Result<Self, EnvelopeError> {
        paths.ensure_directories()?;

        Ok(Self {
            budgets: Repository::new(paths.budgets_file()),
            accounts: Repository::new(paths.accounts_file()),
            categories: Repository::new(paths.categories_file()),
            transactions: Repository::new(paths.transactions_file()),
            audit: AuditLogger::new(paths.audit_log()),
            paths,
        })
    }

    pub fn paths(&self) -> &EnvelopePaths {
        &self.paths
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Load all data from disk, first finishing any interrupted commit
    pub fn load_all(&self) -> Result<(), EnvelopeError> {
        if Journal::recover(&self.paths)? {
            tracing::info!("recovered interrupted commit");
        }

        self.budgets.load()?;
        self.accounts.load()?;
        self.categories.load()?;
        self.transactions.load()?;
        Ok(())
    }

    /// Initialized once `init` has written the settings file
    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }

    /// Atomically apply a changeset
    ///
    /// 1. stage the new contents of every touched repository in memory;
    /// 2. write them all to the journal (the commit point);
    /// 3. install them in memory and replace each data file;
    /// 4. delete the journal and append audit entries.
    ///
    /// An error before step 2 leaves memory and disk untouched. An error
    /// after it leaves the journal behind for [`Storage::load_all`] to replay.
    pub fn commit(&self, changeset: Changeset) -> EnvelopeResult<()> {
        if changeset.is_empty() {
            return Ok(());
        }

        let mut audit = Vec::new();
        let budgets = self.stage(&self.budgets, &changeset, &mut audit)?;
        let accounts = self.stage(&self.accounts, &changeset, &mut audit)?;
        let categories = self.stage(&self.categories, &changeset, &mut audit)?;
        let transactions = self.stage(&self.transactions, &changeset, &mut audit)?;

        let mut entries = Vec::new();
        journal_entry::<Budget>(&budgets, &mut entries);
        journal_entry::<Account>(&accounts, &mut entries);
        journal_entry::<Category>(&categories, &mut entries);
        journal_entry::<Transaction>(&transactions, &mut entries);

        let journal = Journal::new(entries);
        journal.write(&self.paths)?;

        install(&self.budgets, budgets)?;
        install(&self.accounts, accounts)?;
        install(&self.categories, categories)?;
        install(&self.transactions, transactions)?;

        journal.apply(&self.paths)?;
        Journal::clear(&self.paths)?;

        tracing::debug!(
            files = journal.entries.len(),
            audit_entries = audit.len(),
            "committed changeset"
        );

        // The data is committed at this point; a failing audit append must
        // not make the operation look failed.
        if let Err(e) = self.audit.log_batch(&audit) {
            tracing::warn!(error = %e, "failed to append audit entries");
        }

        Ok(())
    }

    fn stage<T: Record>(
        &self,
        repo: &Repository<T>,
        changeset: &Changeset,
        audit: &mut Vec<AuditEntry>,
    ) -> EnvelopeResult<Option<Staged<T>>> {
        let changes = T::changes(changeset);
        if changes.is_empty() {
            return Ok(None);
        }

        for id in changes.deletes() {
            if let Some(before) = repo.get(*id)? {
                audit.push(AuditEntry::delete(
                    T::ENTITY,
                    id.to_string(),
                    Some(before.label()),
                    &before,
                ));
            }
        }

        for after in changes.upserts() {
            let entry = match repo.get(after.id())? {
                Some(before) => AuditEntry::update(
                    T::ENTITY,
                    after.id().to_string(),
                    Some(after.label()),
                    &before,
                    after,
                ),
                None => AuditEntry::create(
                    T::ENTITY,
                    after.id().to_string(),
                    Some(after.label()),
                    after,
                ),
            };
            if !entry.is_noop() {
                audit.push(entry);
            }
        }

        let map = repo.staged(changes)?;
        let contents = Repository::<T>::document(&map)?;
        Ok(Some(Staged { map, contents }))
    }
}

fn journal_entry<T: Record>(staged: &Option<Staged<T>>, entries: &mut Vec<JournalEntry>) {
    if let Some(staged) = staged {
        entries.push(JournalEntry {
            file: T::FILE.to_string(),
            contents: staged.contents.clone(),
        });
    }
}

fn install<T: Record>(repo: &Repository<T>, staged: Option<Staged<T>>) -> EnvelopeResult<()> {
    match staged {
        Some(staged) => repo.install(staged.map),
        None => Ok(()),
    }
}
