//! Storage seam for the ledger.
//!
//! `tally-core` never talks to a database directly. The Atomic Poster and the
//! Balance Projector are generic over [`LedgerStore`], which `tally-db`
//! implements on top of SeaORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, EntryId, PageLimit};
use thiserror::Error;

use super::types::{
    Account, AccountFilter, EntryHeader, NewAccount, NewEntry, NormalizedLine, PersistedLine,
    PostedEntry,
};

/// Errors raised at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account exists but is deactivated.
    #[error("account is inactive: {0}")]
    AccountInactive(AccountId),

    /// Entry does not exist (or is not committed).
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),

    /// A unique constraint collided (account code, idempotency key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O, connection or driver failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Which accounts [`LedgerStore::insert_line`] accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountGate {
    /// Active accounts only. New postings use this.
    #[default]
    ActiveOnly,
    /// Inactive accounts too. Reversals use this so a deactivated account
    /// can still be corrected.
    AllowInactive,
}

/// Durable, transactional storage of accounts, entries and lines.
///
/// Writes for one entry go through a transaction handle obtained from
/// [`LedgerStore::begin_entry_transaction`] and threaded explicitly through
/// every insert. Implementations must guarantee that a handle dropped without
/// [`LedgerStore::commit`] leaves none of its writes visible.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Scoped write context. Rolls back on drop.
    type Tx: Send;

    /// Creates an account. Fails with `Conflict` if the code is taken.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Fetches one account.
    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Lists accounts ordered by code, then name.
    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError>;

    /// Marks an account inactive. History is kept; new lines are rejected.
    async fn deactivate_account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Opens the write context for one entry.
    async fn begin_entry_transaction(&self) -> Result<Self::Tx, StoreError>;

    /// Serializes writers on one account until the transaction ends.
    ///
    /// The poster does not call this; it exists for layers that enforce
    /// per-account constraints such as overdraft limits.
    async fn lock_account(&self, tx: &mut Self::Tx, id: AccountId) -> Result<Account, StoreError>;

    /// Writes an entry header.
    async fn insert_entry(
        &self,
        tx: &mut Self::Tx,
        entry: &NewEntry,
    ) -> Result<EntryHeader, StoreError>;

    /// Writes one line. Fails with `AccountNotFound` when the account does
    /// not exist, and with `AccountInactive` when it is deactivated and
    /// `gate` is [`AccountGate::ActiveOnly`].
    async fn insert_line(
        &self,
        tx: &mut Self::Tx,
        entry_id: EntryId,
        position: usize,
        line: &NormalizedLine,
        gate: AccountGate,
    ) -> Result<PersistedLine, StoreError>;

    /// Makes every write of the transaction visible at once.
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    /// Discards every write of the transaction.
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;

    /// Fetches a committed entry with its lines in insertion order.
    async fn get_entry(&self, id: EntryId) -> Result<PostedEntry, StoreError>;

    /// Fetches the committed entry carrying `key`, if any.
    async fn find_entry_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PostedEntry>, StoreError>;

    /// Lists entries newest first.
    async fn list_entries(&self, limit: PageLimit) -> Result<Vec<PostedEntry>, StoreError>;

    /// Returns every committed line on an account whose entry occurred at or
    /// before `as_of`.
    async fn lines_for_account(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersistedLine>, StoreError>;
}
