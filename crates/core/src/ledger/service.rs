//! Ledger service facade.
//!
//! The single entry point outer layers (HTTP handlers, jobs, the seeder) call
//! into. It owns an explicitly constructed store handle and wires the Atomic
//! Poster and Balance Projector to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_shared::LedgerConfig;
use tally_shared::types::{AccountId, EntryId, PageLimit};
use tracing::{info, instrument};

use super::balance::{AccountBalance, BalanceProjector};
use super::error::LedgerError;
use super::poster::AtomicPoster;
use super::store::LedgerStore;
use super::types::{Account, AccountFilter, NewAccount, PostEntry, PostedEntry};

/// Ledger operations over one store.
pub struct LedgerService<S> {
    store: Arc<S>,
    poster: AtomicPoster<S>,
    projector: BalanceProjector<S>,
    default_page_size: u64,
    max_page_size: u64,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            poster: self.poster.clone(),
            projector: self.projector.clone(),
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a service over `store` configured by `config`.
    #[must_use]
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            poster: AtomicPoster::new(Arc::clone(&store), config.currency_policy),
            projector: BalanceProjector::new(Arc::clone(&store)),
            store,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the poster.
    #[must_use]
    pub const fn poster(&self) -> &AtomicPoster<S> {
        &self.poster
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the code is already taken.
    #[instrument(skip(self, account), fields(name = %account.name))]
    pub async fn create_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        let account = self.store.create_account(account).await?;
        info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Fetches an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        Ok(self.store.get_account(id).await?)
    }

    /// Lists accounts.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on read failure.
    pub async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(filter).await?)
    }

    /// Deactivates an account. Its lines and balance remain readable.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist.
    #[instrument(skip(self), fields(account_id = %id))]
    pub async fn deactivate_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let account = self.store.deactivate_account(id).await?;
        info!("account deactivated");
        Ok(account)
    }

    /// Validates and atomically posts an entry.
    ///
    /// # Errors
    ///
    /// See [`AtomicPoster::post`].
    pub async fn post_entry(&self, request: &PostEntry) -> Result<PostedEntry, LedgerError> {
        self.poster.post(request).await
    }

    /// Posts the compensating entry for `entry_id`.
    ///
    /// # Errors
    ///
    /// See [`AtomicPoster::reverse`].
    pub async fn reverse_entry(
        &self,
        entry_id: EntryId,
        description: Option<String>,
    ) -> Result<PostedEntry, LedgerError> {
        self.poster.reverse(entry_id, description).await
    }

    /// Fetches a committed entry with its lines.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if it does not exist.
    pub async fn get_entry(&self, id: EntryId) -> Result<PostedEntry, LedgerError> {
        Ok(self.store.get_entry(id).await?)
    }

    /// Lists entries newest first. The limit is clamped to the configured
    /// page size bounds.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on read failure.
    pub async fn list_entries(&self, limit: Option<u64>) -> Result<Vec<PostedEntry>, LedgerError> {
        let limit = PageLimit::clamp(limit, self.default_page_size, self.max_page_size);
        Ok(self.store.list_entries(limit).await?)
    }

    /// Computes an account balance, optionally as of an occurrence time.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn compute_balance(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<AccountBalance, LedgerError> {
        self.projector.compute_balance(account_id, as_of).await
    }
}
