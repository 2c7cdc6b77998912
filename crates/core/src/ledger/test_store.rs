//! In-memory `LedgerStore` for poster tests.
//!
//! Writes are staged on the transaction handle and applied to shared state
//! only on commit. Failures and hangs can be injected at a given line
//! position to exercise every abort path.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, EntryId, LineId, PageLimit};

use super::store::{AccountGate, LedgerStore, StoreError};
use super::types::{
    Account, AccountFilter, EntryHeader, NewAccount, NewEntry, NormalizedLine, PersistedLine,
    PostedEntry,
};

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<PostedEntry>,
}

pub struct FakeStore {
    state: Mutex<State>,
    fail_on_line: Mutex<Option<usize>>,
    block_on_line: Mutex<Option<usize>>,
    fail_commit: AtomicBool,
    hide_keys_once: AtomicBool,
    open: Arc<AtomicUsize>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

pub struct FakeTx {
    staged: Option<PostedEntry>,
    open: Arc<AtomicUsize>,
}

impl Drop for FakeTx {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_on_line: Mutex::new(None),
            block_on_line: Mutex::new(None),
            fail_commit: AtomicBool::new(false),
            hide_keys_once: AtomicBool::new(false),
            open: Arc::new(AtomicUsize::new(0)),
            begins: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    /// Makes `insert_line` fail with a storage error at `position`.
    pub fn fail_on_line(&self, position: usize) {
        *self.fail_on_line.lock().unwrap() = Some(position);
    }

    /// Makes `insert_line` hang forever at `position`.
    pub fn block_on_line(&self, position: usize) {
        *self.block_on_line.lock().unwrap() = Some(position);
    }

    /// Makes `commit` fail.
    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// The next idempotency lookup misses, as if a concurrent post committed
    /// right after it.
    pub fn hide_keys_once(&self) {
        self.hide_keys_once.store(true, Ordering::SeqCst);
    }

    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn line_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.lines.len())
            .sum()
    }

    fn key_taken(&self, key: Option<&str>) -> bool {
        key.is_some_and(|key| {
            self.state
                .lock()
                .unwrap()
                .entries
                .iter()
                .any(|e| e.entry.idempotency_key.as_deref() == Some(key))
        })
    }
}

#[async_trait]
impl LedgerStore for FakeStore {
    type Tx = FakeTx;

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.state.lock().unwrap();
        if account.code.is_some() && state.accounts.values().any(|a| a.code == account.code) {
            return Err(StoreError::Conflict("account code already exists".into()));
        }
        let now = Utc::now();
        let created = Account {
            id: AccountId::new(),
            name: account.name,
            code: account.code,
            currency: account.currency,
            normal_side: account.normal_side,
            is_active: true,
            owner_user_id: account.owner_user_id,
            owner_group_id: account.owner_group_id,
            metadata: account.metadata,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(id))
    }

    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut accounts: Vec<_> = state
            .accounts
            .values()
            .filter(|a| !filter.active_only || a.is_active)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| (&a.code, &a.name).cmp(&(&b.code, &b.name)));
        Ok(accounts)
    }

    async fn deactivate_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        account.is_active = false;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn begin_entry_transaction(&self) -> Result<FakeTx, StoreError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(FakeTx {
            staged: None,
            open: Arc::clone(&self.open),
        })
    }

    async fn lock_account(&self, _tx: &mut FakeTx, id: AccountId) -> Result<Account, StoreError> {
        self.get_account(id).await
    }

    async fn insert_entry(
        &self,
        tx: &mut FakeTx,
        entry: &NewEntry,
    ) -> Result<EntryHeader, StoreError> {
        if self.key_taken(entry.idempotency_key.as_deref()) {
            return Err(StoreError::Conflict("idempotency key already used".into()));
        }
        let header = EntryHeader {
            id: EntryId::new(),
            occurred_at: entry.occurred_at,
            description: entry.description.clone(),
            reference: entry.reference.clone(),
            metadata: entry.metadata.clone(),
            idempotency_key: entry.idempotency_key.clone(),
            created_at: Utc::now(),
        };
        tx.staged = Some(PostedEntry {
            entry: header.clone(),
            lines: Vec::new(),
        });
        Ok(header)
    }

    async fn insert_line(
        &self,
        tx: &mut FakeTx,
        entry_id: EntryId,
        position: usize,
        line: &NormalizedLine,
        gate: AccountGate,
    ) -> Result<PersistedLine, StoreError> {
        let block = *self.block_on_line.lock().unwrap();
        if block == Some(position) {
            std::future::pending::<()>().await;
        }
        if *self.fail_on_line.lock().unwrap() == Some(position) {
            return Err(StoreError::Storage("connection reset".into()));
        }

        let account = self.get_account(line.account_id).await?;
        if !account.is_active && gate == AccountGate::ActiveOnly {
            return Err(StoreError::AccountInactive(account.id));
        }

        let persisted = PersistedLine {
            id: LineId::new(),
            entry_id,
            position,
            account_id: line.account_id,
            direction: line.direction,
            amount: line.amount.clone(),
            metadata: line.metadata.clone(),
        };
        tx.staged
            .as_mut()
            .ok_or_else(|| StoreError::Storage("no entry in transaction".into()))?
            .lines
            .push(persisted.clone());
        Ok(persisted)
    }

    async fn commit(&self, mut tx: FakeTx) -> Result<(), StoreError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("commit lost".into()));
        }
        if let Some(entry) = tx.staged.take() {
            self.state.lock().unwrap().entries.push(entry);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: FakeTx) -> Result<(), StoreError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_entry(&self, id: EntryId) -> Result<PostedEntry, StoreError> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.entry.id == id)
            .cloned()
            .ok_or(StoreError::EntryNotFound(id))
    }

    async fn find_entry_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PostedEntry>, StoreError> {
        if self.hide_keys_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.entry.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn list_entries(&self, limit: PageLimit) -> Result<Vec<PostedEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        let take = usize::try_from(limit.get()).unwrap_or(usize::MAX);
        Ok(state.entries.iter().rev().take(take).cloned().collect())
    }

    async fn lines_for_account(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersistedLine>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| as_of.is_none_or(|as_of| e.entry.occurred_at <= as_of))
            .flat_map(|e| e.lines.iter())
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }
}
