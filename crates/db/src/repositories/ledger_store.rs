//! Durable ledger store on `SeaORM`.
//!
//! Implements [`LedgerStore`] for PostgreSQL and SQLite. Entry writes run on a
//! [`DatabaseTransaction`], which `SeaORM` rolls back when dropped without a
//! commit, so an abandoned posting never leaves rows behind.
//!
//! Every query issued on behalf of an open entry transaction goes through that
//! transaction, never the pool. On a single-connection pool (in-memory SQLite)
//! a pool query would wait on the connection the transaction holds.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tally_core::ledger::{
    Account, AccountFilter, AccountGate, EntryHeader, LedgerStore, NewAccount, NewEntry,
    NormalizedLine, PersistedLine, PostedEntry, StoreError,
};
use tally_shared::types::{AccountId, EntryId, GroupId, PageLimit, UserId};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::convert::{db_err, encode_metadata};
use crate::entities::{accounts, ledger_entries, ledger_lines};

/// [`LedgerStore`] backed by a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct SeaLedgerStore {
    db: DatabaseConnection,
}

impl SeaLedgerStore {
    /// Creates a store over an explicitly constructed connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Fetches an account row on any connection or transaction.
    async fn find_account<C: ConnectionTrait>(
        conn: &C,
        id: AccountId,
    ) -> Result<accounts::Model, StoreError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::AccountNotFound(id))
    }

    /// Attaches lines, in position order, to entry rows.
    async fn with_lines(
        &self,
        entries: Vec<ledger_entries::Model>,
    ) -> Result<Vec<PostedEntry>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        let rows = ledger_lines::Entity::find()
            .filter(ledger_lines::Column::EntryId.is_in(ids))
            .order_by_asc(ledger_lines::Column::EntryId)
            .order_by_asc(ledger_lines::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut lines: HashMap<Uuid, Vec<PersistedLine>> = HashMap::new();
        for row in rows {
            lines
                .entry(row.entry_id)
                .or_default()
                .push(PersistedLine::try_from(row)?);
        }

        entries
            .into_iter()
            .map(|model| -> Result<PostedEntry, StoreError> {
                let lines = lines.remove(&model.id).unwrap_or_default();
                Ok(PostedEntry {
                    entry: EntryHeader::try_from(model)?,
                    lines,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for SeaLedgerStore {
    type Tx = DatabaseTransaction;

    #[instrument(skip(self, account), fields(name = %account.name), err)]
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let now = Utc::now();
        let model = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            name: Set(account.name),
            code: Set(account.code),
            currency: Set(account.currency.to_string()),
            normal_side: Set(account.normal_side.as_str().to_string()),
            is_active: Set(true),
            owner_user_id: Set(account.owner_user_id.map(UserId::into_inner)),
            owner_group_id: Set(account.owner_group_id.map(GroupId::into_inner)),
            metadata: Set(encode_metadata(&account.metadata)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(Account::try_from(model)?)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let model = Self::find_account(&self.db, id).await?;
        Ok(Account::try_from(model)?)
    }

    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError> {
        let mut query = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .order_by_asc(accounts::Column::Name);

        if filter.active_only {
            query = query.filter(accounts::Column::IsActive.eq(true));
        }

        query
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|model| Account::try_from(model).map_err(StoreError::from))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn deactivate_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let model = Self::find_account(&self.db, id).await?;

        let mut active: accounts::ActiveModel = model.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(Account::try_from(model)?)
    }

    async fn begin_entry_transaction(&self) -> Result<DatabaseTransaction, StoreError> {
        self.db.begin().await.map_err(db_err)
    }

    #[instrument(skip(self, tx), err)]
    async fn lock_account(
        &self,
        tx: &mut DatabaseTransaction,
        id: AccountId,
    ) -> Result<Account, StoreError> {
        let query = accounts::Entity::find_by_id(id.into_inner());
        // SQLite has no row locks; its writers are already serialized.
        let query = if tx.get_database_backend() == DatabaseBackend::Sqlite {
            query
        } else {
            query.lock_exclusive()
        };

        let model = query
            .one(&*tx)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::AccountNotFound(id))?;
        Ok(Account::try_from(model)?)
    }

    #[instrument(skip_all, err)]
    async fn insert_entry(
        &self,
        tx: &mut DatabaseTransaction,
        entry: &NewEntry,
    ) -> Result<EntryHeader, StoreError> {
        let (reference_type, reference_id) = entry
            .reference
            .clone()
            .map_or((None, None), |r| (Some(r.kind), Some(r.id)));

        let model = ledger_entries::ActiveModel {
            id: Set(EntryId::new().into_inner()),
            occurred_at: Set(entry.occurred_at),
            description: Set(entry.description.clone()),
            reference_type: Set(reference_type),
            reference_id: Set(reference_id),
            metadata: Set(encode_metadata(&entry.metadata)),
            idempotency_key: Set(entry.idempotency_key.clone()),
            created_at: Set(Utc::now()),
        };

        let model = model.insert(&*tx).await.map_err(db_err)?;
        debug!(entry_id = %model.id, "entry header written");
        Ok(EntryHeader::try_from(model)?)
    }

    #[instrument(skip(self, tx, line), fields(account_id = %line.account_id), err)]
    async fn insert_line(
        &self,
        tx: &mut DatabaseTransaction,
        entry_id: EntryId,
        position: usize,
        line: &NormalizedLine,
        gate: AccountGate,
    ) -> Result<PersistedLine, StoreError> {
        let account = Self::find_account(&*tx, line.account_id).await?;
        if !account.is_active && gate == AccountGate::ActiveOnly {
            return Err(StoreError::AccountInactive(line.account_id));
        }

        let position = i32::try_from(position)
            .map_err(|_| StoreError::Storage(format!("line position {position} out of range")))?;

        let model = ledger_lines::ActiveModel {
            id: Set(Uuid::now_v7()),
            entry_id: Set(entry_id.into_inner()),
            position: Set(position),
            account_id: Set(line.account_id.into_inner()),
            direction: Set(line.direction.as_str().to_string()),
            amount: Set(line.amount.to_decimal_string()),
            currency: Set(line.amount.currency.to_string()),
            metadata: Set(encode_metadata(&line.metadata)),
        };

        let model = model.insert(&*tx).await.map_err(db_err)?;
        Ok(PersistedLine::try_from(model)?)
    }

    async fn commit(&self, tx: DatabaseTransaction) -> Result<(), StoreError> {
        tx.commit().await.map_err(db_err)
    }

    async fn rollback(&self, tx: DatabaseTransaction) -> Result<(), StoreError> {
        tx.rollback().await.map_err(db_err)
    }

    async fn get_entry(&self, id: EntryId) -> Result<PostedEntry, StoreError> {
        let model = ledger_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::EntryNotFound(id))?;

        self.with_lines(vec![model])
            .await?
            .pop()
            .ok_or(StoreError::EntryNotFound(id))
    }

    async fn find_entry_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PostedEntry>, StoreError> {
        let model = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        match model {
            Some(model) => Ok(self.with_lines(vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_entries(&self, limit: PageLimit) -> Result<Vec<PostedEntry>, StoreError> {
        let models = ledger_entries::Entity::find()
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .order_by_desc(ledger_entries::Column::Id)
            .limit(limit.get())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        self.with_lines(models).await
    }

    #[instrument(skip(self), err)]
    async fn lines_for_account(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersistedLine>, StoreError> {
        let mut query = ledger_lines::Entity::find()
            .inner_join(ledger_entries::Entity)
            .filter(ledger_lines::Column::AccountId.eq(account_id.into_inner()))
            .order_by_asc(ledger_entries::Column::OccurredAt)
            .order_by_asc(ledger_lines::Column::EntryId)
            .order_by_asc(ledger_lines::Column::Position);

        if let Some(as_of) = as_of {
            query = query.filter(ledger_entries::Column::OccurredAt.lte(as_of));
        }

        query
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|model| PersistedLine::try_from(model).map_err(StoreError::from))
            .collect()
    }
}
