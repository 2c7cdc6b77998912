//! Ledger schema: accounts, entries and lines.
//!
//! The DDL is kept to the subset shared by PostgreSQL and SQLite so the same
//! migration runs in production and in tests. Amounts and metadata are TEXT:
//! amounts hold exact decimal strings, metadata holds a JSON object.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(ENTRIES_SQL).await?;
        db.execute_unprepared(LINES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS ledger_lines;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS ledger_entries;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS accounts;")
            .await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
-- Accounts are never deleted, only deactivated
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT UNIQUE,
    currency TEXT NOT NULL,
    normal_side TEXT NOT NULL DEFAULT 'debit',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    owner_user_id UUID,
    owner_group_id UUID,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT chk_accounts_normal_side CHECK (normal_side IN ('debit', 'credit'))
);

CREATE INDEX idx_accounts_active ON accounts(is_active);
";

const ENTRIES_SQL: &str = r"
-- Entries are immutable once committed
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    occurred_at TIMESTAMPTZ NOT NULL,
    description TEXT,
    reference_type TEXT,
    reference_id TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    idempotency_key TEXT UNIQUE,
    created_at TIMESTAMPTZ NOT NULL
);

-- Newest-first listing
CREATE INDEX idx_ledger_entries_created ON ledger_entries(created_at DESC, id DESC);

CREATE INDEX idx_ledger_entries_reference ON ledger_entries(reference_type, reference_id);
";

const LINES_SQL: &str = r"
CREATE TABLE ledger_lines (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES ledger_entries(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    direction TEXT NOT NULL,
    amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    CONSTRAINT uq_ledger_lines_position UNIQUE (entry_id, position),
    CONSTRAINT chk_ledger_lines_direction CHECK (direction IN ('debit', 'credit'))
);

-- Balance projection reads all lines of one account
CREATE INDEX idx_ledger_lines_account ON ledger_lines(account_id);
";
