//! Database seeder for Tally development and testing.
//!
//! Applies pending migrations, creates a small chart of accounts and posts
//! an opening entry. Safe to run repeatedly: existing account codes are
//! reused and the opening entry is keyed for idempotent replay.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use tally_core::ledger::{
    Account, AccountFilter, LedgerService, NewAccount, NormalSide, PostEntry, RawLine, Reference,
};
use tally_db::{SeaLedgerStore, connect, migration::Migrator};
use tally_shared::AppConfig;
use tally_shared::types::Currency;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Demo chart of accounts: code, name, normal side.
const ACCOUNTS: &[(&str, &str, NormalSide)] = &[
    ("1000", "Cash", NormalSide::Debit),
    ("1100", "Accounts Receivable", NormalSide::Debit),
    ("2000", "Accounts Payable", NormalSide::Credit),
    ("3000", "Owner Equity", NormalSide::Credit),
    ("4000", "Sales Revenue", NormalSide::Credit),
];

const OPENING_KEY: &str = "seed:opening-balance";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,seeder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect(&config.database).await?;
    Migrator::up(&db, None).await?;
    info!("migrations applied");

    let service = LedgerService::new(Arc::new(SeaLedgerStore::new(db)), &config.ledger);
    let currency = Currency::new("USD")?;

    let accounts = seed_accounts(&service, &currency).await?;
    let cash = find(&accounts, "1000")?;
    let equity = find(&accounts, "3000")?;

    let opening = PostEntry::new(
        "Opening balance",
        vec![
            RawLine::debit(cash.id, "10000.00", currency.as_str()),
            RawLine::credit(equity.id, "10000.00", currency.as_str()),
        ],
    )
    .with_reference(Reference::new("seed", "opening"))
    .with_idempotency_key(OPENING_KEY);

    let posted = service.post_entry(&opening).await?;
    info!(entry_id = %posted.entry.id, "opening entry posted");

    for account in &accounts {
        let balance = service.compute_balance(account.id, None).await?;
        info!(
            code = account.code.as_deref().unwrap_or_default(),
            name = %account.name,
            balance = %balance.primary(),
            "account balance"
        );
    }

    info!("seeding complete");
    Ok(())
}

async fn seed_accounts(
    service: &LedgerService<SeaLedgerStore>,
    currency: &Currency,
) -> anyhow::Result<Vec<Account>> {
    let existing = service.list_accounts(AccountFilter::default()).await?;
    let mut accounts = Vec::with_capacity(ACCOUNTS.len());

    for &(code, name, normal_side) in ACCOUNTS {
        if let Some(account) = existing.iter().find(|a| a.code.as_deref() == Some(code)) {
            accounts.push(account.clone());
            continue;
        }

        let account = service
            .create_account(NewAccount {
                metadata: json!({ "seeded": true }),
                ..NewAccount::new(name, currency.clone())
                    .with_code(code)
                    .with_normal_side(normal_side)
            })
            .await?;
        info!(code, name, "account created");
        accounts.push(account);
    }

    Ok(accounts)
}

fn find<'a>(accounts: &'a [Account], code: &str) -> anyhow::Result<&'a Account> {
    accounts
        .iter()
        .find(|a| a.code.as_deref() == Some(code))
        .with_context(|| format!("seed account {code} missing"))
}
