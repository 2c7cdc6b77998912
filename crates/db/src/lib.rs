//! Database layer with `SeaORM` entities and the durable ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - `SeaLedgerStore`, the `LedgerStore` implementation
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::SeaLedgerStore;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tally_shared::DatabaseConfig;
use tracing::info;

/// Establishes a connection pool to the database.
///
/// In-memory SQLite databases live inside a single connection, so their pool
/// is pinned to exactly one.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());

    if is_in_memory_sqlite(&config.url) {
        options.max_connections(1).min_connections(1);
    } else {
        options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections);
    }
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!(backend = ?db.get_database_backend(), "connected to database");
    Ok(db)
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}
