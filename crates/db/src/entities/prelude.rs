//! `SeaORM` entity prelude.

pub use super::accounts::Entity as Accounts;
pub use super::ledger_entries::Entity as LedgerEntries;
pub use super::ledger_lines::Entity as LedgerLines;
