//! `SeaORM` entity definitions.

pub mod prelude;

pub mod accounts;
pub mod ledger_entries;
pub mod ledger_lines;
