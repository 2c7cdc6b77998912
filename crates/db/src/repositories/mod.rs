//! Repository abstractions for data access.
//!
//! The ledger store hides the `SeaORM` implementation details behind the
//! `LedgerStore` trait defined in `tally-core`.

mod convert;
pub mod ledger_store;

pub use convert::{DecodeError, db_err};
pub use ledger_store::SeaLedgerStore;
