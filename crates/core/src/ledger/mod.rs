//! Double-entry ledger posting.
//!
//! This module implements the posting pipeline:
//! - Domain types for accounts, entries and lines
//! - Line normalization (raw input to canonical lines)
//! - Balance invariant checking per currency
//! - The `LedgerStore` seam for durable storage
//! - Atomic posting with guaranteed rollback
//! - Compensating (reversal) entries
//! - Balance projection from the immutable line set
//! - The `LedgerService` facade used by outer layers

pub mod balance;
pub mod error;
pub mod normalize;
pub mod poster;
pub mod reversal;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_store;
#[cfg(test)]
mod validation_props;

pub use balance::{AccountBalance, BalanceProjector, CurrencyBalance};
pub use error::{ErrorKind, ErrorPayload, LedgerError, ValidationError};
pub use normalize::{normalize_line, normalize_lines};
pub use poster::{AtomicPoster, PostingPhase, ValidatedEntry};
pub use reversal::{build_reversal, reversal_key};
pub use service::LedgerService;
pub use store::{AccountGate, LedgerStore, StoreError};
pub use types::{
    Account, AccountFilter, Direction, EntryHeader, NewAccount, NewEntry, NormalSide,
    NormalizedLine, PersistedLine, PostEntry, PostedEntry, RawAmount, RawLine, Reference,
};
pub use validation::{CurrencyTotals, check_balance, compute_totals, require_min_lines};
