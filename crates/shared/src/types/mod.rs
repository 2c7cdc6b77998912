//! Common types used across the ledger.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{AMOUNT_SCALE, Amount, AmountError, Currency, checked_add_exact, checked_sub_exact};
pub use pagination::PageLimit;
