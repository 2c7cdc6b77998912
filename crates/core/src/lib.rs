//! Core business logic for Tally.
//!
//! This crate contains the double-entry posting engine with ZERO web or
//! database dependencies. Storage is reached only through the
//! [`ledger::LedgerStore`] trait, which the db crate implements.
//!
//! # Modules
//!
//! - `ledger` - Line normalization, balance checking, atomic posting and balance projection

pub mod ledger;
