//! Shared types and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - `Amount` and `Currency` with fixed decimal precision
//! - Typed IDs for type-safe entity references
//! - Page size clamping for list operations
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, CurrencyPolicy, DatabaseConfig, LedgerConfig};
pub use types::{AccountId, Amount, AmountError, Currency, EntryId, LineId, PageLimit};
