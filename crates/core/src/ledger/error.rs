//! Ledger error types.
//!
//! Every failure path returns one of these. Validation errors are raised
//! before any storage interaction; storage errors raised during posting are
//! only surfaced after the transaction has been rolled back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tally_shared::types::{AccountId, AmountError, Currency, EntryId};
use thiserror::Error;

use super::store::StoreError;
use super::validation::CurrencyTotals;

/// Malformed or unbalanced input. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required line field is absent or blank.
    #[error("line {line}: {field} is required")]
    MissingField {
        /// Zero-based line index.
        line: usize,
        /// Field name.
        field: &'static str,
    },

    /// The account id is not a valid identifier.
    #[error("line {line}: invalid account id '{value}'")]
    InvalidAccountId {
        /// Zero-based line index.
        line: usize,
        /// The rejected value.
        value: String,
    },

    /// The direction is neither debit nor credit.
    #[error("line {line}: invalid direction '{value}'")]
    InvalidDirection {
        /// Zero-based line index.
        line: usize,
        /// The rejected value.
        value: String,
    },

    /// The amount is not a finite decimal within the ledger scale.
    #[error("line {line}: invalid amount: {reason}")]
    InvalidAmount {
        /// Zero-based line index.
        line: usize,
        /// Why parsing failed.
        reason: AmountError,
    },

    /// The amount is zero or negative.
    #[error("line {line}: amount must be positive")]
    NonPositiveAmount {
        /// Zero-based line index.
        line: usize,
        /// The rejected value.
        value: Decimal,
    },

    /// Line metadata is present but not an object.
    #[error("line {line}: metadata must be an object")]
    InvalidLineMetadata {
        /// Zero-based line index.
        line: usize,
    },

    /// Entry metadata is present but not an object.
    #[error("entry metadata must be an object")]
    InvalidEntryMetadata,

    /// Reference type or id is blank.
    #[error("reference type and id must not be empty")]
    InvalidReference,

    /// Idempotency key is blank.
    #[error("idempotency key must not be empty")]
    InvalidIdempotencyKey,

    /// Fewer than two lines.
    #[error("entry requires at least two lines")]
    InsufficientLines {
        /// Number of lines supplied.
        count: usize,
    },

    /// Lines span several currencies under the single-currency policy.
    #[error("entry lines must share one currency")]
    MixedCurrencies {
        /// Currencies present in the entry.
        currencies: Vec<Currency>,
    },

    /// Debits and credits differ for at least one currency.
    #[error("debits and credits must balance")]
    Unbalanced {
        /// Computed totals for every currency in the entry.
        totals: BTreeMap<Currency, CurrencyTotals>,
    },

    /// A per-currency total left the representable range.
    #[error("amount overflow in {currency} totals")]
    TotalsOverflow {
        /// Currency whose total overflowed.
        currency: Currency,
    },
}

impl ValidationError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidAccountId { .. } => "INVALID_ACCOUNT_ID",
            Self::InvalidDirection { .. } => "INVALID_DIRECTION",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::NonPositiveAmount { .. } => "NON_POSITIVE_AMOUNT",
            Self::InvalidLineMetadata { .. } | Self::InvalidEntryMetadata => "INVALID_METADATA",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::InsufficientLines { .. } => "INSUFFICIENT_LINES",
            Self::MixedCurrencies { .. } => "MIXED_CURRENCIES",
            Self::Unbalanced { .. } => "UNBALANCED_ENTRY",
            Self::TotalsOverflow { .. } => "TOTALS_OVERFLOW",
        }
    }

    /// Returns the zero-based line index the error refers to, if any.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::MissingField { line, .. }
            | Self::InvalidAccountId { line, .. }
            | Self::InvalidDirection { line, .. }
            | Self::InvalidAmount { line, .. }
            | Self::NonPositiveAmount { line, .. }
            | Self::InvalidLineMetadata { line } => Some(*line),
            _ => None,
        }
    }

    /// Structured detail for the error payload.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::MissingField { line, field } => Some(json!({ "line": line, "field": field })),
            Self::InvalidAccountId { line, value } | Self::InvalidDirection { line, value } => {
                Some(json!({ "line": line, "value": value }))
            }
            Self::InvalidAmount { line, reason } => {
                Some(json!({ "line": line, "reason": reason.to_string() }))
            }
            Self::NonPositiveAmount { line, value } => {
                Some(json!({ "line": line, "value": value.to_string() }))
            }
            Self::InvalidLineMetadata { line } => Some(json!({ "line": line })),
            Self::InsufficientLines { count } => Some(json!({ "count": count })),
            Self::MixedCurrencies { currencies } => Some(json!({ "currencies": currencies })),
            Self::Unbalanced { totals } => Some(json!({ "totals_by_currency": totals })),
            Self::TotalsOverflow { currency } => Some(json!({ "currency": currency })),
            Self::InvalidEntryMetadata | Self::InvalidReference | Self::InvalidIdempotencyKey => {
                None
            }
        }
    }
}

/// Broad error category, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unbalanced input.
    Validation,
    /// A referenced account or entry does not exist.
    NotFound,
    /// A unique constraint collided.
    Conflict,
    /// Storage failed outside of posting.
    Storage,
    /// Storage failed during posting; the transaction was rolled back.
    PostingFailed,
}

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Input failed validation; nothing was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Account is inactive and cannot receive lines.
    #[error("Account {account_id} is inactive")]
    AccountInactive {
        /// The account.
        account_id: AccountId,
        /// Line that referenced it, when raised during posting.
        line: Option<usize>,
    },

    // ========== Lookup Errors ==========
    /// Account not found.
    #[error("Account not found: {account_id}")]
    AccountNotFound {
        /// The account.
        account_id: AccountId,
        /// Line that referenced it, when raised during posting.
        line: Option<usize>,
    },

    /// Entry not found.
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    // ========== Constraint Errors ==========
    /// Unique constraint collision.
    #[error("Conflict: {0}")]
    Conflict(String),

    // ========== Storage Errors ==========
    /// Storage failure on a read or account operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage failure while posting. The transaction was rolled back.
    #[error("Posting failed and was rolled back: {0}")]
    PostingFailed(#[source] StoreError),
}

impl LedgerError {
    /// Returns the broad error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::AccountInactive { .. } => ErrorKind::Validation,
            Self::AccountNotFound { .. } | Self::EntryNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::PostingFailed(_) => ErrorKind::PostingFailed,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::PostingFailed(_) => "POSTING_FAILED",
        }
    }

    /// Returns the HTTP status code an outer HTTP layer should use.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage | ErrorKind::PostingFailed => 500,
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    ///
    /// Only storage failures qualify; no partial state survives them.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage | ErrorKind::PostingFailed)
    }

    /// Builds the structured payload returned to callers.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        let details = match self {
            Self::Validation(err) => err.details(),
            Self::AccountInactive { account_id, line } | Self::AccountNotFound { account_id, line } => {
                Some(json!({ "account_id": account_id, "line": line }))
            }
            Self::EntryNotFound(entry_id) => Some(json!({ "entry_id": entry_id })),
            Self::Conflict(_) | Self::Storage(_) | Self::PostingFailed(_) => None,
        };

        ErrorPayload {
            kind: self.kind(),
            code: self.error_code(),
            message: match self {
                Self::Validation(err) => err.to_string(),
                other => other.to_string(),
            },
            details,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(account_id) => Self::AccountNotFound {
                account_id,
                line: None,
            },
            StoreError::AccountInactive(account_id) => Self::AccountInactive {
                account_id,
                line: None,
            },
            StoreError::EntryNotFound(entry_id) => Self::EntryNotFound(entry_id),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Storage(message) => Self::Storage(message),
        }
    }
}

/// Machine- and human-readable failure result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    /// Broad category.
    pub kind: ErrorKind,
    /// Specific code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Structured detail (line index, totals, account id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
