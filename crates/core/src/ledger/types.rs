//! Ledger domain types.
//!
//! Raw input types mirror the inbound `PostEntry` shape with every field
//! optional, so missing data is reported by the normalizer instead of failing
//! deserialization. Normalized and persisted types are fully typed.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_shared::types::{
    AccountId, Amount, Currency, EntryId, GroupId, LineId, UserId, checked_sub_exact,
};

/// Side of a ledger line.
///
/// In double-entry bookkeeping:
/// - Debits increase asset/expense accounts, decrease liability/equity/revenue accounts
/// - Credits decrease asset/expense accounts, increase liability/equity/revenue accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Debit line.
    Debit,
    /// Credit line.
    Credit,
}

impl Direction {
    /// Parses a direction case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }

    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Returns the lowercase wire/storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown direction: {s}"))
    }
}

/// The side on which an account's balance grows.
///
/// - Asset/Expense: debit-normal
/// - Liability/Equity/Revenue: credit-normal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalSide {
    /// Balance increases with debits.
    #[default]
    Debit,
    /// Balance increases with credits.
    Credit,
}

impl NormalSide {
    /// Derives the normal side from a conventional account type name.
    ///
    /// Unknown names default to debit-normal.
    #[must_use]
    pub fn from_account_type(account_type: &str) -> Self {
        match account_type.to_lowercase().as_str() {
            "liability" | "equity" | "revenue" | "income" => Self::Credit,
            _ => Self::Debit,
        }
    }

    /// Calculates the signed balance change for debit and credit totals.
    ///
    /// Returns `None` if the difference cannot be represented exactly.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Option<Decimal> {
        match self {
            Self::Debit => checked_sub_exact(debit, credit),
            Self::Credit => checked_sub_exact(credit, debit),
        }
    }

    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl FromStr for NormalSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown normal side: {s}")),
        }
    }
}

/// Pointer from an entry to the business event that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Event type, e.g. "order", "payout", "adjustment".
    #[serde(rename = "type")]
    pub kind: String,
    /// Identifier of the event within its type.
    pub id: String,
}

impl Reference {
    /// Creates a reference.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// An amount as it arrives on the wire: a decimal string or a JSON number.
///
/// JSON numbers keep their source digits (serde_json `arbitrary_precision`),
/// so `0.30000000000000001` is never collapsed to the nearest `f64`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    /// Decimal string, the preferred form.
    Text(String),
    /// JSON number, re-read from its textual form.
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Number(number) => Ok(Self::Number(number)),
            other => Err(serde::de::Error::custom(format!(
                "amount must be a decimal string or number, got {other}"
            ))),
        }
    }
}

impl RawAmount {
    /// Returns the textual form to be parsed as a decimal.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A proposed line before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    /// Account to post to.
    #[serde(default)]
    pub account_id: Option<String>,
    /// "debit" or "credit", any case.
    #[serde(default)]
    pub direction: Option<String>,
    /// Strictly positive amount.
    #[serde(default)]
    pub amount: Option<RawAmount>,
    /// Currency token.
    #[serde(default)]
    pub currency: Option<String>,
    /// Opaque metadata object.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RawLine {
    /// Builds a fully populated raw line.
    #[must_use]
    pub fn new(account_id: AccountId, direction: Direction, amount: &str, currency: &str) -> Self {
        Self {
            account_id: Some(account_id.to_string()),
            direction: Some(direction.as_str().to_string()),
            amount: Some(RawAmount::from(amount)),
            currency: Some(currency.to_string()),
            metadata: None,
        }
    }

    /// Builds a debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: &str, currency: &str) -> Self {
        Self::new(account_id, Direction::Debit, amount, currency)
    }

    /// Builds a credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: &str, currency: &str) -> Self {
        Self::new(account_id, Direction::Credit, amount, currency)
    }

    /// Attaches metadata to the line.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Inbound request to post one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Business event this entry records.
    #[serde(default)]
    pub reference: Option<Reference>,
    /// Opaque metadata object.
    #[serde(default)]
    pub metadata: Option<Value>,
    /// When the event happened; defaults to the posting time.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Caller-supplied dedupe key; replays return the original entry.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Proposed lines (at least two).
    #[serde(default)]
    pub lines: Vec<RawLine>,
}

impl PostEntry {
    /// Creates a request with a description and lines.
    #[must_use]
    pub fn new(description: impl Into<String>, lines: Vec<RawLine>) -> Self {
        Self {
            description: Some(description.into()),
            lines,
            ..Self::default()
        }
    }

    /// Sets the business reference.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the dedupe key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the occurrence time.
    #[must_use]
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }
}

/// A validated, canonical line ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedLine {
    /// Account to post to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub direction: Direction,
    /// Strictly positive amount with its currency.
    pub amount: Amount,
    /// Metadata object (empty when not supplied).
    pub metadata: Value,
}

/// Entry header as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
    /// Free-text description.
    pub description: Option<String>,
    /// Business event reference.
    pub reference: Option<Reference>,
    /// Metadata object.
    pub metadata: Value,
    /// Dedupe key.
    pub idempotency_key: Option<String>,
}

/// A committed entry header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Generated identifier.
    pub id: EntryId,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
    /// Free-text description.
    pub description: Option<String>,
    /// Business event reference.
    pub reference: Option<Reference>,
    /// Metadata object.
    pub metadata: Value,
    /// Dedupe key.
    pub idempotency_key: Option<String>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// A committed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLine {
    /// Generated identifier.
    pub id: LineId,
    /// Owning entry.
    pub entry_id: EntryId,
    /// Zero-based insertion order within the entry.
    pub position: usize,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub direction: Direction,
    /// Amount with its currency.
    pub amount: Amount,
    /// Metadata object.
    pub metadata: Value,
}

/// A committed entry together with its lines, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedEntry {
    /// Entry header.
    pub entry: EntryHeader,
    /// Lines ordered by position.
    pub lines: Vec<PersistedLine>,
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Optional unique code, e.g. "1000".
    pub code: Option<String>,
    /// Display denomination; lines are not restricted to it.
    pub currency: Currency,
    /// Side on which the balance grows.
    pub normal_side: NormalSide,
    /// Inactive accounts reject new lines but keep their history.
    pub is_active: bool,
    /// Owning user, if any.
    pub owner_user_id: Option<UserId>,
    /// Owning group, if any.
    pub owner_group_id: Option<GroupId>,
    /// Metadata object.
    pub metadata: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Optional unique code.
    pub code: Option<String>,
    /// Display denomination.
    pub currency: Currency,
    /// Side on which the balance grows.
    pub normal_side: NormalSide,
    /// Owning user, if any.
    pub owner_user_id: Option<UserId>,
    /// Owning group, if any.
    pub owner_group_id: Option<GroupId>,
    /// Metadata object.
    pub metadata: Value,
}

impl NewAccount {
    /// Creates a debit-normal account input with no code or owner.
    #[must_use]
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            code: None,
            currency,
            normal_side: NormalSide::Debit,
            owner_user_id: None,
            owner_group_id: None,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    /// Sets the unique code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the normal side.
    #[must_use]
    pub fn with_normal_side(mut self, normal_side: NormalSide) -> Self {
        self.normal_side = normal_side;
        self
    }

    /// Sets the owning user.
    #[must_use]
    pub fn owned_by_user(mut self, user_id: UserId) -> Self {
        self.owner_user_id = Some(user_id);
        self
    }

    /// Sets the owning group.
    #[must_use]
    pub fn owned_by_group(mut self, group_id: GroupId) -> Self {
        self.owner_group_id = Some(group_id);
        self
    }
}

/// Filter options for listing accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFilter {
    /// Only return active accounts.
    pub active_only: bool,
}
