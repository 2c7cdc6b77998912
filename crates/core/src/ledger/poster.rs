//! Atomic posting.
//!
//! One call to [`AtomicPoster::post`] moves through these phases:
//!
//! ```text
//! Validating ──► Posting ──► Committed
//!     │             │
//!     ▼             ▼
//!  Rejected      Aborted
//! ```
//!
//! Validation never touches the store. Once posting starts, every exit path
//! other than a successful commit rolls the transaction back: explicitly on
//! store errors, and through the handle's drop when the caller abandons the
//! future.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tally_shared::CurrencyPolicy;
use tally_shared::types::{Currency, EntryId};
use tracing::{debug, error, info, instrument, warn};

use super::error::{LedgerError, ValidationError};
use super::normalize::normalize_lines;
use super::reversal::build_reversal;
use super::store::{AccountGate, LedgerStore, StoreError};
use super::types::{NewEntry, NormalizedLine, PostEntry, PostedEntry};
use super::validation::{CurrencyTotals, check_balance, require_min_lines};

/// Lifecycle of one posting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingPhase {
    /// Normalizing lines and checking balance.
    Validating,
    /// Writing inside a store transaction.
    Posting,
    /// Terminal success; the entry is durable and visible.
    Committed,
    /// Terminal failure before any store interaction.
    Rejected,
    /// Terminal failure after the transaction was rolled back.
    Aborted,
}

impl PostingPhase {
    /// Returns the phase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Posting => "posting",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
            Self::Aborted => "aborted",
        }
    }

    /// Returns true for phases that end the attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected | Self::Aborted)
    }
}

impl std::fmt::Display for PostingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry that passed validation and is ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    /// Header to insert.
    pub header: NewEntry,
    /// Lines to insert, in request order.
    pub lines: Vec<NormalizedLine>,
    /// Per-currency totals.
    pub totals: BTreeMap<Currency, CurrencyTotals>,
}

/// Orchestrates validate, begin, write entry, write lines, commit.
pub struct AtomicPoster<S> {
    store: Arc<S>,
    policy: CurrencyPolicy,
}

impl<S> Clone for AtomicPoster<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: LedgerStore> AtomicPoster<S> {
    /// Creates a poster writing to `store` under `policy`.
    #[must_use]
    pub const fn new(store: Arc<S>, policy: CurrencyPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the mixed-currency policy in force.
    #[must_use]
    pub const fn policy(&self) -> CurrencyPolicy {
        self.policy
    }

    /// Runs the side-effect-free half of posting.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure. Line count is checked before
    /// the lines themselves.
    pub fn validate(&self, request: &PostEntry) -> Result<ValidatedEntry, ValidationError> {
        require_min_lines(request.lines.len())?;

        let lines = normalize_lines(&request.lines)?;
        let totals = check_balance(&lines, self.policy)?;

        let metadata = match &request.metadata {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value @ Value::Object(_)) => value.clone(),
            Some(_) => return Err(ValidationError::InvalidEntryMetadata),
        };

        if let Some(reference) = &request.reference
            && (reference.kind.trim().is_empty() || reference.id.trim().is_empty())
        {
            return Err(ValidationError::InvalidReference);
        }

        let idempotency_key = match request.idempotency_key.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::InvalidIdempotencyKey),
            Some(key) => Some(key.to_string()),
            None => None,
        };

        Ok(ValidatedEntry {
            header: NewEntry {
                occurred_at: request.occurred_at.unwrap_or_else(Utc::now),
                description: request.description.clone(),
                reference: request.reference.clone(),
                metadata,
                idempotency_key,
            },
            lines,
            totals,
        })
    }

    /// Validates and atomically commits one entry.
    ///
    /// With an idempotency key, a replay returns the originally committed
    /// entry without writing.
    ///
    /// # Errors
    ///
    /// - `Validation` before any store interaction
    /// - `Conflict` if the idempotency key belongs to an entry with
    ///   different lines
    /// - `AccountNotFound` / `AccountInactive` naming the offending line
    /// - `PostingFailed` for storage failures
    ///
    /// Every error after validation is returned only once the transaction
    /// has been rolled back.
    pub async fn post(&self, request: &PostEntry) -> Result<PostedEntry, LedgerError> {
        self.post_with(request, AccountGate::ActiveOnly).await
    }

    #[instrument(skip_all, fields(lines = request.lines.len(), gate = ?gate))]
    async fn post_with(
        &self,
        request: &PostEntry,
        gate: AccountGate,
    ) -> Result<PostedEntry, LedgerError> {
        debug!(phase = %PostingPhase::Validating, "validating entry");
        let validated = self.validate(request).inspect_err(|err| {
            warn!(phase = %PostingPhase::Rejected, code = err.code(), error = %err, "entry rejected");
        })?;

        let key = validated.header.idempotency_key.clone();
        if let Some(key) = &key
            && let Some(existing) = self.replay(key, &validated).await?
        {
            return Ok(existing);
        }

        match (self.write(&validated, gate).await, key) {
            // Lost the race to a concurrent post with the same key.
            (Err(LedgerError::Conflict(message)), Some(key)) => {
                match self.replay(&key, &validated).await? {
                    Some(existing) => Ok(existing),
                    None => Err(LedgerError::Conflict(message)),
                }
            }
            (result, _) => result,
        }
    }

    /// Posts the compensating entry for `entry_id`.
    ///
    /// Reversing twice returns the first reversal. Deactivated accounts
    /// still accept reversal lines, so deactivation never blocks a
    /// correction.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist, otherwise the
    /// errors of [`AtomicPoster::post`].
    #[instrument(skip(self, entry_id, description), fields(entry_id = %entry_id))]
    pub async fn reverse(
        &self,
        entry_id: EntryId,
        description: Option<String>,
    ) -> Result<PostedEntry, LedgerError> {
        let original = self.store.get_entry(entry_id).await?;
        let request = build_reversal(&original, description);
        self.post_with(&request, AccountGate::AllowInactive).await
    }

    /// Returns the committed entry for `key`, provided it records the same
    /// movements as `validated`.
    async fn replay(
        &self,
        key: &str,
        validated: &ValidatedEntry,
    ) -> Result<Option<PostedEntry>, LedgerError> {
        let Some(existing) = self.store.find_entry_by_idempotency_key(key).await? else {
            return Ok(None);
        };

        if !same_movements(&existing, &validated.lines) {
            warn!(
                entry_id = %existing.entry.id,
                idempotency_key = key,
                "idempotency key reused for different lines"
            );
            return Err(LedgerError::Conflict(format!(
                "idempotency key '{key}' already used by entry {} with different lines",
                existing.entry.id
            )));
        }

        info!(entry_id = %existing.entry.id, idempotency_key = key, "idempotent replay");
        Ok(Some(existing))
    }

    async fn write(
        &self,
        validated: &ValidatedEntry,
        gate: AccountGate,
    ) -> Result<PostedEntry, LedgerError> {
        debug!(phase = %PostingPhase::Posting, "opening transaction");
        let mut tx = self
            .store
            .begin_entry_transaction()
            .await
            .map_err(|err| {
                warn!(phase = %PostingPhase::Aborted, error = %err, "failed to open transaction");
                LedgerError::PostingFailed(err)
            })?;

        match self.write_in(&mut tx, validated, gate).await {
            Ok(posted) => {
                self.store.commit(tx).await.map_err(|err| {
                    error!(phase = %PostingPhase::Aborted, error = %err, "commit failed");
                    posting_error(None, err)
                })?;
                info!(
                    phase = %PostingPhase::Committed,
                    entry_id = %posted.entry.id,
                    lines = posted.lines.len(),
                    currencies = validated.totals.len(),
                    "entry committed"
                );
                Ok(posted)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(tx).await {
                    error!(error = %rollback_err, "rollback failed");
                }
                warn!(phase = %PostingPhase::Aborted, code = err.error_code(), error = %err, "entry aborted");
                Err(err)
            }
        }
    }

    async fn write_in(
        &self,
        tx: &mut S::Tx,
        validated: &ValidatedEntry,
        gate: AccountGate,
    ) -> Result<PostedEntry, LedgerError> {
        let entry = self
            .store
            .insert_entry(tx, &validated.header)
            .await
            .map_err(|err| posting_error(None, err))?;

        let mut lines = Vec::with_capacity(validated.lines.len());
        for (position, line) in validated.lines.iter().enumerate() {
            let persisted = self
                .store
                .insert_line(tx, entry.id, position, line, gate)
                .await
                .map_err(|err| posting_error(Some(position), err))?;
            lines.push(persisted);
        }

        Ok(PostedEntry { entry, lines })
    }
}

/// True when `existing` holds the same lines as `lines`, in order.
///
/// Amounts compare numerically, so `"100.00"` matches `"100"`. Metadata is
/// not part of the movement.
fn same_movements(existing: &PostedEntry, lines: &[NormalizedLine]) -> bool {
    existing.lines.len() == lines.len()
        && existing.lines.iter().zip(lines).all(|(stored, line)| {
            stored.account_id == line.account_id
                && stored.direction == line.direction
                && stored.amount.currency == line.amount.currency
                && stored.amount.value == line.amount.value
        })
}

/// Maps a store failure raised while posting.
fn posting_error(line: Option<usize>, err: StoreError) -> LedgerError {
    match err {
        StoreError::AccountNotFound(account_id) => LedgerError::AccountNotFound { account_id, line },
        StoreError::AccountInactive(account_id) => LedgerError::AccountInactive { account_id, line },
        StoreError::Conflict(message) => LedgerError::Conflict(message),
        other => LedgerError::PostingFailed(other),
    }
}
