//! Compensating entries.
//!
//! Committed entries are immutable. A mistake is corrected by posting a
//! reversal: the same lines with debit and credit swapped.

use serde_json::json;
use tally_shared::types::EntryId;

use super::types::{PostEntry, PostedEntry, RawAmount, RawLine, Reference};

/// Reference type stamped on reversal entries.
pub const REVERSAL_REFERENCE_TYPE: &str = "reversal";

/// Idempotency key for the reversal of `entry_id`.
///
/// An entry can be reversed at most once; a second attempt returns the first
/// reversal.
#[must_use]
pub fn reversal_key(entry_id: EntryId) -> String {
    format!("reversal:{entry_id}")
}

/// Builds the request that reverses `original`.
#[must_use]
pub fn build_reversal(original: &PostedEntry, description: Option<String>) -> PostEntry {
    let entry_id = original.entry.id;

    let lines = original
        .lines
        .iter()
        .map(|line| RawLine {
            account_id: Some(line.account_id.to_string()),
            direction: Some(line.direction.opposite().as_str().to_string()),
            amount: Some(RawAmount::Text(line.amount.to_decimal_string())),
            currency: Some(line.amount.currency.to_string()),
            metadata: Some(line.metadata.clone()),
        })
        .collect();

    let description = description.unwrap_or_else(|| match &original.entry.description {
        Some(original) => format!("Reversal of entry {entry_id}: {original}"),
        None => format!("Reversal of entry {entry_id}"),
    });

    PostEntry {
        description: Some(description),
        reference: Some(Reference::new(
            REVERSAL_REFERENCE_TYPE,
            entry_id.to_string(),
        )),
        metadata: Some(json!({ "reverses_entry_id": entry_id })),
        occurred_at: None,
        idempotency_key: Some(reversal_key(entry_id)),
        lines,
    }
}
