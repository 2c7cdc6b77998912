//! Balance invariant checking for ledger entries.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::CurrencyPolicy;
use tally_shared::types::{Currency, checked_add_exact};

use super::error::ValidationError;
use super::types::{Direction, NormalizedLine};

/// Minimum number of lines in an entry.
pub const MIN_LINES: usize = 2;

/// Debit and credit sums for one currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    /// Sum of debit amounts.
    pub debit: Decimal,
    /// Sum of credit amounts.
    pub credit: Decimal,
}

impl CurrencyTotals {
    /// Returns true if debits equal credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }

    /// Debits minus credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Rejects entries with fewer than [`MIN_LINES`] lines.
///
/// # Errors
///
/// Returns `InsufficientLines` with the supplied count.
pub fn require_min_lines(count: usize) -> Result<(), ValidationError> {
    if count < MIN_LINES {
        return Err(ValidationError::InsufficientLines { count });
    }
    Ok(())
}

/// Sums debits and credits per currency with checked decimal addition.
///
/// # Errors
///
/// Returns `TotalsOverflow` if a sum leaves the decimal range or could only
/// be represented by rounding away fractional digits.
pub fn compute_totals(
    lines: &[NormalizedLine],
) -> Result<BTreeMap<Currency, CurrencyTotals>, ValidationError> {
    let mut totals: BTreeMap<Currency, CurrencyTotals> = BTreeMap::new();

    for line in lines {
        let entry = totals.entry(line.amount.currency.clone()).or_default();
        let side = match line.direction {
            Direction::Debit => &mut entry.debit,
            Direction::Credit => &mut entry.credit,
        };
        *side = checked_add_exact(*side, line.amount.value).ok_or_else(|| {
            ValidationError::TotalsOverflow {
                currency: line.amount.currency.clone(),
            }
        })?;
    }

    Ok(totals)
}

/// Verifies that a normalized entry nets to zero.
///
/// Checks run in order: line count, totals, currency policy, balance. On
/// success the per-currency totals are returned for logging and display.
///
/// # Errors
///
/// Returns the first violated rule. `Unbalanced` carries the totals of every
/// currency in the entry, balanced or not.
pub fn check_balance(
    lines: &[NormalizedLine],
    policy: CurrencyPolicy,
) -> Result<BTreeMap<Currency, CurrencyTotals>, ValidationError> {
    require_min_lines(lines.len())?;

    let totals = compute_totals(lines)?;

    if policy == CurrencyPolicy::SingleCurrency && totals.len() > 1 {
        return Err(ValidationError::MixedCurrencies {
            currencies: totals.keys().cloned().collect(),
        });
    }

    if totals.values().any(|t| !t.is_balanced()) {
        return Err(ValidationError::Unbalanced { totals });
    }

    Ok(totals)
}
