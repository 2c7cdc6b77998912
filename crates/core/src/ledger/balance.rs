//! Account balance projection.
//!
//! Balances are never stored. They are recomputed from the immutable line
//! set on every call:
//! - Debit-normal (asset/expense): balance = debits - credits
//! - Credit-normal (liability/equity/revenue): balance = credits - debits

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, Amount, Currency, checked_add_exact};
use tracing::instrument;

use super::error::LedgerError;
use super::store::LedgerStore;
use super::types::{Account, Direction, NormalSide, PersistedLine};

/// Totals and signed balance for one currency on one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    /// Total debit amount.
    pub debit_total: Decimal,
    /// Total credit amount.
    pub credit_total: Decimal,
    /// Net balance, signed by the account's normal side.
    pub balance: Decimal,
}

/// Account balance at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Side used to sign the balance.
    pub normal_side: NormalSide,
    /// The account's display currency.
    pub currency: Currency,
    /// Inclusive upper bound on `occurred_at`, if any.
    pub as_of: Option<DateTime<Utc>>,
    /// Per-currency totals for every currency the account has lines in.
    pub by_currency: BTreeMap<Currency, CurrencyBalance>,
}

impl AccountBalance {
    /// Folds `lines` into a balance for `account`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a total leaves the decimal range or would have to
    /// be rounded.
    pub fn project(
        account: &Account,
        lines: &[PersistedLine],
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Self, LedgerError> {
        let mut by_currency: BTreeMap<Currency, CurrencyBalance> = BTreeMap::new();

        for line in lines {
            let totals = by_currency.entry(line.amount.currency.clone()).or_default();
            let side = match line.direction {
                Direction::Debit => &mut totals.debit_total,
                Direction::Credit => &mut totals.credit_total,
            };
            *side = checked_add_exact(*side, line.amount.value)
                .ok_or_else(|| overflow(account, &line.amount.currency))?;
        }

        for (currency, totals) in &mut by_currency {
            totals.balance = account
                .normal_side
                .balance_change(totals.debit_total, totals.credit_total)
                .ok_or_else(|| overflow(account, currency))?;
        }

        Ok(Self {
            account_id: account.id,
            normal_side: account.normal_side,
            currency: account.currency.clone(),
            as_of,
            by_currency,
        })
    }

    /// Signed balance in `currency`, zero when the account has no lines in it.
    #[must_use]
    pub fn amount(&self, currency: &Currency) -> Amount {
        self.by_currency.get(currency).map_or_else(
            || Amount::zero(currency.clone()),
            |totals| Amount {
                value: totals.balance,
                currency: currency.clone(),
            },
        )
    }

    /// Signed balance in the account's display currency.
    #[must_use]
    pub fn primary(&self) -> Amount {
        self.amount(&self.currency)
    }
}

fn overflow(account: &Account, currency: &Currency) -> LedgerError {
    LedgerError::Storage(format!(
        "balance overflow on account {} in {currency}",
        account.id
    ))
}

/// Read-only balance computation over a [`LedgerStore`].
pub struct BalanceProjector<S> {
    store: Arc<S>,
}

impl<S> Clone for BalanceProjector<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> BalanceProjector<S> {
    /// Creates a projector reading from `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Computes an account's balance from its committed lines.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist, or `Storage`
    /// on read failure.
    #[instrument(skip(self, account_id), fields(account_id = %account_id))]
    pub async fn compute_balance(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<AccountBalance, LedgerError> {
        let account = self.store.get_account(account_id).await?;
        let lines = self.store.lines_for_account(account_id, as_of).await?;
        AccountBalance::project(&account, &lines, as_of)
    }
}
