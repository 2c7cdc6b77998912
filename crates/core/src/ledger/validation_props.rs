//! Property-based tests for entry validation rules.
//!
//! Balance invariant, positivity and minimum cardinality.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::CurrencyPolicy;
use tally_shared::types::AccountId;

use super::error::ValidationError;
use super::normalize::normalize_lines;
use super::types::{Direction, RawLine};
use super::validation::{check_balance, compute_totals};

/// Strategy to generate a valid positive amount (> 0) at up to 18 digits of scale.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000_000i64, 0u32..=18u32).prop_map(|(units, scale)| Decimal::new(units, scale))
}

/// Strategy to generate a zero or negative amount.
fn non_positive_amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64, 0u32..=6u32).prop_map(|(units, scale)| Decimal::new(-units, scale))
}

fn currency_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("USD"), Just("EUR"), Just("CREDITS")]
}

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Debit), Just(Direction::Credit)]
}

fn raw(direction: Direction, amount: Decimal, currency: &str) -> RawLine {
    RawLine::new(AccountId::new(), direction, &amount.to_string(), currency)
}

/// Builds a balanced entry: each debit amount is mirrored by a credit split
/// into two parts.
fn balanced_lines(amounts: &[(Decimal, &str)]) -> Vec<RawLine> {
    let mut lines = Vec::new();
    for (amount, currency) in amounts {
        let half = (*amount / Decimal::TWO).trunc_with_scale(amount.scale());
        let rest = *amount - half;
        lines.push(raw(Direction::Debit, *amount, currency));
        if half > Decimal::ZERO {
            lines.push(raw(Direction::Credit, half, currency));
        }
        lines.push(raw(Direction::Credit, rest, currency));
    }
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balanced entries are accepted and every currency's totals match.
    #[test]
    fn prop_balanced_entries_accepted(
        amounts in prop::collection::vec((positive_amount(), currency_strategy()), 1..6),
    ) {
        let lines = normalize_lines(&balanced_lines(&amounts)).unwrap();
        let totals = check_balance(&lines, CurrencyPolicy::PerCurrency);

        prop_assert!(totals.is_ok(), "balanced entry rejected: {:?}", totals);
        for t in totals.unwrap().values() {
            prop_assert_eq!(t.debit, t.credit);
        }
    }

    /// Any nonzero perturbation of one line breaks the balance.
    #[test]
    fn prop_perturbed_entries_rejected(
        amounts in prop::collection::vec((positive_amount(), currency_strategy()), 1..6),
        bump in positive_amount(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut lines = normalize_lines(&balanced_lines(&amounts)).unwrap();
        let i = pick.index(lines.len());
        lines[i].amount.value += bump;

        let result = check_balance(&lines, CurrencyPolicy::PerCurrency);
        prop_assert!(
            matches!(result, Err(ValidationError::Unbalanced { .. })),
            "perturbed entry accepted"
        );
    }

    /// Totals equal the exact sum of each side.
    #[test]
    fn prop_totals_are_exact_sums(
        sides in prop::collection::vec((direction_strategy(), positive_amount()), 2..12),
    ) {
        let raw_lines: Vec<_> = sides.iter().map(|(d, a)| raw(*d, *a, "USD")).collect();
        let lines = normalize_lines(&raw_lines).unwrap();
        let totals = compute_totals(&lines).unwrap();
        let usd = &totals[&tally_shared::types::Currency::new("USD").unwrap()];

        let debit: Decimal = sides.iter().filter(|(d, _)| *d == Direction::Debit).map(|(_, a)| *a).sum();
        let credit: Decimal = sides.iter().filter(|(d, _)| *d == Direction::Credit).map(|(_, a)| *a).sum();
        prop_assert_eq!(usd.debit, debit);
        prop_assert_eq!(usd.credit, credit);
    }

    /// Lines with amount <= 0 are always rejected, wherever they appear.
    #[test]
    fn prop_non_positive_amount_rejected(
        bad in non_positive_amount(),
        good in positive_amount(),
        direction in direction_strategy(),
        bad_first in any::<bool>(),
    ) {
        let bad_line = raw(direction, bad, "USD");
        let good_line = raw(direction.opposite(), good, "USD");
        let (lines, bad_index) = if bad_first {
            (vec![bad_line, good_line], 0)
        } else {
            (vec![good_line, bad_line], 1)
        };

        let result = normalize_lines(&lines);
        prop_assert!(
            matches!(result, Err(ValidationError::NonPositiveAmount { line, .. }) if line == bad_index),
            "non-positive amount accepted: {:?}",
            result
        );
    }

    /// Fewer than two lines are rejected regardless of amounts.
    #[test]
    fn prop_fewer_than_two_lines_rejected(
        amount in positive_amount(),
        direction in direction_strategy(),
        include in any::<bool>(),
    ) {
        let raw_lines = if include { vec![raw(direction, amount, "USD")] } else { vec![] };
        let lines = normalize_lines(&raw_lines).unwrap();

        let result = check_balance(&lines, CurrencyPolicy::PerCurrency);
        prop_assert!(
            matches!(result, Err(ValidationError::InsufficientLines { .. })),
            "short entry accepted"
        );
    }

    /// The single-currency policy accepts exactly the one-currency entries.
    #[test]
    fn prop_single_currency_policy_boundary(
        amounts in prop::collection::vec((positive_amount(), currency_strategy()), 1..5),
    ) {
        let lines = normalize_lines(&balanced_lines(&amounts)).unwrap();
        let currencies: std::collections::BTreeSet<_> = amounts.iter().map(|(_, c)| *c).collect();

        let result = check_balance(&lines, CurrencyPolicy::SingleCurrency);
        if currencies.len() == 1 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(
                matches!(result, Err(ValidationError::MixedCurrencies { .. })),
                "mixed entry accepted"
            );
        }
    }
}
