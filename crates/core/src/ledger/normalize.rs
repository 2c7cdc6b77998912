//! Line normalization.
//!
//! Turns a raw proposed line into a [`NormalizedLine`] or a
//! [`ValidationError`] naming the offending line. Storage-free: account
//! existence is checked by the store while posting.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tally_shared::types::money::parse_decimal;
use tally_shared::types::{AccountId, Amount, Currency};

use super::error::ValidationError;
use super::types::{Direction, NormalizedLine, RawAmount, RawLine};

/// Validates and canonicalizes the line at `index`.
///
/// # Errors
///
/// Returns the first problem found, checked in field order: account id,
/// direction, amount, currency, metadata.
pub fn normalize_line(index: usize, raw: &RawLine) -> Result<NormalizedLine, ValidationError> {
    let account_id = required(index, "account_id", raw.account_id.as_deref())?;
    let account_id =
        AccountId::from_str(account_id).map_err(|_| ValidationError::InvalidAccountId {
            line: index,
            value: account_id.to_string(),
        })?;

    let direction = required(index, "direction", raw.direction.as_deref())?;
    let direction = Direction::parse(direction).ok_or_else(|| ValidationError::InvalidDirection {
        line: index,
        value: direction.to_string(),
    })?;

    let amount = raw
        .amount
        .as_ref()
        .map(RawAmount::as_text)
        .ok_or(ValidationError::MissingField {
            line: index,
            field: "amount",
        })?;
    let value = parse_decimal(&amount).map_err(|reason| ValidationError::InvalidAmount {
        line: index,
        reason,
    })?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount { line: index, value });
    }

    let currency = required(index, "currency", raw.currency.as_deref())?;
    let currency = Currency::new(currency).map_err(|_| ValidationError::MissingField {
        line: index,
        field: "currency",
    })?;

    let metadata = match &raw.metadata {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => return Err(ValidationError::InvalidLineMetadata { line: index }),
    };

    Ok(NormalizedLine {
        account_id,
        direction,
        amount: Amount { value, currency },
        metadata,
    })
}

/// Normalizes every line, stopping at the first failure.
///
/// # Errors
///
/// Returns the error of the first invalid line.
pub fn normalize_lines(raw: &[RawLine]) -> Result<Vec<NormalizedLine>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(index, line)| normalize_line(index, line))
        .collect()
}

fn required<'a>(
    line: usize,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField { line, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn line(direction: &str, amount: &str, currency: &str) -> RawLine {
        RawLine {
            account_id: Some(AccountId::new().to_string()),
            direction: Some(direction.to_string()),
            amount: Some(RawAmount::from(amount)),
            currency: Some(currency.to_string()),
            metadata: None,
        }
    }

    #[test]
    fn test_normalizes_valid_line() {
        let raw = line("DEBIT", "100.00", "usd");
        let normalized = normalize_line(0, &raw).unwrap();

        assert_eq!(normalized.direction, Direction::Debit);
        assert_eq!(normalized.amount.value, dec!(100.00));
        assert_eq!(normalized.amount.currency.as_str(), "USD");
        assert_eq!(normalized.metadata, json!({}));
    }

    #[test]
    fn test_metadata_passes_through() {
        let raw = line("credit", "1", "EUR").with_metadata(json!({ "memo": "fee", "n": [1, 2] }));
        let normalized = normalize_line(0, &raw).unwrap();
        assert_eq!(normalized.metadata, json!({ "memo": "fee", "n": [1, 2] }));
    }

    #[rstest]
    #[case("0.30000000000000001", dec!(0.30000000000000001))]
    #[case("123456789.123456789123456789", dec!(123456789.123456789123456789))]
    #[case("2.5e-3", dec!(0.0025))]
    fn test_json_number_amount_is_exact(#[case] number: &str, #[case] expected: Decimal) {
        let mut raw = line("debit", "0", "USD");
        raw.amount = Some(serde_json::from_str(number).unwrap());
        let normalized = normalize_line(0, &raw).unwrap();
        assert_eq!(normalized.amount.value, expected);
        assert_eq!(normalized.amount.value.scale(), expected.scale());
    }

    #[test]
    fn test_json_number_off_by_float_epsilon_is_unbalanced() {
        use crate::ledger::validation::check_balance;
        use tally_shared::CurrencyPolicy;

        let id = AccountId::new();
        let raw: Vec<RawLine> = serde_json::from_str(&format!(
            r#"[
                {{"account_id": "{id}", "direction": "debit", "amount": 0.30000000000000001, "currency": "USD"}},
                {{"account_id": "{id}", "direction": "credit", "amount": "0.3", "currency": "USD"}}
            ]"#
        ))
        .unwrap();
        let lines = normalize_lines(&raw).unwrap();

        assert_eq!(lines[0].amount.value, dec!(0.30000000000000001));
        assert!(matches!(
            check_balance(&lines, CurrencyPolicy::PerCurrency),
            Err(ValidationError::Unbalanced { .. })
        ));
    }

    #[rstest]
    #[case("sideways")]
    #[case("dr")]
    #[case("debits")]
    fn test_rejects_invalid_direction(#[case] direction: &str) {
        let err = normalize_line(3, &line(direction, "1", "USD")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDirection { line: 3, .. }));
        assert!(err.to_string().contains("invalid direction"));
    }

    #[rstest]
    #[case("0")]
    #[case("0.00")]
    #[case("-5")]
    #[case("-0.000000000000000001")]
    fn test_rejects_non_positive_amount(#[case] amount: &str) {
        let err = normalize_line(1, &line("debit", amount, "USD")).unwrap_err();
        assert!(matches!(err, ValidationError::NonPositiveAmount { line: 1, .. }));
        assert!(err.to_string().contains("amount must be positive"));
    }

    #[rstest]
    #[case("abc")]
    #[case("NaN")]
    #[case("ten")]
    #[case("0.0000000000000000001")]
    fn test_rejects_unparseable_amount(#[case] amount: &str) {
        let err = normalize_line(0, &line("debit", amount, "USD")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAmount { line: 0, .. }));
    }

    #[test]
    fn test_reports_missing_fields() {
        let mut raw = line("debit", "1", "USD");
        raw.account_id = None;
        assert_eq!(
            normalize_line(2, &raw),
            Err(ValidationError::MissingField {
                line: 2,
                field: "account_id"
            })
        );

        let mut raw = line("debit", "1", "USD");
        raw.direction = Some("  ".into());
        assert_eq!(
            normalize_line(0, &raw),
            Err(ValidationError::MissingField {
                line: 0,
                field: "direction"
            })
        );

        let mut raw = line("debit", "1", "USD");
        raw.amount = None;
        assert_eq!(
            normalize_line(0, &raw),
            Err(ValidationError::MissingField {
                line: 0,
                field: "amount"
            })
        );

        let mut raw = line("debit", "1", "USD");
        raw.currency = Some(String::new());
        assert_eq!(
            normalize_line(0, &raw),
            Err(ValidationError::MissingField {
                line: 0,
                field: "currency"
            })
        );
    }

    #[test]
    fn test_rejects_invalid_account_id() {
        let mut raw = line("debit", "1", "USD");
        raw.account_id = Some("acct-a".into());
        assert!(matches!(
            normalize_line(0, &raw),
            Err(ValidationError::InvalidAccountId { line: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_non_object_metadata() {
        let raw = line("debit", "1", "USD").with_metadata(json!("note"));
        assert_eq!(
            normalize_line(4, &raw),
            Err(ValidationError::InvalidLineMetadata { line: 4 })
        );
    }

    #[test]
    fn test_normalize_lines_reports_first_bad_index() {
        let lines = vec![
            line("debit", "1", "USD"),
            line("credit", "1", "USD"),
            line("credit", "0", "USD"),
        ];
        assert!(matches!(
            normalize_lines(&lines),
            Err(ValidationError::NonPositiveAmount { line: 2, .. })
        ));
        assert_eq!(normalize_lines(&lines[..2]).unwrap().len(), 2);
    }
}
