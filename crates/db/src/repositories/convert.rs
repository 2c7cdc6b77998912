//! Conversions between database rows and ledger domain types.

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use serde_json::Value;
use tally_core::ledger::{
    Account, Direction, EntryHeader, NormalSide, PersistedLine, Reference, StoreError,
};
use tally_shared::types::{Amount, Currency, GroupId, UserId};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{accounts, ledger_entries, ledger_lines};

/// A stored row that no longer decodes into a domain value.
#[derive(Debug, Error)]
#[error("invalid {column} '{value}' in {table} row {id}")]
pub struct DecodeError {
    table: &'static str,
    column: &'static str,
    id: Uuid,
    value: String,
}

impl DecodeError {
    fn new(table: &'static str, column: &'static str, id: Uuid, value: impl ToString) -> Self {
        Self {
            table,
            column,
            id,
            value: value.to_string(),
        }
    }
}

impl From<DecodeError> for StoreError {
    fn from(err: DecodeError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Maps a `SeaORM` error onto the store taxonomy.
///
/// Unique constraint violations become `Conflict`; everything else is a
/// storage failure.
pub fn db_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => StoreError::Conflict(message),
        _ => StoreError::Storage(err.to_string()),
    }
}

/// Serializes a metadata object for a TEXT column.
pub fn encode_metadata(metadata: &Value) -> String {
    metadata.to_string()
}

fn decode_metadata(table: &'static str, id: Uuid, raw: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(raw).map_err(|_| DecodeError::new(table, "metadata", id, raw))
}

fn decode_currency(table: &'static str, id: Uuid, raw: &str) -> Result<Currency, DecodeError> {
    Currency::new(raw).map_err(|_| DecodeError::new(table, "currency", id, raw))
}

impl TryFrom<accounts::Model> for Account {
    type Error = DecodeError;

    fn try_from(model: accounts::Model) -> Result<Self, Self::Error> {
        let normal_side = NormalSide::from_str(&model.normal_side)
            .map_err(|_| DecodeError::new("accounts", "normal_side", model.id, &model.normal_side))?;

        Ok(Self {
            id: model.id.into(),
            currency: decode_currency("accounts", model.id, &model.currency)?,
            metadata: decode_metadata("accounts", model.id, &model.metadata)?,
            name: model.name,
            code: model.code,
            normal_side,
            is_active: model.is_active,
            owner_user_id: model.owner_user_id.map(UserId::from),
            owner_group_id: model.owner_group_id.map(GroupId::from),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<ledger_entries::Model> for EntryHeader {
    type Error = DecodeError;

    fn try_from(model: ledger_entries::Model) -> Result<Self, Self::Error> {
        let reference = match (model.reference_type, model.reference_id) {
            (Some(kind), Some(id)) => Some(Reference { kind, id }),
            _ => None,
        };

        Ok(Self {
            id: model.id.into(),
            occurred_at: model.occurred_at,
            description: model.description,
            reference,
            metadata: decode_metadata("ledger_entries", model.id, &model.metadata)?,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
        })
    }
}

impl TryFrom<ledger_lines::Model> for PersistedLine {
    type Error = DecodeError;

    fn try_from(model: ledger_lines::Model) -> Result<Self, Self::Error> {
        const TABLE: &str = "ledger_lines";

        let direction = Direction::parse(&model.direction)
            .ok_or_else(|| DecodeError::new(TABLE, "direction", model.id, &model.direction))?;
        let value = Decimal::from_str_exact(&model.amount)
            .map_err(|_| DecodeError::new(TABLE, "amount", model.id, &model.amount))?;
        let position = usize::try_from(model.position)
            .map_err(|_| DecodeError::new(TABLE, "position", model.id, model.position))?;

        Ok(Self {
            id: model.id.into(),
            entry_id: model.entry_id.into(),
            position,
            account_id: model.account_id.into(),
            direction,
            amount: Amount {
                value,
                currency: decode_currency(TABLE, model.id, &model.currency)?,
            },
            metadata: decode_metadata(TABLE, model.id, &model.metadata)?,
        })
    }
}
