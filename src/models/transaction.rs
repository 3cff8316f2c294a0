//! Ledger record extracted from a matched SMS.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::category::Category;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Credited,
    Debited,
    Alert,
    Reminder,
    Others,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "amount_sign", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmountSign {
    Credit,
    Debit,
}

impl AmountSign {
    /// Debit when the template says so or the (possibly negated) amount is negative.
    pub fn derive(transaction_type: TransactionType, amount: Option<Decimal>) -> Self {
        let negative = amount.is_some_and(|a| a.is_sign_negative() && !a.is_zero());
        if transaction_type == TransactionType::Debited || negative {
            AmountSign::Debit
        } else {
            AmountSign::Credit
        }
    }
}

/// Immutable extraction result.
///
/// `None` on an optional field means the template does not provide it or
/// the captured text could not be parsed ("unknown"); values are never guessed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub merchant: Option<String>,
    pub amount: Option<Decimal>,
    pub amount_sign: AmountSign,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[sqlx(rename = "occurred_at")]
    pub date: Option<NaiveDateTime>,
    pub bank_name: String,
    pub bank_address: String,
    pub account_number: Option<String>,
    pub balance: Option<Decimal>,
    pub ref_number: Option<String>,
    pub category: Category,
    pub sms_message: String,
    pub matched_pattern_id: Uuid,
    pub submitted_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the ledger sign applied: debits negative, credits positive.
    pub fn signed_amount(&self) -> Option<Decimal> {
        self.amount.map(|a| match self.amount_sign {
            AmountSign::Debit => -a.abs(),
            AmountSign::Credit => a.abs(),
        })
    }
}

/// Body of `POST /parse`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    #[validate(length(min = 1, max = 2000, message = "sms must be 1-2000 characters"))]
    pub sms: String,
    #[validate(length(min = 1, max = 64, message = "bankAddress must be 1-64 characters"))]
    pub bank_address: String,
}
