//! SMS messages that no active pattern could extract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "unparsed_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnparsedStatus {
    Pending,
    Processed,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UnparsedMessage {
    pub id: Uuid,
    pub bank_address: String,
    pub sms_message: String,
    pub submitted_by: Uuid,
    pub status: UnparsedStatus,
    pub error_message: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UnparsedMessage {
    pub fn new(bank_address: &str, sms_message: &str, submitted_by: Uuid, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            bank_address: bank_address.trim().to_string(),
            sms_message: sms_message.to_string(),
            submitted_by,
            status: UnparsedStatus::Pending,
            error_message: Some(reason.to_string()),
            processed_by: None,
            processed_at: None,
            deleted_by: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Pre-filled draft fields handed back when a maker claims a message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSeed {
    pub bank_address: String,
    pub bank_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimedMessage {
    pub message: UnparsedMessage,
    pub draft: DraftSeed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingCount {
    pub count: i64,
}
