//! Pattern registry model: regex templates, their capture-group field maps,
//! lifecycle status, audit history, and bank address aliases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::category::Category;
use crate::models::transaction::TransactionType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "pattern_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternStatus {
    Draft,
    PendingApproval,
    Active,
    Rejected,
    Deprecated,
}

impl PatternStatus {
    /// Rejected and deprecated patterns are never revived.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Deprecated)
    }
}

/// Transaction field a capture group can be mapped to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Amount,
    Date,
    Merchant,
    #[serde(alias = "accountNumber")]
    Account,
    Balance,
    RefNumber,
    Type,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Amount,
        Field::Date,
        Field::Merchant,
        Field::Account,
        Field::Balance,
        Field::RefNumber,
        Field::Type,
    ];

    /// Named capture group picked up when the field map does not mention the field.
    pub fn conventional_group(&self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Date => "date",
            Field::Merchant => "merchant",
            Field::Account => "accountNumber",
            Field::Balance => "balance",
            Field::RefNumber => "refNumber",
            Field::Type => "type",
        }
    }
}

/// Reference to a capture group, by position (1-based) or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupRef {
    Index(usize),
    Name(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupRef {
    Index(i64),
    Name(String),
}

/// Per-template mapping from transaction fields to capture groups.
///
/// Serialized as a JSON object, e.g. `{"account": 1, "amount": 2, "date": 3}`.
/// A negative index or an empty name means the template does not provide
/// that field; such entries are dropped on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(BTreeMap<Field, GroupRef>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used by fixtures and the seed binary.
    pub fn with(mut self, field: Field, group: GroupRef) -> Self {
        self.0.insert(field, group);
        self
    }

    pub fn get(&self, field: Field) -> Option<&GroupRef> {
        self.0.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &GroupRef)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<Field, RawGroupRef>::deserialize(deserializer)?;
        let groups = raw
            .into_iter()
            .filter_map(|(field, group)| match group {
                RawGroupRef::Index(i) if i > 0 => Some((field, GroupRef::Index(i as usize))),
                RawGroupRef::Name(name) if !name.trim().is_empty() => {
                    Some((field, GroupRef::Name(name.trim().to_string())))
                }
                _ => None,
            })
            .collect();
        Ok(FieldMap(groups))
    }
}

/// Full pattern row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: Uuid,
    pub bank_address: String,
    pub bank_name: String,
    pub merchant_name: Option<String>,
    #[serde(rename = "type")]
    pub pattern_type: TransactionType,
    pub regex_pattern: String,
    pub message: String,
    pub category: Option<Category>,
    pub status: PatternStatus,
    pub priority: i32,
    #[sqlx(json)]
    pub field_map: FieldMap,
    pub date_format: Option<String>,
    pub alt_date_format: Option<String>,
    pub negate_amount: bool,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub superseded_by: Option<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Pattern {
    /// Build a new, unsaved pattern authored by `created_by`.
    pub fn from_input(input: &CreatePattern, created_by: Uuid, status: PatternStatus) -> Self {
        let now = Utc::now();
        let mut pattern = Self {
            id: Uuid::new_v4(),
            bank_address: String::new(),
            bank_name: String::new(),
            merchant_name: None,
            pattern_type: TransactionType::Others,
            regex_pattern: String::new(),
            message: String::new(),
            category: None,
            status,
            priority: 0,
            field_map: FieldMap::new(),
            date_format: None,
            alt_date_format: None,
            negate_amount: false,
            created_by,
            approved_by: None,
            superseded_by: None,
            version: 1,
            created_at: now,
            decided_at: None,
            updated_at: now,
        };
        pattern.apply(input);
        pattern
    }

    /// Overwrite the authored fields with `input`, leaving lifecycle fields untouched.
    pub fn apply(&mut self, input: &CreatePattern) {
        self.bank_address = input.bank_address.trim().to_string();
        self.bank_name = input.bank_name.trim().to_string();
        self.merchant_name = input
            .merchant_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        self.pattern_type = input.pattern_type.unwrap_or(TransactionType::Others);
        self.regex_pattern = input.regex_pattern.clone();
        self.message = input.message.clone();
        self.category = input.category;
        self.priority = input.priority.unwrap_or(0);
        self.field_map = input.field_map.clone();
        self.date_format = input.date_format.clone().filter(|f| !f.trim().is_empty());
        self.alt_date_format = input.alt_date_format.clone().filter(|f| !f.trim().is_empty());
        self.negate_amount = input.negate_amount;
    }
}

/// Request body for creating or editing a pattern.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePattern {
    #[validate(length(min = 1, max = 64, message = "bankAddress must be 1-64 characters"))]
    pub bank_address: String,
    #[validate(length(min = 1, max = 128, message = "bankName must be 1-128 characters"))]
    pub bank_name: String,
    #[validate(length(max = 128))]
    pub merchant_name: Option<String>,
    #[serde(rename = "type", default)]
    pub pattern_type: Option<TransactionType>,
    #[validate(length(min = 1, max = 4096, message = "regexPattern must be 1-4096 characters"))]
    pub regex_pattern: String,
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
    pub category: Option<Category>,
    pub priority: Option<i32>,
    #[serde(default)]
    pub field_map: FieldMap,
    #[validate(length(max = 64))]
    pub date_format: Option<String>,
    #[validate(length(max = 64))]
    pub alt_date_format: Option<String>,
    #[serde(default)]
    pub negate_amount: bool,
}

/// Checker verdict on a pending pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    #[serde(alias = "APPROVE")]
    Approved,
    #[serde(alias = "REJECT")]
    Rejected,
}

impl Decision {
    pub fn target_status(&self) -> PatternStatus {
        match self {
            Decision::Approved => PatternStatus::Active,
            Decision::Rejected => PatternStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub status: Decision,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprecateRequest {
    pub superseded_by: Option<Uuid>,
    pub note: Option<String>,
}

/// One row of a pattern's status audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PatternHistory {
    pub id: Uuid,
    pub pattern_id: Uuid,
    pub from_status: Option<PatternStatus>,
    pub to_status: PatternStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Distinct sender address with at least one active pattern.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankAddressInfo {
    pub address: String,
    pub bank_name: String,
}

/// Operator-registered sender id variant, e.g. `VM-HDFCBK` → `HDFCBK`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BankAlias {
    pub alias: String,
    pub address: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBankAlias {
    #[validate(length(min = 1, max = 64))]
    pub alias: String,
    #[validate(length(min = 1, max = 64))]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatchRequest {
    #[serde(default)]
    pub regex_pattern: String,
    #[serde(default)]
    pub sample_message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestMatchResponse {
    pub success: bool,
    pub message: String,
    pub matched_text: Option<String>,
    /// Positional capture groups (1-based order), to help author a field map.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Option<String>>,
}
