//! Match and extraction engine.
//!
//! Candidates come from the published active set in priority order; the
//! first pattern whose regex finds a match anywhere in the SMS wins. Fields
//! the template does not provide, or whose text does not parse, are left
//! unknown.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::category::Category;
use crate::models::pattern::{Field, GroupRef, Pattern};
use crate::models::transaction::{AmountSign, Transaction, TransactionType};
use crate::services::classifier::Classifier;
use crate::services::extraction::{self, FieldParseError};
use crate::services::regex_cache::RegexCache;
use crate::services::registry::PatternRegistry;

pub const REASON_NO_PATTERN: &str = "no active pattern for address";
pub const REASON_NO_MATCH: &str = "no active pattern matched";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedResult {
    pub bank_address: String,
    pub sms_message: String,
    pub reason: String,
    pub candidates_tried: usize,
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Matched(Transaction),
    Unmatched(UnmatchedResult),
}

/// Field values pulled from one match, before the transaction is assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub merchant: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDateTime>,
    pub account_number: Option<String>,
    pub balance: Option<Decimal>,
    pub ref_number: Option<String>,
    pub transaction_type: Option<TransactionType>,
}

/// The group a field is read from: the explicit mapping, else a named group
/// following the conventional name.
fn group_for(pattern: &Pattern, regex: &Regex, field: Field) -> Option<GroupRef> {
    if let Some(group) = pattern.field_map.get(field) {
        return Some(group.clone());
    }
    let conventional = field.conventional_group();
    regex
        .capture_names()
        .flatten()
        .any(|name| name == conventional)
        .then(|| GroupRef::Name(conventional.to_string()))
}

fn captured<'h>(caps: &Captures<'h>, group: &GroupRef) -> Option<&'h str> {
    let m = match group {
        GroupRef::Index(i) => caps.get(*i),
        GroupRef::Name(name) => caps.name(name),
    }?;
    let text = m.as_str().trim();
    (!text.is_empty()).then_some(text)
}

/// Check that every mapped group exists in the compiled regex.
pub fn check_field_map(pattern: &Pattern, regex: &Regex) -> Result<(), String> {
    for (field, group) in pattern.field_map.iter() {
        let exists = match group {
            GroupRef::Index(i) => *i < regex.captures_len(),
            GroupRef::Name(name) => regex.capture_names().flatten().any(|n| n == name),
        };
        if !exists {
            return Err(format!(
                "field {field:?} maps to capture group {group:?}, which the regex does not define"
            ));
        }
    }
    Ok(())
}

fn degrade<T>(pattern_id: Uuid, result: Result<T, FieldParseError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(pattern_id = %pattern_id, error = %e, "Field left unknown");
            None
        }
    }
}

/// Run `pattern` against `sms`; `None` when the regex finds no match.
pub fn extract(pattern: &Pattern, regex: &Regex, sms: &str) -> Option<Extracted> {
    let caps = regex.captures(sms)?;
    let text = |field: Field| {
        group_for(pattern, regex, field).and_then(|group| captured(&caps, &group))
    };

    let amount = text(Field::Amount)
        .and_then(|raw| degrade(pattern.id, extraction::parse_amount(raw)))
        .map(|a| if pattern.negate_amount { -a } else { a });
    let balance = text(Field::Balance)
        .and_then(|raw| degrade(pattern.id, extraction::parse_amount(raw)));
    let date = text(Field::Date).and_then(|raw| {
        degrade(
            pattern.id,
            extraction::parse_date(
                raw,
                pattern.date_format.as_deref(),
                pattern.alt_date_format.as_deref(),
            ),
        )
    });
    let account_number = text(Field::Account)
        .and_then(|raw| degrade(pattern.id, extraction::mask_account(raw)));
    let transaction_type = text(Field::Type).and_then(extraction::normalize_type);

    Some(Extracted {
        merchant: text(Field::Merchant)
            .map(str::to_string)
            .or_else(|| pattern.merchant_name.clone()),
        amount,
        date,
        account_number,
        balance,
        ref_number: text(Field::RefNumber).map(str::to_string),
        transaction_type,
    })
}

/// First candidate, in the given order, whose regex matches `sms`.
pub fn first_match(
    candidates: &[Arc<Pattern>],
    cache: &RegexCache,
    sms: &str,
) -> Option<(Arc<Pattern>, Extracted)> {
    for pattern in candidates {
        let regex = match cache.compile(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!(pattern_id = %pattern.id, error = %e, "Skipping active pattern that no longer compiles");
                continue;
            }
        };
        if let Some(extracted) = extract(pattern, &regex, sms) {
            return Some((Arc::clone(pattern), extracted));
        }
    }
    None
}

/// Parse one SMS against the active patterns for `bank_address`.
pub async fn parse(
    registry: &PatternRegistry,
    classifier: &dyn Classifier,
    sms: &str,
    bank_address: &str,
    submitted_by: Uuid,
) -> ParseOutcome {
    let address = bank_address.trim();
    let candidates = registry.resolve(address);
    let unmatched = |reason: &str| {
        ParseOutcome::Unmatched(UnmatchedResult {
            bank_address: address.to_string(),
            sms_message: sms.to_string(),
            reason: reason.to_string(),
            candidates_tried: candidates.len(),
        })
    };

    if candidates.is_empty() {
        tracing::info!(bank_address = %address, reason = REASON_NO_PATTERN, "SMS not parsed");
        return unmatched(REASON_NO_PATTERN);
    }

    let Some((pattern, extracted)) = first_match(&candidates, registry.cache(), sms) else {
        tracing::info!(
            bank_address = %address,
            candidates = candidates.len(),
            reason = REASON_NO_MATCH,
            "SMS not parsed"
        );
        return unmatched(REASON_NO_MATCH);
    };

    let category = match pattern.category {
        Some(category) => category,
        None => match classifier.classify(extracted.merchant.as_deref(), sms).await {
            Ok(category) => category,
            Err(e) => {
                tracing::warn!(pattern_id = %pattern.id, error = %e, "Classification failed; using UNCATEGORIZED");
                Category::Uncategorized
            }
        },
    };

    let transaction_type = extracted.transaction_type.unwrap_or(pattern.pattern_type);
    tracing::debug!(pattern_id = %pattern.id, bank_address = %address, "SMS matched");

    ParseOutcome::Matched(Transaction {
        id: Uuid::new_v4(),
        merchant: extracted.merchant,
        amount: extracted.amount,
        amount_sign: AmountSign::derive(transaction_type, extracted.amount),
        transaction_type,
        date: extracted.date,
        bank_name: pattern.bank_name.clone(),
        bank_address: address.to_string(),
        account_number: extracted.account_number,
        balance: extracted.balance,
        ref_number: extracted.ref_number,
        category,
        sms_message: sms.to_string(),
        matched_pattern_id: pattern.id,
        submitted_by,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use crate::models::pattern::{CreatePattern, FieldMap, PatternStatus};
    use crate::services::regex_cache::compile_regex;

    const HDFC_REGEX: &str = r"A/c XX(\d+) debited for INR ([0-9,.]+) on (\d{2}-\w{3}-\d{2})";
    const HDFC_SMS: &str = "A/c XX5678 debited for INR 2,500.00 on 10-Jan-26";

    fn pattern(regex: &str, field_map: FieldMap) -> Pattern {
        let input: CreatePattern = serde_json::from_value(serde_json::json!({
            "bankAddress": "HDFCBK",
            "bankName": "HDFC Bank",
            "type": "DEBITED",
            "regexPattern": regex,
            "message": HDFC_SMS
        }))
        .unwrap();
        let mut p = Pattern::from_input(&input, Uuid::new_v4(), PatternStatus::Active);
        p.field_map = field_map;
        p
    }

    fn hdfc_map() -> FieldMap {
        FieldMap::new()
            .with(Field::Account, GroupRef::Index(1))
            .with(Field::Amount, GroupRef::Index(2))
            .with(Field::Date, GroupRef::Index(3))
    }

    #[test]
    fn extracts_positional_groups() {
        let p = pattern(HDFC_REGEX, hdfc_map());
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let e = extract(&p, &re, HDFC_SMS).unwrap();

        assert_eq!(e.account_number.as_deref(), Some("XX5678"));
        assert_eq!(e.amount, Some(dec!(2500.00)));
        assert_eq!(
            e.date,
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(e.balance, None);
        assert_eq!(e.merchant, None);
    }

    #[test]
    fn find_semantics_match_inside_longer_text() {
        let p = pattern(HDFC_REGEX, hdfc_map());
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let sms = format!("Dear customer, {HDFC_SMS}. Not you? Call 1800");
        assert!(extract(&p, &re, &sms).is_some());
    }

    #[test]
    fn named_groups_follow_convention() {
        let p = pattern(
            r"(?P<amount>[\d,.]+) spent at (?P<merchant>[A-Z ]+?) on (?P<date>\d{4}-\d{2}-\d{2})\. Avl bal (?P<balance>[\d,.]+)",
            FieldMap::new(),
        );
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let e = extract(&p, &re, "1,200.50 spent at SWIGGY on 2026-02-01. Avl bal 9,000.00").unwrap();

        assert_eq!(e.amount, Some(dec!(1200.50)));
        assert_eq!(e.merchant.as_deref(), Some("SWIGGY"));
        assert_eq!(e.balance, Some(dec!(9000.00)));
        assert!(e.date.is_some());
    }

    #[test]
    fn unparseable_date_is_unknown_not_error() {
        let p = pattern(
            r"debited (?P<amount>[\d.]+) on (?P<date>\S+)",
            FieldMap::new(),
        );
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let e = extract(&p, &re, "debited 10.00 on someday").unwrap();
        assert_eq!(e.amount, Some(dec!(10.00)));
        assert_eq!(e.date, None);
    }

    #[test]
    fn negate_amount_flips_sign() {
        let mut p = pattern(r"refund of (?P<amount>[\d.]+)", FieldMap::new());
        p.negate_amount = true;
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let e = extract(&p, &re, "refund of 99.00").unwrap();
        assert_eq!(e.amount, Some(dec!(-99.00)));
    }

    #[test]
    fn type_group_overrides_template_type() {
        let p = pattern(r"INR (?P<amount>[\d.]+) (?P<type>credited|debited)", FieldMap::new());
        let re = compile_regex(&p.regex_pattern, 1 << 20).unwrap();
        let e = extract(&p, &re, "INR 5.00 Credited").unwrap();
        assert_eq!(e.transaction_type, Some(TransactionType::Credited));
    }

    #[test]
    fn field_map_check_rejects_missing_groups() {
        let ok = pattern(HDFC_REGEX, hdfc_map());
        let re = compile_regex(&ok.regex_pattern, 1 << 20).unwrap();
        assert!(check_field_map(&ok, &re).is_ok());

        let bad = pattern(HDFC_REGEX, hdfc_map().with(Field::Balance, GroupRef::Index(4)));
        assert!(check_field_map(&bad, &re).is_err());

        let bad_name = pattern(
            HDFC_REGEX,
            FieldMap::new().with(Field::Merchant, GroupRef::Name("shop".into())),
        );
        assert!(check_field_map(&bad_name, &re).is_err());
    }

    #[test]
    fn first_match_respects_candidate_order() {
        let cache = RegexCache::new(1 << 20);
        let broad = Arc::new(pattern(r"debited", FieldMap::new()));
        let exact = Arc::new(pattern(HDFC_REGEX, hdfc_map()));
        let never = Arc::new(pattern(r"credited to", FieldMap::new()));

        let (winner, _) =
            first_match(&[never.clone(), exact.clone(), broad.clone()], &cache, HDFC_SMS).unwrap();
        assert_eq!(winner.id, exact.id);

        let (winner, _) = first_match(&[broad.clone(), exact], &cache, HDFC_SMS).unwrap();
        assert_eq!(winner.id, broad.id);

        assert!(first_match(&[never], &cache, HDFC_SMS).is_none());
    }
}
