//! Field-level parsing of captured SMS text: amounts, dates, account masks
//! and transaction type labels.
//!
//! Every parser is total over its input: failures come back as
//! [`FieldParseError`] and the engine degrades the field to unknown.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::models::transaction::TransactionType;

/// Fallback formats tried after a template's own formats.
pub const BUILTIN_DATE_FORMATS: [&str; 6] = [
    "%d-%b-%y",
    "%d/%m/%y",
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%d%b%y",
    "%d/%m/%Y",
];

/// Currency markers stripped before decimal parsing, longest first.
const CURRENCY_PREFIXES: [&str; 5] = ["inr", "rs.", "rs", "₹", "$"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldParseError {
    #[error("amount {0:?} is not a decimal number")]
    Amount(String),

    #[error("date {0:?} matches none of the accepted formats")]
    Date(String),

    #[error("account {0:?} contains no digits")]
    Account(String),
}

/// Parse a captured amount into an exact decimal.
///
/// `"INR 2,500.00"` → `2500.00`. Scale is preserved as written.
pub fn parse_amount(raw: &str) -> Result<Decimal, FieldParseError> {
    let mut text = raw.trim().to_lowercase();
    loop {
        let before = text.len();
        for prefix in CURRENCY_PREFIXES {
            if let Some(rest) = text.strip_prefix(prefix) {
                text = rest.trim_start().to_string();
            }
        }
        if text.len() == before {
            break;
        }
    }

    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return Err(FieldParseError::Amount(raw.to_string()));
    }

    Decimal::from_str(cleaned).map_err(|_| FieldParseError::Amount(raw.to_string()))
}

/// Parse a captured date with the template formats first, then the built-ins.
///
/// Date-only formats yield midnight.
pub fn parse_date(
    raw: &str,
    date_format: Option<&str>,
    alt_date_format: Option<&str>,
) -> Result<NaiveDateTime, FieldParseError> {
    let text = raw.trim();
    let formats = date_format
        .into_iter()
        .chain(alt_date_format)
        .chain(BUILTIN_DATE_FORMATS);

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return Ok(d.and_time(chrono::NaiveTime::MIN));
        }
    }

    Err(FieldParseError::Date(raw.to_string()))
}

/// Mask an account reference to `XX` plus its last four digits.
pub fn mask_account(raw: &str) -> Result<String, FieldParseError> {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(FieldParseError::Account(raw.to_string()));
    }
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    Ok(format!("XX{tail}"))
}

/// Map a captured type label onto a transaction type.
pub fn normalize_type(raw: &str) -> Option<TransactionType> {
    let label = raw.trim().to_lowercase();
    if label.starts_with("credit") || label == "received" || label == "deposited" {
        Some(TransactionType::Credited)
    } else if label.starts_with("debit") || label == "spent" || label == "withdrawn" {
        Some(TransactionType::Debited)
    } else if label.starts_with("alert") {
        Some(TransactionType::Alert)
    } else if label.starts_with("reminder") || label == "due" {
        Some(TransactionType::Reminder)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_strips_currency_and_separators() {
        assert_eq!(parse_amount("2,500.00").unwrap(), dec!(2500.00));
        assert_eq!(parse_amount("INR 2,500.00").unwrap(), dec!(2500.00));
        assert_eq!(parse_amount("Rs.500").unwrap(), dec!(500));
        assert_eq!(parse_amount("Rs 1,00,000.50").unwrap(), dec!(100000.50));
        assert_eq!(parse_amount("₹ 99.9").unwrap(), dec!(99.9));
        assert_eq!(parse_amount("500.").unwrap(), dec!(500));
    }

    #[test]
    fn amount_keeps_written_scale() {
        assert_eq!(parse_amount("2,500.00").unwrap().to_string(), "2500.00");
    }

    #[test]
    fn amount_rejects_garbage() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("Rs.").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn date_builtin_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date("10-Jan-26", None, None).unwrap(), expected);
        assert_eq!(parse_date("10/01/26", None, None).unwrap(), expected);
        assert_eq!(parse_date("2026-01-10", None, None).unwrap(), expected);
        assert_eq!(parse_date("10-Jan-2026", None, None).unwrap(), expected);
        assert_eq!(parse_date("10Jan26", None, None).unwrap(), expected);
        assert_eq!(parse_date("10/01/2026", None, None).unwrap(), expected);
    }

    #[test]
    fn date_template_format_wins() {
        let parsed = parse_date("01/10/26 14:30", Some("%m/%d/%y %H:%M"), None).unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2026, 1, 10)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn date_alt_format_used_after_primary() {
        let parsed = parse_date("20260110", Some("%d.%m.%Y"), Some("%Y%m%d")).unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());
    }

    #[test]
    fn date_unparseable() {
        assert!(matches!(
            parse_date("yesterday", None, None),
            Err(FieldParseError::Date(_))
        ));
    }

    #[test]
    fn account_masking() {
        assert_eq!(mask_account("5678").unwrap(), "XX5678");
        assert_eq!(mask_account("XX5678").unwrap(), "XX5678");
        assert_eq!(mask_account("123456789012").unwrap(), "XX9012");
        assert_eq!(mask_account("42").unwrap(), "XX42");
        assert!(mask_account("XXXX").is_err());
    }

    #[test]
    fn type_labels() {
        assert_eq!(normalize_type("Credited"), Some(TransactionType::Credited));
        assert_eq!(normalize_type("debit"), Some(TransactionType::Debited));
        assert_eq!(normalize_type("spent"), Some(TransactionType::Debited));
        assert_eq!(normalize_type("Reminder"), Some(TransactionType::Reminder));
        assert_eq!(normalize_type("due"), Some(TransactionType::Reminder));
        assert_eq!(normalize_type("ALERT"), Some(TransactionType::Alert));
        assert_eq!(normalize_type("transfer"), None);
    }
}
