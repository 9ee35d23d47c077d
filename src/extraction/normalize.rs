//! Cell-level normalizers for transaction rows
//!
//! Disclosure filings are free text and inconsistently formatted, so
//! every normalizer here recovers with a warning instead of failing the
//! surrounding report.

use crate::model::{AmountRange, TransactionType};
use chrono::NaiveDate;
use std::sync::OnceLock;

fn range_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    // Tolerates newlines and stray whitespace around the dash, e.g.
    // "$1,001 -\n$15,000"
    RE.get_or_init(|| {
        regex::Regex::new(r"\$\s*([0-9][0-9,]*)\s*[-\u{2013}]\s*\$?\s*([0-9][0-9,]*)").unwrap()
    })
}

fn over_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(?i)over\s*\$\s*([0-9][0-9,]*)").unwrap())
}

fn digits(text: &str) -> Option<u64> {
    text.replace(',', "").parse().ok()
}

/// Parse a bracketed dollar range like `"$1,001 - $15,000"`.
///
/// Open-ended brackets ("Over $50,000,000") yield a lower bound only.
/// Malformed text returns unset bounds plus a warning.
pub fn parse_amount_range(text: &str) -> (AmountRange, Option<String>) {
    let trimmed = text.trim();

    if let Some(caps) = range_re().captures(trimmed) {
        let lower = digits(&caps[1]);
        let upper = digits(&caps[2]);
        if let (Some(lower), Some(upper)) = (lower, upper) {
            return (
                AmountRange {
                    lower: Some(lower),
                    upper: Some(upper),
                    currency: "USD".to_string(),
                },
                None,
            );
        }
    }

    if let Some(caps) = over_re().captures(trimmed) {
        if let Some(lower) = digits(&caps[1]) {
            return (
                AmountRange {
                    lower: Some(lower),
                    upper: None,
                    currency: "USD".to_string(),
                },
                None,
            );
        }
    }

    (
        AmountRange::unset(),
        Some(format!("malformed amount range {trimmed:?}")),
    )
}

/// Parse a date cell, tolerant of `MM/DD/YYYY` and `YYYY-MM-DD`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Normalize a transaction-type cell against the fixed enum.
///
/// Unrecognized values map to `Unknown`; the caller records a warning
/// but keeps the row.
pub fn parse_transaction_type(text: &str) -> TransactionType {
    let lower = text.trim().to_lowercase();
    if lower.starts_with("purchase") || lower.starts_with("buy") {
        TransactionType::Purchase
    } else if lower.starts_with("sale") || lower.starts_with("sell") {
        TransactionType::Sale
    } else if lower.starts_with("exchange") {
        TransactionType::Exchange
    } else {
        TransactionType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_range_plain() {
        let (range, warning) = parse_amount_range("$1,001 - $15,000");
        assert_eq!(range.lower, Some(1001));
        assert_eq!(range.upper, Some(15000));
        assert_eq!(range.currency, "USD");
        assert!(warning.is_none());
    }

    #[test]
    fn test_amount_range_newline_between_bounds() {
        let (range, warning) = parse_amount_range("$1,001 -\n$15,000");
        assert_eq!(range.lower, Some(1001));
        assert_eq!(range.upper, Some(15000));
        assert_eq!(range.currency, "USD");
        assert!(warning.is_none());
    }

    #[test]
    fn test_amount_range_large_bracket() {
        let (range, warning) = parse_amount_range("$1,000,001 - $5,000,000");
        assert_eq!(range.lower, Some(1_000_001));
        assert_eq!(range.upper, Some(5_000_000));
        assert!(warning.is_none());
    }

    #[test]
    fn test_amount_range_open_ended() {
        let (range, warning) = parse_amount_range("Over $50,000,000");
        assert_eq!(range.lower, Some(50_000_000));
        assert_eq!(range.upper, None);
        assert!(warning.is_none());
    }

    #[test]
    fn test_amount_range_malformed_warns() {
        let (range, warning) = parse_amount_range("N/A");
        assert_eq!(range.lower, None);
        assert_eq!(range.upper, None);
        assert!(warning.unwrap().contains("N/A"));
    }

    #[test]
    fn test_amount_range_empty_warns() {
        let (range, warning) = parse_amount_range("  ");
        assert_eq!(range, AmountRange::unset());
        assert!(warning.is_some());
    }

    #[test]
    fn test_date_two_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(parse_date("08/29/2026"), Some(expected));
        assert_eq!(parse_date("2026-08-29"), Some(expected));
        assert_eq!(parse_date(" 08/29/2026 "), Some(expected));
        assert_eq!(parse_date("29 August 2026"), None);
    }

    #[test]
    fn test_transaction_type_case_insensitive() {
        assert_eq!(parse_transaction_type("Purchase"), TransactionType::Purchase);
        assert_eq!(parse_transaction_type("PURCHASE"), TransactionType::Purchase);
        assert_eq!(parse_transaction_type("Sale (Full)"), TransactionType::Sale);
        assert_eq!(
            parse_transaction_type("sale (partial)"),
            TransactionType::Sale
        );
        assert_eq!(parse_transaction_type("Exchange"), TransactionType::Exchange);
    }

    #[test]
    fn test_transaction_type_unknown() {
        assert_eq!(parse_transaction_type("Gift"), TransactionType::Unknown);
        assert_eq!(parse_transaction_type(""), TransactionType::Unknown);
    }
}
