//! Transaction Normalizer
//!
//! Converts heterogeneous source records (analysis output for documents,
//! bank-statement CSV lines) into the canonical transaction shapes.
//!
//! Parsing here is deliberately forgiving: a record with an unreadable
//! amount or date is kept with a defaulted value and logged as a data
//! quality problem, never dropped or turned into an error. Only the
//! company scope is allowed to be fatal, and that is enforced elsewhere.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use regex::Regex;
use rust_decimal::Decimal;
use std::io::Read;
use tracing::{debug, warn};

use crate::analysis::DocumentAnalysis;
use crate::error::{Error, Result};
use crate::models::{BankTransactionKind, NewBankTransaction, NewTransaction, TransactionKind};

/// Categories whose transactions count as income; everything else is an
/// expense. A heuristic, matched as a case-insensitive substring.
const INCOME_CATEGORIES: &[&str] = &[
    "servicii",
    "consultanta",
    "vanzari",
    "service",
    "consulting",
    "sales",
];

/// What to do when a record carries no parsable date.
///
/// Aggregation treats a missing date as "outside every period", so the
/// choice between these two is visible in reports and must be made by the
/// caller, never defaulted silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFallback {
    /// Use the given day (the document pipeline passes the upload day)
    Today(NaiveDate),
    /// Keep the record undated; it stays in counts but out of period sums
    Exclude,
}

/// Parse a free-text amount. Empty or non-numeric input yields zero and a
/// data-quality warning; the record is kept.
pub fn parse_amount(raw: &str) -> Decimal {
    match extract_amount(raw) {
        Some(amount) => amount,
        None => {
            if !raw.trim().is_empty() {
                warn!(raw, "Unparsable amount, defaulting to 0");
            }
            Decimal::ZERO
        }
    }
}

/// Extract the first numeric token from free text.
///
/// Handles thousands separators and both decimal comma and decimal point:
/// - when both separators appear, the rightmost one is the decimal mark
/// - a single comma followed by 1-2 digits is a decimal comma, otherwise
///   commas are grouping separators
/// - a single point is a decimal point; repeated points are grouping
pub fn extract_amount(raw: &str) -> Option<Decimal> {
    let token_re = Regex::new(r"-?\d[\d.,]*").expect("valid regex");
    let token = token_re.find(raw)?.as_str();
    // Trim trailing separators ("1.200," from sentence punctuation)
    let token = token.trim_end_matches(['.', ',']);

    let dot = token.rfind('.');
    let comma = token.rfind(',');
    let normalized = match (dot, comma) {
        (Some(d), Some(c)) if d > c => token.replace(',', ""),
        (Some(_), Some(_)) => token.replace('.', "").replace(',', "."),
        (None, Some(c)) => {
            let decimals = token.len() - c - 1;
            let single_comma = token.matches(',').count() == 1;
            if single_comma && (1..=2).contains(&decimals) {
                token.replace(',', ".")
            } else {
                token.replace(',', "")
            }
        }
        (Some(_), None) => {
            if token.matches('.').count() == 1 {
                token.to_string()
            } else {
                token.replace('.', "")
            }
        }
        (None, None) => token.to_string(),
    };

    normalized.parse::<Decimal>().ok()
}

/// Parse a date from free text, trying `DD.MM.YYYY`, `YYYY-MM-DD` and
/// `DD/MM/YYYY` in that order; the first matching pattern wins.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    // (pattern, year group, month group, day group)
    let patterns: [(&str, usize, usize, usize); 3] = [
        (r"(\d{2})\.(\d{2})\.(\d{4})", 3, 2, 1),
        (r"(\d{4})-(\d{2})-(\d{2})", 1, 2, 3),
        (r"(\d{2})/(\d{2})/(\d{4})", 3, 2, 1),
    ];

    for (pattern, y, m, d) in patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(caps) = re.captures(raw) {
            let year: i32 = caps[y].parse().ok()?;
            let month: u32 = caps[m].parse().ok()?;
            let day: u32 = caps[d].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }
    None
}

/// Resolve an optional raw date text against the caller's fallback policy
pub fn resolve_date(raw: Option<&str>, fallback: DateFallback) -> Option<NaiveDate> {
    let parsed = raw.and_then(parse_flexible_date);
    match (parsed, fallback) {
        (Some(date), _) => Some(date),
        (None, DateFallback::Today(today)) => {
            if raw.is_some_and(|r| !r.trim().is_empty()) {
                warn!(raw = raw.unwrap_or_default(), "Unparsable date, falling back to today");
            }
            Some(today)
        }
        (None, DateFallback::Exclude) => {
            if raw.is_some_and(|r| !r.trim().is_empty()) {
                warn!(raw = raw.unwrap_or_default(), "Unparsable date, record kept undated");
            }
            None
        }
    }
}

/// Infer income vs. expense from the category keyword set
pub fn infer_kind(category: &str) -> TransactionKind {
    let lowered = category.to_lowercase();
    if INCOME_CATEGORIES.iter().any(|c| lowered.contains(c)) {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

/// Build the canonical transaction for an analyzed document
pub fn transaction_from_analysis(
    analysis: &DocumentAnalysis,
    fallback: DateFallback,
) -> NewTransaction {
    NewTransaction {
        description: analysis.description.clone(),
        amount: parse_amount(&analysis.amount),
        kind: infer_kind(&analysis.category),
        category: Some(analysis.category.clone()),
        date: resolve_date(Some(analysis.document_date.as_str()), fallback),
    }
}

/// Parse bank statement lines from CSV.
///
/// Expected header: `Date,Description,Amount` with optional `Balance`,
/// `Reference`, `Counterparty` and `IBAN` columns in any order. Lines with
/// an unparsable date are kept undated; they still show up in listings
/// but never match inside a date window.
pub fn parse_statement_csv<R: Read>(reader: R) -> Result<Vec<NewBankTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let date_col = col("date").ok_or_else(|| Error::Import("Missing Date column".into()))?;
    let desc_col = col("description")
        .ok_or_else(|| Error::Import("Missing Description column".into()))?;
    let amount_col =
        col("amount").ok_or_else(|| Error::Import("Missing Amount column".into()))?;
    let balance_col = col("balance");
    let reference_col = col("reference");
    let counterparty_col = col("counterparty");
    let iban_col = col("iban");

    let mut lines = Vec::new();
    for result in rdr.records() {
        let record = result?;

        let description = record
            .get(desc_col)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import("Missing description".into()))?;

        let date = record
            .get(date_col)
            .and_then(|s| resolve_date(Some(s), DateFallback::Exclude));

        let amount = record.get(amount_col).map(parse_amount).unwrap_or_default();

        let balance = balance_col
            .and_then(|i| record.get(i))
            .and_then(extract_amount);

        let get_opt = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let kind = if amount < Decimal::ZERO {
            BankTransactionKind::Debit
        } else {
            BankTransactionKind::Credit
        };

        lines.push(NewBankTransaction {
            date,
            description,
            amount,
            balance,
            reference: get_opt(reference_col),
            kind,
            counterparty: get_opt(counterparty_col),
            iban: get_opt(iban_col),
        });
    }

    debug!("Parsed {} statement lines", lines.len());
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_amount_plain() {
        assert_eq!(extract_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(extract_amount("-123.45"), Some(dec("-123.45")));
        assert_eq!(extract_amount("Total: 99 RON"), Some(dec("99")));
    }

    #[test]
    fn test_extract_amount_separators() {
        // Decimal comma with thousands point
        assert_eq!(extract_amount("1.234,56"), Some(dec("1234.56")));
        // Decimal point with thousands comma
        assert_eq!(extract_amount("1,234.56"), Some(dec("1234.56")));
        // Lone decimal comma
        assert_eq!(extract_amount("12,5"), Some(dec("12.5")));
        // Grouping commas only
        assert_eq!(extract_amount("1,234,567"), Some(dec("1234567")));
        assert_eq!(extract_amount("1,234"), Some(dec("1234")));
        // Repeated points are grouping
        assert_eq!(extract_amount("1.234.567"), Some(dec("1234567")));
    }

    #[test]
    fn test_extract_amount_embedded() {
        assert_eq!(
            extract_amount("suma de 1.200,00 lei, TVA inclus"),
            Some(dec("1200.00"))
        );
        // First numeric token wins
        assert_eq!(extract_amount("2 x 150.00"), Some(dec("2")));
    }

    #[test]
    fn test_parse_amount_defaults_to_zero() {
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("no numbers here"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_flexible_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_flexible_date("15.03.2024"), Some(expected));
        assert_eq!(parse_flexible_date("2024-03-15"), Some(expected));
        assert_eq!(parse_flexible_date("15/03/2024"), Some(expected));
        assert_eq!(parse_flexible_date("Data emiterii: 15.03.2024"), Some(expected));
        assert_eq!(parse_flexible_date("not a date"), None);
    }

    #[test]
    fn test_parse_flexible_date_first_pattern_wins() {
        // Dotted pattern is tried before ISO
        assert_eq!(
            parse_flexible_date("01.02.2024 / 2024-12-31"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn test_resolve_date_fallbacks() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            resolve_date(Some("garbage"), DateFallback::Today(today)),
            Some(today)
        );
        assert_eq!(resolve_date(Some("garbage"), DateFallback::Exclude), None);
        assert_eq!(resolve_date(None, DateFallback::Exclude), None);
        assert_eq!(
            resolve_date(Some("05.03.2024"), DateFallback::Exclude),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("Servicii IT"), TransactionKind::Income);
        assert_eq!(infer_kind("consultanta fiscala"), TransactionKind::Income);
        assert_eq!(infer_kind("Vanzari produse"), TransactionKind::Income);
        assert_eq!(infer_kind("Consulting"), TransactionKind::Income);
        assert_eq!(infer_kind("Utilities"), TransactionKind::Expense);
        assert_eq!(infer_kind(""), TransactionKind::Expense);
    }

    #[test]
    fn test_parse_statement_csv() {
        let csv = "Date,Description,Amount,Balance,Counterparty,IBAN\n\
                   05.03.2024,INV-0042 payment,1200.00,5200.00,ACME SRL,RO49AAAA1B31007593840000\n\
                   06.03.2024,Office rent,-800.00,4400.00,Landlord SA,";

        let lines = parse_statement_csv(csv.as_bytes()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].amount, dec("1200.00"));
        assert_eq!(lines[0].kind, BankTransactionKind::Credit);
        assert_eq!(lines[0].counterparty.as_deref(), Some("ACME SRL"));
        assert_eq!(lines[0].date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(lines[1].kind, BankTransactionKind::Debit);
        assert_eq!(lines[1].iban, None);
    }

    #[test]
    fn test_parse_statement_csv_unparsable_date_kept() {
        let csv = "Date,Description,Amount\nsoon,Mystery line,50.00\n";
        let lines = parse_statement_csv(csv.as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].date, None);
        assert_eq!(lines[0].amount, dec("50.00"));
    }

    #[test]
    fn test_parse_statement_csv_missing_column() {
        let csv = "Date,Amount\n05.03.2024,10\n";
        assert!(parse_statement_csv(csv.as_bytes()).is_err());
    }
}
