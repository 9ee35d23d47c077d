//! Report detail-page parser
//!
//! Converts one already-fetched detail document into a typed [`Report`].
//! Missing filer name or filed date is a hard [`ParseError`]; everything
//! at the row level degrades to a recorded warning so a few malformed
//! rows never discard an otherwise-valid report. The parser performs no
//! network calls.

use crate::error::ParseError;
use crate::extraction::normalize;
use crate::model::{Report, ReportIdentity, Transaction, TransactionType};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Labels accepted for the filer name field
const NAME_LABELS: &[&str] = &["Name", "Filer"];
/// Labels accepted for the filed-date field
const DATE_LABELS: &[&str] = &["Date Filed", "Date Received", "Filed"];
/// Labels accepted for the filer id field
const ID_LABELS: &[&str] = &["Filer ID", "Filer Id"];

/// Detail-page parser
pub struct ReportParser;

impl ReportParser {
    /// Parse one detail document into a report.
    ///
    /// `source_url` becomes the identity's `report_url` and supplies the
    /// filer-id fallback (trailing path segment) when the page carries no
    /// labeled id.
    pub fn parse(document: &str, source_url: &str) -> Result<Report, ParseError> {
        if document.trim().is_empty() {
            return Err(ParseError::EmptyDocument);
        }
        let html = Html::parse_document(document);

        let filer_name = labeled_field(&html, NAME_LABELS)
            .ok_or(ParseError::MissingField("filer name"))?;

        let date_raw = labeled_field(&html, DATE_LABELS)
            .ok_or(ParseError::MissingField("report date"))?;
        let report_date =
            normalize::parse_date(&date_raw).ok_or_else(|| ParseError::MalformedField {
                field: "report date",
                value: date_raw,
            })?;

        let filer_id = labeled_field(&html, ID_LABELS)
            .or_else(|| trailing_path_segment(source_url))
            .filter(|id| !id.is_empty())
            .ok_or(ParseError::MissingField("filer id"))?;

        let identity = ReportIdentity {
            filer_name,
            filer_id,
            report_date,
            report_url: source_url.to_string(),
        };

        let mut warnings = Vec::new();
        let transactions = parse_transactions(&html, &mut warnings);
        debug!(
            "Parsed report for {}: {} transactions, {} warnings",
            identity.filer_name,
            transactions.len(),
            warnings.len()
        );

        Ok(Report {
            identity,
            transactions,
            warnings,
        })
    }
}

/// Value of a labeled field, matched case-insensitively.
///
/// Supports both inline `<strong>Label:</strong> value` markup and
/// `<th>Label</th><td>value</td>` table rows.
fn labeled_field(html: &Html, labels: &[&str]) -> Option<String> {
    let strong_sel = Selector::parse("strong, b").unwrap();
    for el in html.select(&strong_sel) {
        let label_text: String = el.text().collect();
        let label = label_text.trim().trim_end_matches(':').trim();
        if !labels.iter().any(|l| label.eq_ignore_ascii_case(l)) {
            continue;
        }
        let Some(parent) = el.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let full: String = parent.text().collect();
        let value = full
            .replacen(label_text.trim(), "", 1)
            .trim()
            .trim_start_matches(':')
            .trim()
            .to_string();
        if !value.is_empty() {
            return Some(value);
        }
    }

    let row_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    for row in html.select(&row_sel) {
        let Some(th) = row.select(&th_sel).next() else {
            continue;
        };
        let label_text: String = th.text().collect();
        let label = label_text.trim().trim_end_matches(':');
        if !labels.iter().any(|l| label.eq_ignore_ascii_case(l)) {
            continue;
        }
        if let Some(td) = row.select(&td_sel).next() {
            let value = td.text().collect::<String>().trim().to_string();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Last non-empty path segment of the report URL
fn trailing_path_segment(source_url: &str) -> Option<String> {
    let path = source_url.split(['?', '#']).next().unwrap_or(source_url);
    path.rsplit('/')
        .find(|seg| !seg.is_empty() && !seg.contains("://"))
        .map(|seg| seg.to_string())
}

/// Parse the transaction table, if any, in source-row order.
///
/// Expected columns: row index, transaction date, owner, ticker, asset
/// name, type, amount, optional comment.
fn parse_transactions(html: &Html, warnings: &mut Vec<String>) -> Vec<Transaction> {
    let Some(table) = find_transaction_table(html) else {
        warnings.push("no transaction table found".to_string());
        return Vec::new();
    };

    let row_sel = Selector::parse("tbody tr, tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let mut transactions = Vec::new();
    let mut row_no = 0usize;
    for row in table.select(&row_sel) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();
        if cells.is_empty() {
            // header row
            continue;
        }
        row_no += 1;

        if cells.len() < 7 {
            warnings.push(format!(
                "row {}: expected at least 7 columns, got {}",
                row_no,
                cells.len()
            ));
            continue;
        }

        let transaction_date = normalize::parse_date(&cells[1]);
        if transaction_date.is_none() {
            warnings.push(format!("row {}: unparseable date {:?}", row_no, cells[1]));
        }

        let transaction_type = normalize::parse_transaction_type(&cells[5]);
        if transaction_type == TransactionType::Unknown {
            warnings.push(format!(
                "row {}: unrecognized transaction type {:?}",
                row_no, cells[5]
            ));
        }

        let (amount, amount_warning) = normalize::parse_amount_range(&cells[6]);
        if let Some(w) = amount_warning {
            warnings.push(format!("row {row_no}: {w}"));
        }

        transactions.push(Transaction {
            owner: cells[2].clone(),
            ticker: cells[3].clone(),
            asset_name: cells[4].clone(),
            transaction_type,
            transaction_date,
            amount,
            comment: cells.get(7).filter(|c| !c.is_empty()).cloned(),
        });
    }
    transactions
}

/// The table whose header mentions an Amount column
fn find_transaction_table(html: &Html) -> Option<ElementRef<'_>> {
    let table_sel = Selector::parse("table").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    html.select(&table_sel).find(|table| {
        table
            .select(&th_sel)
            .any(|th| th.text().collect::<String>().contains("Amount"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionType;
    use chrono::NaiveDate;

    const DETAIL_URL: &str = "https://efdsearch.senate.gov/search/view/ptr/c4b1e2d3/";

    fn detail_page(rows: &str) -> String {
        format!(
            r#"
            <section class="filedReport">
              <h2>Periodic Transaction Report</h2>
              <div><strong>Name:</strong> Doe, Jane</div>
              <div><strong>Date Filed:</strong> 08/30/2026</div>
              <table class="table">
                <thead><tr>
                  <th>#</th><th>Transaction Date</th><th>Owner</th><th>Ticker</th>
                  <th>Asset Name</th><th>Transaction Type</th><th>Amount</th><th>Comment</th>
                </tr></thead>
                <tbody>{rows}</tbody>
              </table>
            </section>
            "#
        )
    }

    const GOOD_ROW: &str = r#"
        <tr><td>1</td><td>08/29/2026</td><td>Self</td><td>AAPL</td>
        <td>Apple Inc.</td><td>Purchase</td><td>$1,001 - $15,000</td><td></td></tr>
    "#;

    #[test]
    fn test_parse_full_report() {
        let report = ReportParser::parse(&detail_page(GOOD_ROW), DETAIL_URL).unwrap();

        assert_eq!(report.identity.filer_name, "Doe, Jane");
        assert_eq!(report.identity.filer_id, "c4b1e2d3");
        assert_eq!(
            report.identity.report_date,
            NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()
        );
        assert_eq!(report.identity.report_url, DETAIL_URL);
        assert!(report.warnings.is_empty());

        assert_eq!(report.transactions.len(), 1);
        let tx = &report.transactions[0];
        assert_eq!(tx.owner, "Self");
        assert_eq!(tx.ticker, "AAPL");
        assert_eq!(tx.asset_name, "Apple Inc.");
        assert_eq!(tx.transaction_type, TransactionType::Purchase);
        assert_eq!(
            tx.transaction_date,
            NaiveDate::from_ymd_opt(2026, 8, 29)
        );
        assert_eq!(tx.amount.lower, Some(1001));
        assert_eq!(tx.amount.upper, Some(15000));
        assert!(tx.comment.is_none());
    }

    #[test]
    fn test_labeled_id_beats_url_fallback() {
        let page = detail_page(GOOD_ROW)
            .replace("</h2>", "</h2><div><strong>Filer ID:</strong> S000123</div>");
        let report = ReportParser::parse(&page, DETAIL_URL).unwrap();
        assert_eq!(report.identity.filer_id, "S000123");
    }

    #[test]
    fn test_missing_name_is_hard_error() {
        let page = detail_page(GOOD_ROW).replace("Name:", "Nickname:");
        let err = ReportParser::parse(&page, DETAIL_URL).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("filer name")));
    }

    #[test]
    fn test_unparseable_report_date_is_hard_error() {
        let page = detail_page(GOOD_ROW).replace("08/30/2026", "sometime in August");
        let err = ReportParser::parse(&page, DETAIL_URL).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedField {
                field: "report date",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_document() {
        let err = ReportParser::parse("   ", DETAIL_URL).unwrap_err();
        assert!(matches!(err, ParseError::EmptyDocument));
    }

    #[test]
    fn test_malformed_rows_keep_report_with_warnings() {
        let rows = format!(
            r#"{GOOD_ROW}
            <tr><td>2</td><td>not a date</td><td>Spouse</td><td>--</td>
            <td>Mystery Fund</td><td>Gift</td><td>N/A</td><td></td></tr>
            <tr><td>3</td><td>08/29/2026</td></tr>
            "#
        );
        let report = ReportParser::parse(&detail_page(&rows), DETAIL_URL).unwrap();

        // Row 1 clean, row 2 kept with per-cell warnings, row 3 skipped
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.transactions[1].transaction_type, TransactionType::Unknown);
        assert!(report.transactions[1].transaction_date.is_none());
        assert_eq!(report.transactions[1].amount.lower, None);

        assert!(report.warnings.iter().any(|w| w.contains("row 2") && w.contains("date")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("row 2") && w.contains("transaction type")));
        assert!(report.warnings.iter().any(|w| w.contains("row 2") && w.contains("amount")));
        assert!(report.warnings.iter().any(|w| w.contains("row 3") && w.contains("columns")));
    }

    #[test]
    fn test_whitespace_split_amount_normalizes() {
        let rows = GOOD_ROW.replace("$1,001 - $15,000", "$1,001 -\n$15,000");
        let report = ReportParser::parse(&detail_page(&rows), DETAIL_URL).unwrap();
        let tx = &report.transactions[0];
        assert_eq!(tx.amount.lower, Some(1001));
        assert_eq!(tx.amount.upper, Some(15000));
        assert_eq!(tx.amount.currency, "USD");
    }

    #[test]
    fn test_th_td_labeled_fields() {
        let page = format!(
            r#"
            <table><tbody>
              <tr><th>Name</th><td>Smith, John</td></tr>
              <tr><th>Date Filed</th><td>2026-08-30</td></tr>
            </tbody></table>
            <table class="table">
              <thead><tr><th>#</th><th>Transaction Date</th><th>Owner</th><th>Ticker</th>
              <th>Asset Name</th><th>Transaction Type</th><th>Amount</th><th>Comment</th></tr></thead>
              <tbody>{GOOD_ROW}</tbody>
            </table>
            "#
        );
        let report = ReportParser::parse(&page, DETAIL_URL).unwrap();
        assert_eq!(report.identity.filer_name, "Smith, John");
        assert_eq!(
            report.identity.report_date,
            NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()
        );
    }

    #[test]
    fn test_no_transaction_table_warns_but_parses() {
        let page = r#"
            <div><strong>Name:</strong> Doe, Jane</div>
            <div><strong>Date Filed:</strong> 08/30/2026</div>
        "#;
        let report = ReportParser::parse(page, DETAIL_URL).unwrap();
        assert!(report.transactions.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("no transaction table")));
    }

    #[test]
    fn test_trailing_path_segment() {
        assert_eq!(
            trailing_path_segment("https://x.gov/search/view/ptr/abc123/"),
            Some("abc123".to_string())
        );
        assert_eq!(
            trailing_path_segment("https://x.gov/search/view/ptr/abc123/?page=2"),
            Some("abc123".to_string())
        );
    }
}
