//! Data model for scraped disclosure reports
//!
//! Types here are immutable once assembled and serialize to the JSON
//! run-artifact schema: `{generated_at, outcome, reports: [...]}`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one filed report, unique by (filer_id, report_date, report_url)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportIdentity {
    /// Display name of the filer as shown on the report
    pub filer_name: String,
    /// Stable filer identifier
    pub filer_id: String,
    /// Date the report was filed
    pub report_date: NaiveDate,
    /// Absolute URL of the report detail page
    pub report_url: String,
}

impl ReportIdentity {
    /// Stable string key used by the seen-set
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.filer_id, self.report_date, self.report_url)
    }
}

/// Kind of a disclosed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Security purchase
    Purchase,
    /// Security sale (full or partial)
    Sale,
    /// Exchange of one security for another
    Exchange,
    /// Anything the normalizer did not recognize
    Unknown,
}

/// Dollar range of a transaction, as disclosed in brackets
///
/// Bounds are left unset when the source text was malformed; the row
/// carries a warning instead of failing the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    /// Lower bound in whole dollars
    pub lower: Option<u64>,
    /// Upper bound in whole dollars; open-ended ranges leave this unset
    pub upper: Option<u64>,
    /// ISO currency code
    pub currency: String,
}

impl AmountRange {
    /// A range with both bounds unset (malformed source text)
    pub fn unset() -> Self {
        Self {
            lower: None,
            upper: None,
            currency: "USD".to_string(),
        }
    }
}

/// One row of a report's transaction table, in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Owner of the asset (e.g. "Self", "Spouse", "Joint")
    pub owner: String,
    /// Ticker symbol, when disclosed
    pub ticker: String,
    /// Free-text asset description
    pub asset_name: String,
    /// Normalized transaction type
    pub transaction_type: TransactionType,
    /// Transaction date; unset when the source text did not parse
    pub transaction_date: Option<NaiveDate>,
    /// Disclosed dollar range
    pub amount: AmountRange,
    /// Optional free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// One parsed report: identity plus its ordered transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Report identity
    pub identity: ReportIdentity,
    /// Transactions in source-table row order
    pub transactions: Vec<Transaction>,
    /// Row-level parse warnings, kept for audit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Terminal outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// At least one genuinely new report was extracted
    SuccessWithReports,
    /// Listing was empty or every candidate was already seen
    SuccessNoReports,
    /// A systemic failure aborted the run
    Error,
}

/// Terminal artifact of one execution, handed to the notifier and
/// persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// When the run finished assembling
    pub generated_at: DateTime<Utc>,
    /// Run outcome
    pub outcome: RunOutcome,
    /// New reports only (already-seen reports are filtered out)
    pub reports: Vec<Report>,
    /// Report-level parse failures; skipped reports are never dropped
    /// without trace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_failures: Vec<String>,
    /// Detail of the systemic failure, for ERROR outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RunResult {
    /// Assemble a result from the filtered new reports
    pub fn with_reports(reports: Vec<Report>, parse_failures: Vec<String>) -> Self {
        let outcome = if reports.is_empty() {
            RunOutcome::SuccessNoReports
        } else {
            RunOutcome::SuccessWithReports
        };
        Self {
            generated_at: Utc::now(),
            outcome,
            reports,
            parse_failures,
            error_detail: None,
        }
    }

    /// Assemble an ERROR result from a systemic failure
    pub fn from_error(detail: String) -> Self {
        Self {
            generated_at: Utc::now(),
            outcome: RunOutcome::Error,
            reports: Vec::new(),
            parse_failures: Vec::new(),
            error_detail: Some(detail),
        }
    }

    /// Total transaction count across all reports
    pub fn transaction_count(&self) -> usize {
        self.reports.iter().map(|r| r.transactions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ReportIdentity {
        ReportIdentity {
            filer_name: "Doe, Jane".to_string(),
            filer_id: "c4b1e2d3".to_string(),
            report_date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
            report_url: "https://efdsearch.senate.gov/search/view/ptr/c4b1e2d3/".to_string(),
        }
    }

    #[test]
    fn test_identity_key() {
        assert_eq!(
            identity().key(),
            "c4b1e2d3|2026-08-30|https://efdsearch.senate.gov/search/view/ptr/c4b1e2d3/"
        );
    }

    #[test]
    fn test_outcome_serde_names() {
        let json = serde_json::to_string(&RunOutcome::SuccessWithReports).unwrap();
        assert_eq!(json, "\"SUCCESS_WITH_REPORTS\"");
        let json = serde_json::to_string(&RunOutcome::SuccessNoReports).unwrap();
        assert_eq!(json, "\"SUCCESS_NO_REPORTS\"");
        let json = serde_json::to_string(&RunOutcome::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
    }

    #[test]
    fn test_transaction_type_serde_names() {
        let json = serde_json::to_string(&TransactionType::Purchase).unwrap();
        assert_eq!(json, "\"purchase\"");
        let json = serde_json::to_string(&TransactionType::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }

    #[test]
    fn test_run_result_outcome_selection() {
        let empty = RunResult::with_reports(Vec::new(), Vec::new());
        assert_eq!(empty.outcome, RunOutcome::SuccessNoReports);

        let report = Report {
            identity: identity(),
            transactions: Vec::new(),
            warnings: Vec::new(),
        };
        let nonempty = RunResult::with_reports(vec![report], Vec::new());
        assert_eq!(nonempty.outcome, RunOutcome::SuccessWithReports);
    }

    #[test]
    fn test_run_result_round_trip() {
        let report = Report {
            identity: identity(),
            transactions: vec![Transaction {
                owner: "Self".to_string(),
                ticker: "AAPL".to_string(),
                asset_name: "Apple Inc.".to_string(),
                transaction_type: TransactionType::Purchase,
                transaction_date: NaiveDate::from_ymd_opt(2026, 8, 29),
                amount: AmountRange {
                    lower: Some(1001),
                    upper: Some(15000),
                    currency: "USD".to_string(),
                },
                comment: None,
            }],
            warnings: vec!["row 2: malformed amount".to_string()],
        };
        let run = RunResult::with_reports(vec![report], Vec::new());

        let json = serde_json::to_vec(&run).unwrap();
        let back: RunResult = serde_json::from_slice(&json).unwrap();

        assert_eq!(back.outcome, run.outcome);
        assert_eq!(back.reports.len(), 1);
        assert_eq!(back.reports[0].identity, run.reports[0].identity);
        assert_eq!(back.reports[0].transactions, run.reports[0].transactions);
        assert_eq!(back.transaction_count(), 1);
    }
}
