//! Run pipeline and result assembly
//!
//! One call to [`execute`] is one complete run: navigate the listing,
//! parse each detail page, filter against the seen-set, persist the JSON
//! artifact, notify, and commit. The browser session is closed on every
//! exit path, and exactly one notification is sent per run.

use crate::browser::SessionDriver;
use crate::config::{ScrapeConfig, DETAIL_READY};
use crate::dedup::{SeenBackend, SeenStore};
use crate::error::{BrowserError, NavigationError, PersistenceError};
use crate::extraction::ReportParser;
use crate::model::{Report, RunOutcome, RunResult};
use crate::navigation::{RowDescriptor, SearchNavigator};
use crate::notify::Notifier;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Execute one complete run.
///
/// Never returns `Err`: systemic failures become the `ERROR` outcome so
/// the caller can map it to an exit code after the single notification
/// has gone out.
pub async fn execute<D, B, N>(
    driver: D,
    store: &mut SeenStore<B>,
    notifier: &N,
    config: &ScrapeConfig,
) -> RunResult
where
    D: SessionDriver,
    B: SeenBackend,
    N: Notifier,
{
    let (mut driver, extraction) = extract(driver, config).await;
    if let Err(e) = driver.close().await {
        warn!("Browser close failed: {}", e);
    }

    let (reports, parse_failures) = match extraction {
        Ok(parts) => parts,
        Err(e) => {
            error!("Run aborted: {}", e);
            return fail_run(e.to_string(), notifier, &config.data_dir);
        }
    };

    let identities: Vec<_> = reports.iter().map(|r| r.identity.clone()).collect();
    let fresh = store.filter_new(&identities);
    // Keys are consumed on first use, so a listing that repeats a report
    // collapses to one copy, in listing order.
    let mut fresh_keys: HashSet<String> = fresh.iter().map(|id| id.key()).collect();
    let new_reports: Vec<Report> = reports
        .into_iter()
        .filter(|r| fresh_keys.remove(&r.identity.key()))
        .collect();
    info!(
        "{} parsed, {} new, {} parse failures",
        identities.len(),
        new_reports.len(),
        parse_failures.len()
    );

    let run = RunResult::with_reports(new_reports, parse_failures);

    let artifact = match write_artifact(&config.data_dir, &run) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Artifact write failed: {}", e);
            return fail_run(e.to_string(), notifier, &config.data_dir);
        }
    };

    match run.outcome {
        RunOutcome::SuccessWithReports => match notifier.send_success(&run, &artifact) {
            Ok(()) => {
                // Seen only after confirmed delivery; a failed commit means
                // the same reports surface again next run (at-least-once).
                if let Err(e) = store.commit() {
                    error!("Seen-set commit failed, duplicates expected next run: {}", e);
                }
            }
            Err(e) => {
                warn!("Delivery failed, reports will re-surface next run: {}", e);
            }
        },
        RunOutcome::SuccessNoReports => {
            if let Err(e) = notifier.send_no_reports(&run) {
                warn!("Delivery failed: {}", e);
            }
        }
        RunOutcome::Error => unreachable!("assembler never produces ERROR here"),
    }

    run
}

/// Assemble, persist, and deliver the ERROR outcome for a systemic
/// failure.
///
/// Also used by the binary for failures before the pipeline can start
/// (seen-set locked or corrupt, browser launch failure), so those still
/// produce the run's single error notification and a best-effort
/// artifact. The seen-set is never touched on this path.
pub fn fail_run<N: Notifier>(detail: String, notifier: &N, data_dir: &Path) -> RunResult {
    let run = RunResult::from_error(detail);
    if let Err(e) = write_artifact(data_dir, &run) {
        warn!("Could not persist error artifact: {}", e);
    }
    if let Err(e) = notifier.send_error(run.error_detail.as_deref().unwrap_or_default()) {
        warn!("Error notification failed: {}", e);
    }
    run
}

/// Drive the listing and parse every detail page.
///
/// Report-level parse errors are recorded and skipped; navigation
/// failures abort. The driver is always handed back for closing.
async fn extract<D: SessionDriver>(
    driver: D,
    config: &ScrapeConfig,
) -> (D, Result<(Vec<Report>, Vec<String>), NavigationError>) {
    let mut nav = SearchNavigator::new(driver, &config.entry_url, config.step_timeout);

    if let Err(e) = nav.start().await {
        return (nav.into_driver(), Err(e));
    }

    let mut rows = Vec::new();
    loop {
        match nav.next_row().await {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(e) => return (nav.into_driver(), Err(e)),
        }
    }
    info!("Listing drained: {} rows", rows.len());

    let mut driver = nav.into_driver();
    let mut reports = Vec::new();
    let mut parse_failures = Vec::new();
    for row in rows {
        let document = match open_detail(&mut driver, &row, config).await {
            Ok(doc) => doc,
            Err(e) => return (driver, Err(e)),
        };
        match ReportParser::parse(&document, &row.detail_url) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("Skipping unparseable report {}: {}", row.detail_url, e);
                parse_failures.push(format!("{}: {}", row.detail_url, e));
            }
        }
    }

    (driver, Ok((reports, parse_failures)))
}

/// Load one detail page and capture its document
async fn open_detail<D: SessionDriver>(
    driver: &mut D,
    row: &RowDescriptor,
    config: &ScrapeConfig,
) -> Result<String, NavigationError> {
    let started = Instant::now();

    driver
        .open(&row.detail_url)
        .await
        .map_err(|e| detail_err(started, e))?;
    driver
        .wait_for(DETAIL_READY, config.step_timeout)
        .await
        .map_err(|e| detail_err(started, e))?;
    driver
        .current_document()
        .await
        .map_err(|e| detail_err(started, e))
}

fn detail_err(started: Instant, err: BrowserError) -> NavigationError {
    match err {
        BrowserError::Timeout(_) => NavigationError::Timeout {
            state: "DetailFetch",
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        BrowserError::ElementMissing(selector) => NavigationError::ControlMissing {
            state: "DetailFetch",
            selector,
        },
        other => NavigationError::Step {
            state: "DetailFetch",
            detail: other.to_string(),
        },
    }
}

/// Serialize a run to its timestamped JSON artifact file.
///
/// Returns the written bytes so the success notification can attach them.
pub fn write_artifact(data_dir: &Path, run: &RunResult) -> Result<Vec<u8>, PersistenceError> {
    std::fs::create_dir_all(data_dir).map_err(|e| PersistenceError::Io {
        path: data_dir.display().to_string(),
        source: e,
    })?;

    let bytes = serde_json::to_vec_pretty(run).map_err(|e| PersistenceError::Corrupt {
        path: data_dir.display().to_string(),
        detail: e.to_string(),
    })?;

    let path = artifact_path(data_dir, run);
    std::fs::write(&path, &bytes).map_err(|e| PersistenceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("Run artifact written to {}", path.display());

    Ok(bytes)
}

fn artifact_path(data_dir: &Path, run: &RunResult) -> PathBuf {
    data_dir.join(format!(
        "ptr-run-{}.json",
        run.generated_at.format("%Y%m%d-%H%M%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunResult;

    #[test]
    fn test_artifact_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunResult::with_reports(Vec::new(), Vec::new());

        let bytes = write_artifact(dir.path(), &run).unwrap();
        let back: RunResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.outcome, RunOutcome::SuccessNoReports);

        let path = artifact_path(dir.path(), &run);
        assert!(path.exists());
        let on_disk: RunResult =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.outcome, back.outcome);
    }

    #[test]
    fn test_artifact_filename_is_timestamped() {
        let run = RunResult::with_reports(Vec::new(), Vec::new());
        let path = artifact_path(Path::new("data"), &run);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ptr-run-"));
        assert!(name.ends_with(".json"));
    }
}
