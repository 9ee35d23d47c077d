//! ptr-watch CLI
//!
//! Runs one scrape of today's Periodic Transaction Reports and exits 0
//! for both success outcomes, 1 for a systemic failure. Scheduling is
//! external (cron or equivalent); SMTP credentials come from the
//! `PTRWATCH_*` environment.

use clap::Parser;
use ptr_watch::browser::{ChromeConfig, ChromeSession};
use ptr_watch::config::{EmailConfig, ScrapeConfig, DEFAULT_ENTRY_URL};
use ptr_watch::dedup::{JsonFileBackend, SeenStore};
use ptr_watch::model::RunOutcome;
use ptr_watch::notify::{EmailNotifier, LogNotifier, Notifier};
use std::path::PathBuf;
use std::time::Duration;

/// Senate PTR watcher
#[derive(Parser, Debug)]
#[command(name = "ptr-watch")]
#[command(version)]
#[command(about = "Scrape today's Periodic Transaction Reports and notify on new filings")]
struct Args {
    /// Entry URL of the disclosure search site
    #[arg(long, default_value = DEFAULT_ENTRY_URL)]
    entry_url: String,

    /// Per-step navigation timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Run the browser with a visible window
    #[arg(long)]
    no_headless: bool,

    /// Disable the Chrome sandbox (needed inside most containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Path to a Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Directory for run artifacts and the seen-set
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ScrapeConfig {
        entry_url: args.entry_url,
        step_timeout: Duration::from_secs(args.timeout_secs),
        headless: !args.no_headless,
        sandbox: !args.no_sandbox,
        chrome_path: args.chrome_path,
        data_dir: args.data_dir,
    };

    // The notifier exists before anything that can fail, so a locked
    // seen-set or a failed browser launch still produces the run's one
    // notification.
    let outcome = match EmailConfig::from_env() {
        Some(email) => run_once(&EmailNotifier::new(email), &config).await,
        None => {
            tracing::info!("No SMTP environment configured, logging outcomes only");
            run_once(&LogNotifier, &config).await
        }
    };

    if outcome == RunOutcome::Error {
        std::process::exit(1);
    }
}

async fn run_once<N: Notifier>(notifier: &N, config: &ScrapeConfig) -> RunOutcome {
    let mut store = match JsonFileBackend::open(config.seen_path()).and_then(SeenStore::new) {
        Ok(store) => store,
        Err(e) => {
            return ptr_watch::run::fail_run(e.to_string(), notifier, &config.data_dir).outcome;
        }
    };

    let session = match ChromeSession::launch(ChromeConfig {
        headless: config.headless,
        sandbox: config.sandbox,
        chrome_path: config.chrome_path.clone(),
        nav_timeout: config.step_timeout,
        ..ChromeConfig::default()
    })
    .await
    {
        Ok(session) => session,
        Err(e) => {
            return ptr_watch::run::fail_run(e.to_string(), notifier, &config.data_dir).outcome;
        }
    };

    let run = ptr_watch::run::execute(session, &mut store, notifier, config).await;
    tracing::info!(
        "Run complete: {:?}, {} new report(s)",
        run.outcome,
        run.reports.len()
    );
    run.outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_by_default_with_opt_out_flags() {
        let args = Args::try_parse_from(["ptr-watch"]).unwrap();
        assert!(!args.no_headless);
        assert!(!args.no_sandbox);

        let args = Args::try_parse_from(["ptr-watch", "--no-headless", "--no-sandbox"]).unwrap();
        assert!(args.no_headless);
        assert!(args.no_sandbox);
    }
}
