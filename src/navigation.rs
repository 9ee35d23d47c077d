//! Search navigation state machine
//!
//! Sequences the site interaction as explicit states with a transition
//! function, rather than ad-hoc sequential scripting, so timeout and
//! failure behavior is testable against a fake driver:
//!
//! `Start -> AgreementAccepted -> SearchSubmitted -> ListingLoaded ->
//! {ListingLoaded (next page) | Done}`
//!
//! The machine yields a lazy sequence of result-row descriptors. It is
//! restartable only at `Start`; any failure forces a full restart on the
//! next scheduled run.

use crate::browser::SessionDriver;
use crate::config::{
    AGREEMENT_CHECKBOX, FROM_DATE_INPUT, LISTING_READY, LISTING_ROWS, NEXT_PAGE_ENABLED,
    NO_RESULTS, PTR_CHECKBOX, SEARCH_SUBMIT,
};
use crate::error::{BrowserError, NavigationError};
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// States of the search session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// Entry URL not yet loaded
    Start,
    /// Consent control clicked, search form visible
    AgreementAccepted,
    /// Search criteria submitted, waiting on the listing
    SearchSubmitted,
    /// A listing page is rendered and rows are being enumerated
    ListingLoaded,
    /// Listing exhausted (or explicitly empty)
    Done,
}

impl NavState {
    /// State name carried inside navigation errors
    pub fn name(self) -> &'static str {
        match self {
            NavState::Start => "Start",
            NavState::AgreementAccepted => "AgreementAccepted",
            NavState::SearchSubmitted => "SearchSubmitted",
            NavState::ListingLoaded => "ListingLoaded",
            NavState::Done => "Done",
        }
    }
}

/// One result row: candidate identity plus its detail link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDescriptor {
    /// Filer name as listed ("First Last")
    pub filer_name: String,
    /// Text of the report link
    pub report_title: String,
    /// Raw date-filed cell text; the detail parser is authoritative
    pub report_date_raw: String,
    /// Absolute URL of the report detail page
    pub detail_url: String,
}

/// Drives one search session over an injected driver
pub struct SearchNavigator<D: SessionDriver> {
    driver: D,
    entry_url: String,
    step_timeout: Duration,
    state: NavState,
    page_index: usize,
    queue: VecDeque<RowDescriptor>,
}

impl<D: SessionDriver> SearchNavigator<D> {
    /// Create a navigator at `Start`
    pub fn new(driver: D, entry_url: &str, step_timeout: Duration) -> Self {
        Self {
            driver,
            entry_url: entry_url.to_string(),
            step_timeout,
            state: NavState::Start,
            page_index: 0,
            queue: VecDeque::new(),
        }
    }

    /// Current machine state
    pub fn state(&self) -> NavState {
        self.state
    }

    /// Listing page index, zero-based
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Release the driver once the listing has been drained
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Map a driver failure to a navigation error carrying the state
    fn step_err(state: NavState, started: Instant, err: BrowserError) -> NavigationError {
        match err {
            BrowserError::Timeout(_) => NavigationError::Timeout {
                state: state.name(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            BrowserError::ElementMissing(selector) => NavigationError::ControlMissing {
                state: state.name(),
                selector,
            },
            other => NavigationError::Step {
                state: state.name(),
                detail: other.to_string(),
            },
        }
    }

    /// Run `Start` through the first listing page (or straight to `Done`
    /// when the listing is explicitly empty).
    pub async fn start(&mut self) -> Result<(), NavigationError> {
        if self.state != NavState::Start {
            return Err(NavigationError::Step {
                state: self.state.name(),
                detail: "session already started".to_string(),
            });
        }
        let timeout = self.step_timeout;

        // Start: load the entry page and accept the agreement
        let step = Instant::now();
        self.driver
            .open(&self.entry_url)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.driver
            .wait_for(AGREEMENT_CHECKBOX, timeout)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.driver
            .click(AGREEMENT_CHECKBOX)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.state = NavState::AgreementAccepted;
        info!("Agreement accepted");

        // AgreementAccepted: fill criteria (PTR, from-date = today) and submit
        let step = Instant::now();
        self.driver
            .wait_for(PTR_CHECKBOX, timeout)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.driver
            .click(PTR_CHECKBOX)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        let today = chrono::Local::now().format("%m/%d/%Y").to_string();
        self.driver
            .fill(FROM_DATE_INPUT, &today)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.driver
            .click(SEARCH_SUBMIT)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        self.state = NavState::SearchSubmitted;
        info!("Search submitted for {}", today);

        // SearchSubmitted: wait for the result table or the empty indicator
        let step = Instant::now();
        self.driver
            .wait_for(LISTING_READY, timeout)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;
        if self
            .driver
            .exists(NO_RESULTS)
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?
        {
            info!("Listing is empty");
            self.state = NavState::Done;
            return Ok(());
        }

        self.load_current_page().await?;
        Ok(())
    }

    /// Next result row, paginating as needed. `None` once the listing is
    /// exhausted.
    pub async fn next_row(&mut self) -> Result<Option<RowDescriptor>, NavigationError> {
        loop {
            if let Some(row) = self.queue.pop_front() {
                return Ok(Some(row));
            }
            if self.state != NavState::ListingLoaded {
                return Ok(None);
            }

            let step = Instant::now();
            let has_next = self
                .driver
                .exists(NEXT_PAGE_ENABLED)
                .await
                .map_err(|e| Self::step_err(self.state, step, e))?;
            if !has_next {
                self.state = NavState::Done;
                return Ok(None);
            }

            self.driver
                .click(NEXT_PAGE_ENABLED)
                .await
                .map_err(|e| Self::step_err(self.state, step, e))?;
            self.driver
                .wait_for(LISTING_READY, self.step_timeout)
                .await
                .map_err(|e| Self::step_err(self.state, step, e))?;
            self.page_index += 1;
            self.load_current_page().await?;
        }
    }

    /// Scrape the rows of the currently rendered listing page
    async fn load_current_page(&mut self) -> Result<(), NavigationError> {
        let step = Instant::now();
        let document = self
            .driver
            .current_document()
            .await
            .map_err(|e| Self::step_err(self.state, step, e))?;

        let base = Url::parse(&self.entry_url)
            .map_err(|e| NavigationError::InvalidUrl(e.to_string()))?;
        let rows = parse_listing(&document, &base);
        debug!("Page {}: {} rows", self.page_index, rows.len());

        if rows.is_empty() {
            self.state = NavState::Done;
        } else {
            self.queue.extend(rows);
            self.state = NavState::ListingLoaded;
        }
        Ok(())
    }
}

/// Extract row descriptors from a rendered listing document.
///
/// Expected columns: first name, last name, office, report link, date
/// filed. Rows that do not fit are logged and skipped.
fn parse_listing(document: &str, base: &Url) -> Vec<RowDescriptor> {
    let html = Html::parse_document(document);
    let row_sel = Selector::parse(LISTING_ROWS).unwrap();
    let cell_sel = Selector::parse("td").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();
    let empty_sel = Selector::parse(NO_RESULTS).unwrap();

    let mut rows = Vec::new();
    for row in html.select(&row_sel) {
        if row.select(&empty_sel).next().is_some() {
            continue;
        }

        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();
        let link = row.select(&link_sel).next();

        let (Some(link), true) = (link, cells.len() >= 5) else {
            warn!("Skipping listing row with unexpected shape: {:?}", cells);
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(detail_url) = base.join(href) else {
            warn!("Skipping listing row with unresolvable link: {}", href);
            continue;
        };

        rows.push(RowDescriptor {
            filer_name: format!("{} {}", cells[0], cells[1]).trim().to_string(),
            report_title: link.text().collect::<String>().trim().to_string(),
            report_date_raw: cells[cells.len() - 1].clone(),
            detail_url: detail_url.to_string(),
        });
    }
    rows
}
