//! Harvest coordinator - the three-phase crawl
//!
//! A run goes through three phases, strictly one after the other:
//!
//! 1. **Sitemap discovery**: read the sitemap index, store every post sitemap
//! 2. **Page discovery**: for each unprocessed sitemap, store its crossword pages
//! 3. **Extraction**: for each unprocessed page, store its clue/answer pairs
//!
//! Phases 2 and 3 work off the store's unprocessed queues, so a failed item is
//! simply left for the next run. Only a failure to read the sitemap index or to
//! use the store ends a run early.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_with_backoff, FetchResult, RetryPolicy};
use crate::crawler::parser::extract_clue_answer_pairs;
use crate::crawler::sitemap::{extract_page_urls, fetch_root_sitemap};
use crate::site::SiteLayout;
use crate::storage::{CrosswordPageRecord, RunStatus, SitemapRecord, SqliteStorage, Storage};
use crate::HarvestError;
use reqwest::Client;
use std::time::Instant;

/// Items between two progress reports
const PROGRESS_INTERVAL: usize = 10;

/// Counters describing one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Post sitemaps newly stored in phase 1
    pub sitemaps_discovered: usize,
    /// Sitemaps whose pages were stored in phase 2
    pub sitemaps_processed: usize,
    /// Sitemaps left unprocessed because of an error
    pub sitemaps_failed: usize,
    /// Crossword pages newly stored in phase 2
    pub pages_discovered: usize,
    /// Pages fully extracted in phase 3
    pub pages_processed: usize,
    /// Pages left unprocessed because of an error
    pub pages_failed: usize,
    /// Clue/answer pairs written in phase 3
    pub pairs_recorded: usize,
}

/// Main harvest coordinator
///
/// The coordinator owns the store for the duration of the run; there is a
/// single writer and every request is awaited before the next one is sent.
pub struct Coordinator<S: Storage = SqliteStorage> {
    storage: S,
    client: Client,
    layout: SiteLayout,
    policy: RetryPolicy,
    config_hash: String,
}

impl<S: Storage> Coordinator<S> {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `storage` - An opened store
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client or URL patterns could not be built
    pub fn new(config: &Config, storage: S) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent, config.fetcher.timeout())?;
        let layout = SiteLayout::new(&config.site.base_url)?;

        Ok(Self {
            storage,
            client,
            layout,
            policy: RetryPolicy::from_config(&config.fetcher),
            config_hash: crate::config::DEFAULT_CONFIG_HASH.to_string(),
        })
    }

    /// Sets the config hash recorded with the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// The store, e.g. for inspecting results after a run
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs all three phases and records the run's outcome
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let run_id = self.storage.create_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {}", run_id);
        let start_time = Instant::now();

        match self.run_phases().await {
            Ok(summary) => {
                self.storage.finish_run(run_id, RunStatus::Completed)?;
                tracing::info!(
                    "Harvest completed in {:?}: {} pages processed, {} pairs recorded",
                    start_time.elapsed(),
                    summary.pages_processed,
                    summary.pairs_recorded
                );
                if summary.sitemaps_failed + summary.pages_failed > 0 {
                    tracing::info!(
                        "Left for the next run: {} sitemaps, {} pages",
                        summary.sitemaps_failed,
                        summary.pages_failed
                    );
                }
                Ok(summary)
            }
            Err(e) => {
                if let Err(finish_err) = self.storage.finish_run(run_id, RunStatus::Failed) {
                    tracing::error!("Could not mark run {} as failed: {}", run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<RunSummary, HarvestError> {
        let mut summary = RunSummary::default();
        self.discover_sitemaps(&mut summary).await?;
        self.discover_pages(&mut summary).await?;
        self.extract_pages(&mut summary).await?;
        Ok(summary)
    }

    /// Phase 1: store every post sitemap listed in the sitemap index
    pub async fn discover_sitemaps(
        &mut self,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        tracing::info!("Reading sitemap index {}", self.layout.root_sitemap_url());
        let sitemaps = fetch_root_sitemap(&self.client, &self.layout, &self.policy).await?;

        for url in &sitemaps {
            if self.storage.insert_sitemap_entry(url, false)? {
                tracing::debug!("New sitemap: {}", url);
                summary.sitemaps_discovered += 1;
            }
        }

        tracing::info!(
            "Sitemap index lists {} post sitemaps, {} new",
            sitemaps.len(),
            summary.sitemaps_discovered
        );
        Ok(())
    }

    /// Phase 2: store the crossword pages of every unprocessed sitemap
    pub async fn discover_pages(&mut self, summary: &mut RunSummary) -> Result<(), HarvestError> {
        let pending = self.storage.list_unprocessed_sitemap_entries()?;
        tracing::info!("{} sitemaps to process", pending.len());

        for (done, entry) in pending.iter().enumerate() {
            match self.process_sitemap(entry).await {
                Ok(new_pages) => {
                    summary.sitemaps_processed += 1;
                    summary.pages_discovered += new_pages;
                }
                Err(e) => {
                    tracing::warn!("Skipping sitemap {}: {}", entry.url, e);
                    summary.sitemaps_failed += 1;
                }
            }

            if (done + 1) % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {}/{} sitemaps, {} new pages",
                    done + 1,
                    pending.len(),
                    summary.pages_discovered
                );
            }
        }

        Ok(())
    }

    /// Phase 3: store the clue/answer pairs of every unprocessed page
    pub async fn extract_pages(&mut self, summary: &mut RunSummary) -> Result<(), HarvestError> {
        let pending = self.storage.list_unprocessed_crossword_pages()?;
        tracing::info!("{} crossword pages to process", pending.len());
        let start_time = Instant::now();

        for (done, page) in pending.iter().enumerate() {
            match self.process_page(page).await {
                Ok(pairs) => {
                    summary.pages_processed += 1;
                    summary.pairs_recorded += pairs;
                }
                Err(e) => {
                    tracing::warn!("Skipping crossword page {} ({}): {}", page.date, page.url, e);
                    summary.pages_failed += 1;
                }
            }

            if (done + 1) % PROGRESS_INTERVAL == 0 {
                let rate = (done + 1) as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {}/{} pages, {} pairs, {:.2} pages/sec",
                    done + 1,
                    pending.len(),
                    summary.pairs_recorded,
                    rate
                );
            }
        }

        Ok(())
    }

    /// Stores the pages listed in one sitemap, then marks it processed
    ///
    /// Returns the number of pages that were new.
    async fn process_sitemap(&mut self, entry: &SitemapRecord) -> Result<usize, HarvestError> {
        let body = self.fetch(&entry.url).await?;
        let pages = extract_page_urls(&body, &self.layout)?;

        let mut new_pages = 0;
        for page in &pages {
            if self.storage.insert_crossword_page(&page.url, false, &page.date)? {
                new_pages += 1;
            }
        }

        self.storage.mark_sitemap_processed(entry.id)?;
        tracing::debug!(
            "Sitemap {}: {} pages listed, {} new",
            entry.url,
            pages.len(),
            new_pages
        );
        Ok(new_pages)
    }

    /// Stores every pair of one crossword page and marks it processed
    ///
    /// The page is written as a unit, so a failure leaves no partial pairs
    /// behind for the retry to duplicate. Returns the number of pairs recorded.
    async fn process_page(&mut self, page: &CrosswordPageRecord) -> Result<usize, HarvestError> {
        let body = self.fetch(&page.url).await?;
        let pairs = extract_clue_answer_pairs(&body)?;

        self.storage.record_page(page.id, &pairs)?;
        tracing::debug!("Page {}: {} pairs", page.date, pairs.len());
        Ok(pairs.len())
    }

    async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        match fetch_with_backoff(&self.client, url, &self.policy).await {
            FetchResult::Success { body, .. } => Ok(body),
            FetchResult::Exhausted {
                attempts,
                last_error,
            } => Err(HarvestError::Fetch {
                url: url.to_string(),
                attempts,
                reason: last_error.to_string(),
            }),
        }
    }
}
