//! Crawler module for sitemap walking and clue extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded exponential-backoff retry
//! - Sitemap `<loc>` extraction
//! - Crossword page parsing
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod parser;
mod sitemap;

pub use coordinator::{Coordinator, RunSummary};
pub use fetcher::{build_http_client, fetch_with_backoff, AttemptError, FetchResult, RetryPolicy};
pub use parser::{extract_clue_answer_pairs, ClueAnswer, ExtractionError, CONTAINER_SELECTOR};
pub use sitemap::{
    extract_locations, extract_page_urls, extract_sitemap_urls, fetch_root_sitemap, PageLocation,
    SitemapError,
};

use crate::config::Config;
use crate::storage::open_storage;
use crate::HarvestError;
use std::path::Path;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Open (or rebuild) the database named in the configuration
/// 2. Build the HTTP client
/// 3. Run sitemap discovery, page discovery and extraction in order
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `rebuild` - Discard the existing database first
/// * `config_hash` - Hash of the configuration, recorded with the run
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run completed; some items may have been skipped
/// * `Err(HarvestError)` - The run could not start or the sitemap index was unavailable
pub async fn harvest(
    config: &Config,
    rebuild: bool,
    config_hash: &str,
) -> Result<RunSummary, HarvestError> {
    let storage = open_storage(Path::new(&config.output.database_path), rebuild)?;
    let mut coordinator = Coordinator::new(config, storage)?.with_config_hash(config_hash);
    coordinator.run().await
}
