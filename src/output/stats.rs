//! Statistics generation from the crossword database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Post sitemaps known to the store
    pub sitemaps_total: u64,

    /// Post sitemaps whose pages were discovered
    pub sitemaps_processed: u64,

    /// Crossword pages known to the store
    pub pages_total: u64,

    /// Crossword pages fully extracted
    pub pages_processed: u64,

    /// Distinct clues
    pub clues: u64,

    /// Answer rows (one per sighting)
    pub answers: u64,

    /// Distinct clue/answer links
    pub clue_answer_links: u64,

    /// Clue/date links
    pub clue_date_links: u64,

    /// Answer/date links
    pub answer_date_links: u64,

    /// The most recent run, if any
    pub last_run: Option<RunRecord>,
}

impl HarvestStatistics {
    /// Share of known pages that have been extracted, in percent
    pub fn completion_rate(&self) -> f64 {
        if self.pages_total > 0 {
            (self.pages_processed as f64 / self.pages_total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let (clue_date_links, answer_date_links) = storage.count_date_links()?;

    Ok(HarvestStatistics {
        sitemaps_total: storage.count_sitemap_entries(None)?,
        sitemaps_processed: storage.count_sitemap_entries(Some(true))?,
        pages_total: storage.count_crossword_pages(None)?,
        pages_processed: storage.count_crossword_pages(Some(true))?,
        clues: storage.count_clues()?,
        answers: storage.count_answers()?,
        clue_answer_links: storage.count_clue_answer_links()?,
        clue_date_links,
        answer_date_links,
        last_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Queues:");
    println!(
        "  Sitemaps: {} ({} processed, {} pending)",
        stats.sitemaps_total,
        stats.sitemaps_processed,
        stats.sitemaps_total - stats.sitemaps_processed
    );
    println!(
        "  Crossword pages: {} ({} processed, {} pending)",
        stats.pages_total,
        stats.pages_processed,
        stats.pages_total - stats.pages_processed
    );
    println!();

    println!("Data:");
    println!("  Distinct clues: {}", stats.clues);
    println!("  Answer rows: {}", stats.answers);
    println!("  Clue/answer links: {}", stats.clue_answer_links);
    println!(
        "  Date links: {} clue, {} answer",
        stats.clue_date_links, stats.answer_date_links
    );
    println!();

    match &stats.last_run {
        Some(run) => println!(
            "Last run: #{} started {} ({}{})",
            run.id,
            run.started_at,
            run.status.to_db_string(),
            run.finished_at
                .as_ref()
                .map(|finished| format!(", finished {}", finished))
                .unwrap_or_default()
        ),
        None => println!("Last run: none"),
    }

    println!(
        "Completion: {:.1}% ({} / {} pages extracted)",
        stats.completion_rate(),
        stats.pages_processed,
        stats.pages_total
    );
}
