//! Sitemap walking
//!
//! Sitemaps come in two flavours, both handled by the same `<loc>` extraction:
//! the root `<sitemapindex>` listing second-level sitemaps, and `<urlset>`
//! documents listing individual crossword pages.

use crate::crawler::fetcher::{fetch_with_backoff, FetchResult, RetryPolicy};
use crate::site::SiteLayout;
use crate::HarvestError;
use reqwest::Client;
use sxd_document::parser;
use thiserror::Error;

/// Matches `<loc>` with or without the sitemaps.org namespace
const LOC_XPATH: &str = "//*[local-name()='loc']";

/// Errors raised while reading a sitemap document
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Malformed sitemap XML: {0}")]
    Xml(String),

    #[error("XPath evaluation failed: {0}")]
    XPath(String),
}

/// A crossword page listed in a sitemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub url: String,
    /// `DD-MM-YY` token taken from the URL
    pub date: String,
}

/// Returns every `<loc>` value of a sitemap document, trimmed, in document order
///
/// # Example
///
/// ```
/// use crossword_harvest::crawler::extract_locations;
///
/// let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <sitemap><loc>https://example.com/post-sitemap.xml</loc></sitemap>
/// </sitemapindex>"#;
///
/// let locations = extract_locations(xml).unwrap();
/// assert_eq!(locations, vec!["https://example.com/post-sitemap.xml"]);
/// ```
pub fn extract_locations(xml: &str) -> Result<Vec<String>, SitemapError> {
    // The XML declaration must be the very first thing in the document
    let xml = xml.trim_start_matches('\u{feff}').trim_start();

    let package = parser::parse(xml).map_err(|e| SitemapError::Xml(e.to_string()))?;
    let document = package.as_document();

    let factory = sxd_xpath::Factory::new();
    let xpath = factory
        .build(LOC_XPATH)
        .map_err(|e| SitemapError::XPath(e.to_string()))?
        .ok_or_else(|| SitemapError::XPath("empty expression".to_string()))?;

    let context = sxd_xpath::Context::new();
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| SitemapError::XPath(e.to_string()))?;

    let locations = match value {
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .into_iter()
            .map(|node| node.string_value().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(locations)
}

/// Returns the crossword pages listed in a second-level sitemap
///
/// Locations that are not crossword pages are dropped silently.
pub fn extract_page_urls(
    xml: &str,
    layout: &SiteLayout,
) -> Result<Vec<PageLocation>, SitemapError> {
    let pages = extract_locations(xml)?
        .into_iter()
        .filter_map(|url| {
            layout
                .crossword_page_date(&url)
                .map(|date| PageLocation { url, date })
        })
        .collect();

    Ok(pages)
}

/// Returns the second-level sitemaps listed in the sitemap index
pub fn extract_sitemap_urls(xml: &str, layout: &SiteLayout) -> Result<Vec<String>, SitemapError> {
    let sitemaps = extract_locations(xml)?
        .into_iter()
        .filter(|url| layout.is_second_level_sitemap(url))
        .collect();

    Ok(sitemaps)
}

/// Fetches the sitemap index and returns the second-level sitemaps it lists
///
/// Failure here ends the run: without the index there is nothing to walk.
pub async fn fetch_root_sitemap(
    client: &Client,
    layout: &SiteLayout,
    policy: &RetryPolicy,
) -> Result<Vec<String>, HarvestError> {
    let url = layout.root_sitemap_url();

    match fetch_with_backoff(client, &url, policy).await {
        FetchResult::Success { body, .. } => Ok(extract_sitemap_urls(&body, layout)?),
        FetchResult::Exhausted {
            attempts,
            last_error,
        } => Err(HarvestError::RootSitemapUnavailable {
            url,
            attempts,
            reason: last_error.to_string(),
        }),
    }
}
