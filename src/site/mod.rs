//! Site layout for the crossword-answers website
//!
//! The crawler only ever follows URLs that match one of two fixed patterns,
//! both anchored at the configured origin:
//!
//! - paginated post sitemaps: `{origin}/post-sitemap{N}.xml`
//! - daily crossword pages: `{origin}/nyt-crossword-answers-{DD-MM-YY}/`
//!
//! Everything else listed in a sitemap is ignored.

mod patterns;

pub use patterns::{crossword_page_pattern, second_level_sitemap_pattern};

use regex::Regex;

/// Path of the sitemap index, relative to the origin
pub const ROOT_SITEMAP_PATH: &str = "/sitemap_index.xml";

/// Compiled URL patterns for one site origin
#[derive(Debug, Clone)]
pub struct SiteLayout {
    origin: String,
    sitemap_pattern: Regex,
    page_pattern: Regex,
}

impl SiteLayout {
    /// Builds the layout for `base_url`
    ///
    /// A trailing slash on the base URL is ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use crossword_harvest::site::SiteLayout;
    ///
    /// let layout = SiteLayout::new("https://nytcrosswordanswers.org").unwrap();
    /// assert_eq!(
    ///     layout.root_sitemap_url(),
    ///     "https://nytcrosswordanswers.org/sitemap_index.xml"
    /// );
    /// ```
    pub fn new(base_url: &str) -> Result<Self, regex::Error> {
        let origin = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            sitemap_pattern: second_level_sitemap_pattern(&origin)?,
            page_pattern: crossword_page_pattern(&origin)?,
            origin,
        })
    }

    /// The site origin, without a trailing slash
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// URL of the sitemap index document
    pub fn root_sitemap_url(&self) -> String {
        format!("{}{}", self.origin, ROOT_SITEMAP_PATH)
    }

    /// Returns true if `url` is a paginated post sitemap
    pub fn is_second_level_sitemap(&self, url: &str) -> bool {
        self.sitemap_pattern.is_match(url)
    }

    /// Returns the `DD-MM-YY` date token if `url` is a crossword page
    pub fn crossword_page_date(&self, url: &str) -> Option<String> {
        self.page_pattern
            .captures(url)
            .and_then(|caps| caps.name("date"))
            .map(|date| date.as_str().to_string())
    }
}
