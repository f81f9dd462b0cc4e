use regex::Regex;

/// Pattern for paginated post sitemaps under `origin`
///
/// # Examples
///
/// ```
/// use crossword_harvest::site::second_level_sitemap_pattern;
///
/// let pattern = second_level_sitemap_pattern("https://nytcrosswordanswers.org").unwrap();
/// assert!(pattern.is_match("https://nytcrosswordanswers.org/post-sitemap4.xml"));
/// assert!(!pattern.is_match("https://nytcrosswordanswers.org/page-sitemap.xml"));
/// ```
pub fn second_level_sitemap_pattern(origin: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^{}/post-sitemap\d*\.xml$", regex::escape(origin)))
}

/// Pattern for daily crossword pages under `origin`, capturing the date as `date`
///
/// # Examples
///
/// ```
/// use crossword_harvest::site::crossword_page_pattern;
///
/// let pattern = crossword_page_pattern("https://nytcrosswordanswers.org").unwrap();
/// let caps = pattern
///     .captures("https://nytcrosswordanswers.org/nyt-crossword-answers-05-01-24/")
///     .unwrap();
/// assert_eq!(&caps["date"], "05-01-24");
/// ```
pub fn crossword_page_pattern(origin: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}/nyt-crossword-answers-(?P<date>\d\d-\d\d-\d\d)/",
        regex::escape(origin)
    ))
}
