//! HTML parser for crossword pages
//!
//! A crossword page lists its clues inside a single `div.nywrap` container:
//!
//! ```html
//! <div class="nywrap">
//!   <ul>
//!     <li><a href="...">1 Across</a> <span>CAT</span></li>
//!   </ul>
//! </div>
//! ```
//!
//! Each list item holds the clue in its anchor and the answer in its span.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// CSS selector of the clue list container
pub const CONTAINER_SELECTOR: &str = "div.nywrap";

/// Errors raised when a page does not have the expected structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The clue container is absent
    #[error("clue container `{}` not found", CONTAINER_SELECTOR)]
    MissingContainer,

    /// A list item lacks its clue anchor or answer span
    #[error("list item {index} has no <{missing}> element")]
    MalformedItem { index: usize, missing: &'static str },

    #[error("invalid selector `{0}`")]
    InvalidSelector(&'static str),
}

/// A clue with its answer, as printed on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClueAnswer {
    pub clue: String,
    pub answer: String,
}

impl ClueAnswer {
    pub fn new(clue: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            clue: clue.into(),
            answer: answer.into(),
        }
    }
}

/// Extracts every clue/answer pair from a crossword page, in document order
///
/// # Returns
///
/// * `Ok(pairs)` - The container was found; `pairs` may be empty
/// * `Err(ExtractionError::MissingContainer)` - The page has no clue container
/// * `Err(ExtractionError::MalformedItem)` - A list item is missing its anchor or span
///
/// # Example
///
/// ```
/// use crossword_harvest::crawler::{extract_clue_answer_pairs, ClueAnswer};
///
/// let html = r#"<div class="nywrap"><ul>
///     <li><a href="/c/1">1 Across</a><span>CAT</span></li>
/// </ul></div>"#;
///
/// let pairs = extract_clue_answer_pairs(html).unwrap();
/// assert_eq!(pairs, vec![ClueAnswer::new("1 Across", "CAT")]);
/// ```
pub fn extract_clue_answer_pairs(html: &str) -> Result<Vec<ClueAnswer>, ExtractionError> {
    let container_selector = selector(CONTAINER_SELECTOR)?;
    let item_selector = selector("li")?;
    let clue_selector = selector("a")?;
    let answer_selector = selector("span")?;

    let document = Html::parse_document(html);
    let container = document
        .select(&container_selector)
        .next()
        .ok_or(ExtractionError::MissingContainer)?;

    container
        .select(&item_selector)
        .enumerate()
        .map(|(index, item)| {
            let clue = first_text(item, &clue_selector)
                .ok_or(ExtractionError::MalformedItem { index, missing: "a" })?;
            let answer = first_text(item, &answer_selector)
                .ok_or(ExtractionError::MalformedItem { index, missing: "span" })?;
            Ok(ClueAnswer { clue, answer })
        })
        .collect()
}

fn selector(css: &'static str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::InvalidSelector(css))
}

/// Trimmed text of the first descendant matching `selector`
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|found| found.text().collect::<String>().trim().to_string())
}
