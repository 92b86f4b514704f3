//! One extractor per entity kind.
//!
//! Every extractor follows the same contract: parse the external id out of the URL (refusing
//! foreign shapes), fetch through the shared [`FetchGate`](crate::fetch::FetchGate) in its
//! declared mode, hand the raw text to the [`SchemaGuard`](crate::site::SchemaGuard) marker
//! check, assemble typed metadata plus child references, run the required-fields check, and
//! return. Fetch or validation failures surface to the caller — partial data is never returned.
//!
//! Parsing is separated from fetching (`extract` fetches and delegates to a crate-visible
//! `parse`), so the unit tests drive the full parse paths with fixture HTML and no network.

pub mod driver;
pub mod league;
pub mod race;
pub mod season;
pub mod series;

pub use driver::DriverExtractor;
pub use league::LeagueExtractor;
pub use race::RaceExtractor;
pub use season::SeasonExtractor;
pub use series::SeriesExtractor;

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub(crate) static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
pub(crate) static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Concatenated, trimmed text content of an element.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Page-name fallback chain shared by the non-league extractors: the first `h1` with text, then
/// the page title with its ` - `-separated suffix stripped, then the whole title, finally the
/// caller's constant.
pub(crate) fn heading_or_title_name(doc: &Html, fallback: &str) -> String {
    if let Some(h1) = doc.select(&H1).next() {
        let name = text_of(h1);
        if !name.is_empty() {
            return name;
        }
    }

    if let Some(title) = doc.select(&TITLE).next() {
        let title_text = text_of(title);
        if let Some((left, _)) = title_text.split_once(" - ") {
            let name = left.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
        if !title_text.is_empty() {
            return title_text;
        }
    }

    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn h1_wins_over_title() {
        let doc = Html::parse_document("<html><head><title>T - X</title></head><body><h1>2025 S1</h1></body></html>");
        assert_eq!(heading_or_title_name(&doc, "Unknown"), "2025 S1");
    }

    #[test]
    fn title_suffix_is_stripped() {
        let doc = Html::parse_document("<html><head><title>Wednesday Night - Seasons</title></head><body></body></html>");
        assert_eq!(heading_or_title_name(&doc, "Unknown"), "Wednesday Night");
    }

    #[test]
    fn fallback_applies_to_bare_pages() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert_eq!(heading_or_title_name(&doc, "Unknown Season"), "Unknown Season");
    }
}
