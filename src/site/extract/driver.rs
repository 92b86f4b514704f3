//! Driver extractor: the current rating snapshot from a driver profile page.
//!
//! Driver stats are embedded in the page's race-participation records, every one of which
//! repeats the same `irating`/`sr`/`license` triple. A driver with no races parses to an empty
//! snapshot rather than an error.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde::Serialize;

use crate::{
    error::Result,
    fetch::FetchGate,
    id::{DriverID, EntityKind},
    site::{schema::SchemaGuard, urls},
};

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""irating":"(\d+)","sr":"([\d.]+)","license":"([^"]+)""#).unwrap());

/// Driver rating snapshot parsed from a profile page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct DriverSnapshot {
    /// External driver id, parsed from the URL.
    pub driver_id: DriverID,
    /// The fetched URL.
    pub url: String,
    /// Skill rating, when the driver has race data.
    pub irating: Option<i32>,
    /// Safety rating, when the driver has race data.
    pub safety_rating: Option<f64>,
    /// License class, e.g. `"Class A"`, when the driver has race data.
    pub license_class: Option<String>,
}

/// Extractor for driver profile pages (static fetch).
#[derive(Debug)]
pub struct DriverExtractor<'a> {
    gate: &'a FetchGate,
    guard: SchemaGuard,
}

impl<'a> DriverExtractor<'a> {
    /// Create a driver extractor borrowing the run's shared fetch gate.
    pub fn new(gate: &'a FetchGate) -> Self {
        Self {
            gate,
            guard: SchemaGuard::new(),
        }
    }

    /// Fetch and parse a driver profile page.
    pub fn extract(&self, url: &str) -> Result<DriverSnapshot> {
        urls::require_shape(url, EntityKind::Driver)?;
        let driver_id = urls::driver_id_from(url)?;

        let doc = self.gate.fetch_static(url)?;
        self.parse(&doc, url, driver_id)
    }

    pub(crate) fn parse(&self, doc: &Html, url: &str, driver_id: DriverID) -> Result<DriverSnapshot> {
        let raw = doc.html();
        self.guard.validate_markers(EntityKind::Driver, &raw)?;

        let mut snapshot = DriverSnapshot {
            driver_id,
            url: url.to_string(),
            irating: None,
            safety_rating: None,
            license_class: None,
        };

        if let Some(captures) = RATING_RE.captures(&raw) {
            snapshot.irating = captures[1].parse().ok();
            snapshot.safety_rating = captures[2].parse().ok();
            snapshot.license_class = Some(captures[3].to_string());
        }

        self.guard
            .validate_fields(EntityKind::Driver, &serde_json::to_value(&snapshot)?)?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    fn parse_fixture(html: &str) -> Result<DriverSnapshot> {
        let gate = FetchGate::default();
        let extractor = DriverExtractor::new(&gate);
        let doc = Html::parse_document(html);
        extractor.parse(&doc, &urls::driver_url(98_765), 98_765)
    }

    #[test]
    fn parses_the_rating_triple() {
        let html = r#"
            <html><body>
            <script>
              var races = [{"race": 1, "irating":"3126","sr":"4.79","license":"Class A"},
                           {"race": 2, "irating":"3126","sr":"4.79","license":"Class A"}];
              var driver_id: 98765;
            </script>
            </body></html>
        "#;

        let snapshot = parse_fixture(html).unwrap();
        assert_eq!(snapshot.driver_id, 98_765);
        assert_eq!(snapshot.irating, Some(3126));
        assert_eq!(snapshot.safety_rating, Some(4.79));
        assert_eq!(snapshot.license_class.as_deref(), Some("Class A"));
    }

    #[test]
    fn driver_without_races_parses_to_an_empty_snapshot() {
        let html = r#"
            <html><body><script>var profile = {driver_id: 98765};</script>
            <p>No race history yet.</p></body></html>
        "#;

        let snapshot = parse_fixture(html).unwrap();
        assert_eq!(snapshot.irating, None);
        assert_eq!(snapshot.safety_rating, None);
        assert_eq!(snapshot.license_class, None);
    }

    #[test]
    fn page_without_driver_reference_is_schema_drift() {
        let result = parse_fixture("<html><body><p>Not a profile.</p></body></html>");

        assert_true!(matches!(
            result,
            Err(crate::error::Error::SchemaDrift {
                entity: EntityKind::Driver,
                ..
            })
        ));
    }
}
