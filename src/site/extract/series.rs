//! Series extractor: series metadata plus the season references embedded in the series page.

use scraper::Html;
use serde::Serialize;

use crate::{
    error::Result,
    fetch::FetchGate,
    id::{EntityKind, SeasonID, SeriesID},
    site::{extract::heading_or_title_name, payload, schema::SchemaGuard, urls},
};

/// Series metadata parsed from the series seasons page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct SeriesMeta {
    /// External series id, parsed from the URL.
    pub series_id: SeriesID,
    /// Series display name. Often generic here; the orchestrator prefers the name captured from
    /// the league page's embedded data when one exists.
    pub name: String,
    /// The fetched URL.
    pub url: String,
}

/// A season discovered on a series page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct SeasonRef {
    /// External season id.
    pub season_id: SeasonID,
    /// Season display name.
    pub name: String,
    /// Canonical season schedule URL.
    pub url: String,
    /// Season start time as Unix seconds, when present.
    pub start_time: Option<i64>,
    /// Number of scheduled races, when present.
    pub scheduled_races: Option<u32>,
    /// Number of completed races, when present.
    pub completed_races: Option<u32>,
}

/// Everything extracted from one series page.
#[derive(Clone, PartialEq, Debug)]
pub struct SeriesPage {
    /// Series metadata.
    pub metadata: SeriesMeta,
    /// Discovered seasons, in page order (the site lists newest first).
    pub seasons: Vec<SeasonRef>,
}

/// Extractor for series seasons pages (static fetch).
#[derive(Debug)]
pub struct SeriesExtractor<'a> {
    gate: &'a FetchGate,
    guard: SchemaGuard,
}

impl<'a> SeriesExtractor<'a> {
    /// Create a series extractor borrowing the run's shared fetch gate.
    pub fn new(gate: &'a FetchGate) -> Self {
        Self {
            gate,
            guard: SchemaGuard::new(),
        }
    }

    /// Fetch and parse a series seasons page.
    pub fn extract(&self, url: &str) -> Result<SeriesPage> {
        urls::require_shape(url, EntityKind::Series)?;
        let series_id = urls::series_id_from(url)?;

        let doc = self.gate.fetch_static(url)?;
        self.parse(&doc, url, series_id)
    }

    pub(crate) fn parse(&self, doc: &Html, url: &str, series_id: SeriesID) -> Result<SeriesPage> {
        let raw = doc.html();
        self.guard.validate_markers(EntityKind::Series, &raw)?;

        let metadata = SeriesMeta {
            series_id,
            name: heading_or_title_name(doc, "Unknown Series"),
            url: url.to_string(),
        };
        self.guard
            .validate_fields(EntityKind::Series, &serde_json::to_value(&metadata)?)?;

        let seasons = payload::season_entries(&raw)
            .into_iter()
            .map(|entry| SeasonRef {
                season_id: entry.id,
                url: urls::season_url(entry.id),
                name: entry.name,
                start_time: entry.start_time,
                scheduled_races: entry.scheduled_races,
                completed_races: entry.completed_races,
            })
            .collect();

        Ok(SeriesPage { metadata, seasons })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    fn parse_fixture(html: &str) -> Result<SeriesPage> {
        let gate = FetchGate::default();
        let extractor = SeriesExtractor::new(&gate);
        let doc = Html::parse_document(html);
        extractor.parse(&doc, &urls::series_url(3714), 3714)
    }

    const SERIES_PAGE: &str = r#"
        <html>
        <head><title>Wednesday Night - Seasons</title></head>
        <body>
          <h1>Wednesday Night</h1>
          <script>
            seasons = [{id: 26741, n: "2025 S1", scrt: 1754380800, ns: 10, nr: 5},
                       {id: 26740, n: "2024 S4", scrt: 1720000000, ns: 12, nr: 12}];
          </script>
        </body>
        </html>
    "#;

    #[test]
    fn parses_a_well_formed_series_page() {
        let page = parse_fixture(SERIES_PAGE).unwrap();

        assert_eq!(page.metadata.series_id, 3714);
        assert_eq!(page.metadata.name, "Wednesday Night");

        assert_eq!(page.seasons.len(), 2);
        assert_eq!(page.seasons[0].season_id, 26741);
        assert_eq!(page.seasons[0].name, "2025 S1");
        assert_eq!(page.seasons[0].start_time, Some(1_754_380_800));
        assert_eq!(page.seasons[0].scheduled_races, Some(10));
        assert_eq!(page.seasons[0].completed_races, Some(5));
        assert_eq!(
            page.seasons[1].url,
            "https://www.simracerhub.com/season_schedule.php?season_id=26740"
        );
    }

    #[test]
    fn page_without_seasons_array_is_schema_drift() {
        let html = "<html><body><h1>Wednesday Night</h1></body></html>";

        let result = parse_fixture(html);
        assert_true!(matches!(
            result,
            Err(crate::error::Error::SchemaDrift {
                entity: EntityKind::Series,
                ..
            })
        ));
    }

    #[test]
    fn generic_series_page_name_falls_back_to_constant() {
        let html = r#"
            <html><head></head><body>
            <script>seasons = [{id: 1, n: "2025 S1", scrt: 1, ns: 2, nr: 0}];</script>
            </body></html>
        "#;

        let page = parse_fixture(html).unwrap();
        assert_eq!(page.metadata.name, "Unknown Series");
    }
}
