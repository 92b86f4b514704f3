//! Season extractor: season metadata plus the race references on the rendered schedule page.
//!
//! Race discovery prefers the JavaScript-rendered dropdown of schedule links and falls back to
//! the static schedule table when the dropdown is empty. Both paths de-duplicate by schedule id;
//! rows without a parseable race number are informational and dropped.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use time::UtcOffset;

use crate::{
    error::Result,
    fetch::FetchGate,
    id::{EntityKind, ScheduleID, SeasonID},
    site::{
        extract::{heading_or_title_name, text_of},
        schema::SchemaGuard,
        urls, when,
    },
};

static DROPDOWN_RACE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div.dropdown-menu a[href*="schedule_id="]"#).unwrap());
static SCHEDULE_TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.schedule-table").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static ROW_RACE_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"a[href*="schedule_id="]"#).unwrap());

static RACE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Race\s+(\d+)").unwrap());

/// Season metadata parsed from the schedule page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct SeasonMeta {
    /// External season id, parsed from the URL.
    pub season_id: SeasonID,
    /// Season display name. Often generic here; the orchestrator prefers the name captured from
    /// the series page's embedded data when one exists.
    pub name: String,
    /// The fetched URL.
    pub url: String,
}

/// A race discovered on a season schedule page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct RaceRef {
    /// External schedule id.
    pub schedule_id: ScheduleID,
    /// Race detail URL.
    pub url: String,
    /// Race number within the season.
    pub race_number: u32,
    /// Track hint from the schedule link text, when present.
    pub track: Option<String>,
    /// Whether the link points at a results page.
    pub has_results: bool,
    /// Planned start, RFC 3339 UTC, when the schedule row carries a date (and possibly a time).
    pub date: Option<String>,
}

/// Everything extracted from one season schedule page.
#[derive(Clone, PartialEq, Debug)]
pub struct SeasonPage {
    /// Season metadata.
    pub metadata: SeasonMeta,
    /// Discovered races in schedule order.
    pub races: Vec<RaceRef>,
}

/// Extractor for season schedule pages (rendered fetch; the schedule is drawn by JavaScript).
#[derive(Debug)]
pub struct SeasonExtractor<'a> {
    gate: &'a FetchGate,
    guard: SchemaGuard,
    schedule_offset: UtcOffset,
}

impl<'a> SeasonExtractor<'a> {
    /// Create a season extractor borrowing the run's shared fetch gate. `schedule_offset` is the
    /// zone schedule wall-clock times are printed in (see [`when::offset_for_abbreviation`]).
    pub fn new(gate: &'a FetchGate, schedule_offset: UtcOffset) -> Self {
        Self {
            gate,
            guard: SchemaGuard::new(),
            schedule_offset,
        }
    }

    /// Fetch (rendered) and parse a season schedule page.
    pub fn extract(&self, url: &str) -> Result<SeasonPage> {
        urls::require_shape(url, EntityKind::Season)?;
        let season_id = urls::season_id_from(url)?;

        let doc = self.gate.fetch_rendered(url)?;
        self.parse(&doc, url, season_id)
    }

    pub(crate) fn parse(&self, doc: &Html, url: &str, season_id: SeasonID) -> Result<SeasonPage> {
        let raw = doc.html();
        self.guard.validate_markers(EntityKind::Season, &raw)?;

        let metadata = SeasonMeta {
            season_id,
            name: heading_or_title_name(doc, "Unknown Season"),
            url: url.to_string(),
        };
        self.guard
            .validate_fields(EntityKind::Season, &serde_json::to_value(&metadata)?)?;

        let mut races = dropdown_races(doc);
        if races.is_empty() {
            races = table_races(doc, self.schedule_offset);
        }

        Ok(SeasonPage { metadata, races })
    }
}

fn parse_race_number(text: &str) -> Option<u32> {
    if let Ok(number) = text.trim().parse::<u32>() {
        return (number > 0).then_some(number);
    }

    RACE_NUMBER_RE
        .captures(text)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .filter(|number| *number > 0)
}

fn race_from_link(link: ElementRef<'_>, race_number: u32) -> Option<RaceRef> {
    let href = link.value().attr("href")?;
    let schedule_id = urls::schedule_id_from(href).ok()?;
    let track = text_of(link);

    Some(RaceRef {
        schedule_id,
        url: urls::absolute(href),
        race_number,
        track: (!track.is_empty()).then_some(track),
        has_results: href.contains("season_race.php"),
        date: None,
    })
}

/// Races from the rendered dropdown menu. Link text looks like `"Race 3 - Bristol"`; entries
/// without a race number are informational and skipped.
fn dropdown_races(doc: &Html) -> Vec<RaceRef> {
    let mut seen: Vec<ScheduleID> = Vec::new();
    let mut races = Vec::new();

    for link in doc.select(&DROPDOWN_RACE_LINK) {
        let label = text_of(link);
        let Some(race_number) = parse_race_number(&label) else {
            continue;
        };
        let Some(mut race) = race_from_link(link, race_number) else {
            continue;
        };

        if seen.contains(&race.schedule_id) {
            continue;
        }
        seen.push(race.schedule_id);

        // The dropdown label is "Race N - Track"; keep only the track part as the hint.
        race.track = label.split_once('-').map(|(_, track)| track.trim().to_string());
        races.push(race);
    }

    races
}

/// Races from the static schedule table: race number in the first cell, schedule link carrying
/// the track name, and a date (possibly with a time) somewhere in the row's cells.
fn table_races(doc: &Html, schedule_offset: UtcOffset) -> Vec<RaceRef> {
    let Some(table) = doc.select(&SCHEDULE_TABLE).next().or_else(|| doc.select(&TABLE).next()) else {
        return Vec::new();
    };

    let mut seen: Vec<ScheduleID> = Vec::new();
    let mut races = Vec::new();

    for row in table.select(&TR) {
        let cells: Vec<_> = row.select(&TD).collect();
        let Some(first_cell) = cells.first() else {
            continue;
        };
        let Some(race_number) = parse_race_number(&text_of(*first_cell)) else {
            continue;
        };

        for link in row.select(&ROW_RACE_LINK) {
            let Some(race) = race_from_link(link, race_number) else {
                continue;
            };
            if seen.contains(&race.schedule_id) {
                continue;
            }
            seen.push(race.schedule_id);

            let date = cells.iter().find_map(|cell| {
                let cell_text = text_of(*cell);
                when::find_schedule_timestamp(&cell_text, schedule_offset)
                    .or_else(|| when::find_schedule_date(&cell_text))
            });

            races.push(RaceRef { date, ..race });
        }
    }

    races
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    fn parse_fixture(html: &str) -> Result<SeasonPage> {
        let gate = FetchGate::default();
        let extractor = SeasonExtractor::new(&gate, UtcOffset::UTC);
        let doc = Html::parse_document(html);
        extractor.parse(&doc, &urls::season_url(17424), 17424)
    }

    const DROPDOWN_PAGE: &str = r#"
        <html><head><title>2025 S1 - Race Schedule</title></head>
        <body>
          <h1>2025 S1</h1>
          <div class="dropdown-menu">
            <a href="season_race.php?schedule_id=324462">Race 1 - Bristol</a>
            <a href="season_race.php?schedule_id=324463">Race 2 - Martinsville</a>
            <a href="season_race.php?schedule_id=324462">Race 1 - Bristol</a>
            <a href="season_race.php?schedule_id=999999">Standings</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn dropdown_races_are_preferred_and_deduplicated() {
        let page = parse_fixture(DROPDOWN_PAGE).unwrap();

        assert_eq!(page.metadata.name, "2025 S1");
        assert_eq!(page.races.len(), 2);
        assert_eq!(page.races[0].schedule_id, 324_462);
        assert_eq!(page.races[0].race_number, 1);
        assert_eq!(page.races[0].track.as_deref(), Some("Bristol"));
        assert_true!(page.races[0].has_results);
        assert_eq!(page.races[1].schedule_id, 324_463);
    }

    const TABLE_PAGE: &str = r#"
        <html><body>
          <h1>2025 S1</h1>
          <table class="schedule-table">
            <tr><th>#</th><th>Track</th><th>Date</th></tr>
            <tr>
              <td>1</td>
              <td><a href="season_race.php?schedule_id=324462">Bristol Motor Speedway</a></td>
              <td>Oct 29, 2025 7:00 PM</td>
            </tr>
            <tr>
              <td>Race 2</td>
              <td><a href="season_race.php?schedule_id=324463">Martinsville</a></td>
              <td>Nov 5, 2025</td>
            </tr>
            <tr>
              <td>Off week</td>
              <td><a href="season_race.php?schedule_id=324464">Nowhere</a></td>
              <td>Nov 12, 2025</td>
            </tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn table_fallback_parses_numbers_dates_and_drops_informational_rows() {
        let page = parse_fixture(TABLE_PAGE).unwrap();

        assert_eq!(page.races.len(), 2);

        assert_eq!(page.races[0].race_number, 1);
        assert_eq!(page.races[0].track.as_deref(), Some("Bristol Motor Speedway"));
        assert_eq!(page.races[0].date.as_deref(), Some("2025-10-29T19:00:00Z"));

        assert_eq!(page.races[1].race_number, 2);
        assert_eq!(page.races[1].date.as_deref(), Some("2025-11-05T00:00:00Z"));
    }

    #[test]
    fn schedule_times_convert_to_utc_through_the_configured_zone() {
        let gate = FetchGate::default();
        let extractor = SeasonExtractor::new(&gate, when::offset_for_abbreviation(Some("EST")));
        let doc = Html::parse_document(TABLE_PAGE);

        let page = extractor.parse(&doc, &urls::season_url(17424), 17424).unwrap();
        assert_eq!(page.races[0].date.as_deref(), Some("2025-10-30T00:00:00Z"));
    }

    #[test]
    fn page_without_schedule_links_is_schema_drift() {
        let result = parse_fixture("<html><body><h1>2025 S1</h1></body></html>");

        assert_true!(matches!(
            result,
            Err(crate::error::Error::SchemaDrift {
                entity: EntityKind::Season,
                ..
            })
        ));
    }
}
